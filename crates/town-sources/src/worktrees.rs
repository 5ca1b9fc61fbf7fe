use crate::{list_subdirs, SourceError, SourceReader};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use town_core::CrewWorktree;
use tracing::warn;

const UNKNOWN_STATUS: &str = "unknown";

/// A crew directory is a worktree only when `.git` is a link file rather
/// than a full repository directory.
async fn has_worktree_link(dir: &Path) -> bool {
    tokio::fs::symlink_metadata(dir.join(".git"))
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

impl SourceReader {
    pub async fn crew_worktrees(
        &self,
        rig: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<CrewWorktree>, SourceError> {
        let crew_dir = self.paths().crew_dir(rig);
        let mut worktrees = Vec::new();
        for (name, path) in list_subdirs("worktrees", &crew_dir).await? {
            if !has_worktree_link(&path).await {
                continue;
            }
            let branch = match self.worktree_branch(&path, cancel).await {
                Ok(branch) => branch,
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => {
                    warn!(rig, worktree = %name, error = %err, "branch lookup failed");
                    None
                }
            };
            let git_status = match self.worktree_status(&path, cancel).await {
                Ok(status) => status,
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => {
                    warn!(rig, worktree = %name, error = %err, "status lookup failed");
                    UNKNOWN_STATUS.to_string()
                }
            };
            worktrees.push(CrewWorktree {
                rig: rig.to_string(),
                name,
                path: path.display().to_string(),
                branch,
                git_status,
            });
        }
        Ok(worktrees)
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{reader, ScriptedRunner};
    use std::fs;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn only_link_file_checkouts_count() {
        let dir = tempfile::tempdir().expect("tempdir");
        let crew = dir.path().join("gastown").join("crew");
        fs::create_dir_all(crew.join("max")).expect("mkdir max");
        fs::write(crew.join("max").join(".git"), "gitdir: ../../.repo/worktrees/max\n")
            .expect("write link");
        fs::create_dir_all(crew.join("clone").join(".git")).expect("mkdir clone");
        fs::create_dir_all(crew.join("scratch")).expect("mkdir scratch");

        let runner = ScriptedRunner::default()
            .ok("git branch --show-current", "crew/max\n")
            .ok("git status --porcelain", " M src/lib.rs\n?? todo.md\n");
        let (reader, runner) = reader(runner, dir.path());
        let worktrees = reader
            .crew_worktrees("gastown", &CancellationToken::new())
            .await
            .expect("worktrees");

        assert_eq!(worktrees.len(), 1);
        assert_eq!(worktrees[0].name, "max");
        assert_eq!(worktrees[0].branch.as_deref(), Some("crew/max"));
        assert_eq!(worktrees[0].git_status, "2 uncommitted");
        let calls = runner.calls.lock().expect("lock");
        assert!(calls.iter().all(|(_, cwd)| cwd.ends_with("crew/max")));
    }

    #[tokio::test]
    async fn missing_crew_dir_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (reader, _) = reader(ScriptedRunner::default(), dir.path());
        let worktrees = reader
            .crew_worktrees("nowhere", &CancellationToken::new())
            .await
            .expect("worktrees");
        assert!(worktrees.is_empty());
    }

    #[tokio::test]
    async fn git_failures_degrade_to_unknown() {
        let dir = tempfile::tempdir().expect("tempdir");
        let crew = dir.path().join("gastown").join("crew").join("max");
        fs::create_dir_all(&crew).expect("mkdir");
        fs::write(crew.join(".git"), "gitdir: elsewhere\n").expect("write link");
        let (reader, _) = reader(ScriptedRunner::default(), dir.path());
        let worktrees = reader
            .crew_worktrees("gastown", &CancellationToken::new())
            .await
            .expect("worktrees");
        assert_eq!(worktrees[0].git_status, "unknown");
        assert!(worktrees[0].branch.is_none());
    }
}
