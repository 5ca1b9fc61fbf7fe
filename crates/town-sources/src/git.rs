use crate::{SourceError, SourceReader};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use town_core::{parse_time, CommitInfo};

const GIT: &str = "git";

/// Counts non-empty `git status --porcelain` lines.
pub fn count_uncommitted(porcelain: &str) -> usize {
    porcelain
        .lines()
        .filter(|line| !line.trim().is_empty())
        .count()
}

pub fn describe_git_status(uncommitted: usize) -> String {
    if uncommitted == 0 {
        "clean".to_string()
    } else {
        format!("{uncommitted} uncommitted")
    }
}

/// Parses `git log --format=%h%x09%an%x09%aI%x09%s` output.
pub fn parse_git_log(output: &str) -> Vec<CommitInfo> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(4, '\t');
            let hash = parts.next()?.trim();
            if hash.is_empty() {
                return None;
            }
            let author = parts.next().unwrap_or("").trim();
            let committed_at = parse_time(parts.next().unwrap_or(""));
            let subject = parts.next().unwrap_or("").trim();
            Some(CommitInfo {
                hash: hash.to_string(),
                author: author.to_string(),
                committed_at,
                subject: subject.to_string(),
            })
        })
        .collect()
}

impl SourceReader {
    pub async fn recent_commits(
        &self,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<CommitInfo>, SourceError> {
        let count = format!("-{limit}");
        let output = self
            .run_text(
                "git_log",
                GIT,
                &["log", &count, "--format=%h%x09%an%x09%aI%x09%s"],
                cancel,
            )
            .await?;
        Ok(parse_git_log(&output))
    }

    pub(crate) async fn worktree_branch(
        &self,
        worktree: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, SourceError> {
        let output = self
            .run_text_in("worktrees", GIT, &["branch", "--show-current"], worktree, cancel)
            .await?;
        let branch = output.trim();
        Ok((!branch.is_empty()).then(|| branch.to_string()))
    }

    pub(crate) async fn worktree_status(
        &self,
        worktree: &Path,
        cancel: &CancellationToken,
    ) -> Result<String, SourceError> {
        let output = self
            .run_text_in("worktrees", GIT, &["status", "--porcelain"], worktree, cancel)
            .await?;
        Ok(describe_git_status(count_uncommitted(&output)))
    }
}
