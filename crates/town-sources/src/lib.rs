pub mod beads;
pub mod doctor;
pub mod events;
pub mod exec;
pub mod git;
pub mod plugins;
pub mod routes;
pub mod settings;
pub mod town;
pub mod worktrees;

pub use exec::{command_line, CommandOutput, CommandRunner, ExecError, SystemRunner};
pub use events::DEFAULT_EVENT_LIMIT;
pub use settings::{
    load_rig_settings, save_rig_settings, MergeQueueSettings, RigSettings, SettingsError,
};

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{name}: `{command}` failed: {error}")]
    Command {
        name: &'static str,
        command: String,
        #[source]
        error: ExecError,
    },
    #[error("{name}: cannot decode output of `{command}`: {error}")]
    Decode {
        name: &'static str,
        command: String,
        #[source]
        error: serde_json::Error,
    },
    #[error("{name}: cannot read {}: {error}", .path.display())]
    Io {
        name: &'static str,
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
}

impl SourceError {
    /// The command line or path that produced this error.
    pub fn resource(&self) -> String {
        match self {
            SourceError::Command { command, .. } | SourceError::Decode { command, .. } => {
                command.clone()
            }
            SourceError::Io { path, .. } => path.display().to_string(),
        }
    }

    /// The failure without the source-name prefix carried by `Display`.
    pub fn detail(&self) -> String {
        match self {
            SourceError::Command { command, error, .. } => format!("`{command}` failed: {error}"),
            SourceError::Decode { command, error, .. } => {
                format!("cannot decode output of `{command}`: {error}")
            }
            SourceError::Io { path, error, .. } => {
                format!("cannot read {}: {error}", path.display())
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            SourceError::Command {
                error: ExecError::Cancelled { .. },
                ..
            }
        )
    }
}

/// Decodes a structured source body. An empty body or the literal `null`
/// means "no data" and yields the type's empty value.
pub fn decode_json<T>(body: &str) -> Result<T, serde_json::Error>
where
    T: DeserializeOwned + Default,
{
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(T::default());
    }
    serde_json::from_str(trimmed)
}

/// Fixed on-disk locations inside a town.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TownPaths {
    root: PathBuf,
}

impl TownPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn routes_file(&self) -> PathBuf {
        self.root.join(".beads").join("routes.jsonl")
    }

    pub fn event_log(&self) -> PathBuf {
        self.root.join("logs").join("town.log")
    }

    pub fn town_plugins(&self) -> PathBuf {
        self.root.join("plugins")
    }

    pub fn rig_dir(&self, rig: &str) -> PathBuf {
        self.root.join(rig)
    }

    pub fn rig_plugins(&self, rig: &str) -> PathBuf {
        self.rig_dir(rig).join("plugins")
    }

    pub fn crew_dir(&self, rig: &str) -> PathBuf {
        self.rig_dir(rig).join("crew")
    }

    pub fn rigs_registry(&self) -> PathBuf {
        self.root.join("mayor").join("rigs.json")
    }

    pub fn rig_settings(&self, rig: &str) -> PathBuf {
        self.rig_dir(rig).join("settings").join("config.json")
    }
}

/// Entry point for every source read. Cheap to clone; clones share the
/// command runner.
#[derive(Clone)]
pub struct SourceReader {
    runner: Arc<dyn CommandRunner>,
    paths: TownPaths,
}

impl SourceReader {
    pub fn new(runner: Arc<dyn CommandRunner>, town_root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            paths: TownPaths::new(town_root),
        }
    }

    pub fn paths(&self) -> &TownPaths {
        &self.paths
    }

    pub(crate) async fn exec(
        &self,
        program: &str,
        args: &[&str],
        cwd: &Path,
        cancel: &CancellationToken,
    ) -> (String, Result<CommandOutput, ExecError>) {
        let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        let command = command_line(program, &args);
        let result = self.runner.run(program, &args, cwd, cancel).await;
        (command, result)
    }

    /// Runs a command in the town root and returns its standard output.
    pub(crate) async fn run_text(
        &self,
        name: &'static str,
        program: &str,
        args: &[&str],
        cancel: &CancellationToken,
    ) -> Result<String, SourceError> {
        self.run_text_in(name, program, args, self.paths.root(), cancel)
            .await
    }

    pub(crate) async fn run_text_in(
        &self,
        name: &'static str,
        program: &str,
        args: &[&str],
        cwd: &Path,
        cancel: &CancellationToken,
    ) -> Result<String, SourceError> {
        let (command, result) = self.exec(program, args, cwd, cancel).await;
        result
            .map(|output| output.stdout)
            .map_err(|error| SourceError::Command {
                name,
                command,
                error,
            })
    }

    pub(crate) async fn run_json<T>(
        &self,
        name: &'static str,
        program: &str,
        args: &[&str],
        cancel: &CancellationToken,
    ) -> Result<T, SourceError>
    where
        T: DeserializeOwned + Default,
    {
        let (command, result) = self.exec(program, args, self.paths.root(), cancel).await;
        let output = result.map_err(|error| SourceError::Command {
            name,
            command: command.clone(),
            error,
        })?;
        decode_json(&output.stdout).map_err(|error| SourceError::Decode {
            name,
            command,
            error,
        })
    }
}

/// Reads a text file, mapping a missing file to `None`.
pub(crate) async fn read_optional(
    name: &'static str,
    path: &Path,
) -> Result<Option<String>, SourceError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).to_string())),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(SourceError::Io {
            name,
            path: path.to_path_buf(),
            error,
        }),
    }
}

/// Lists subdirectories of `dir`, sorted by name. A missing directory has no
/// children.
pub(crate) async fn list_subdirs(
    name: &'static str,
    dir: &Path,
) -> Result<Vec<(String, PathBuf)>, SourceError> {
    let io_err = |error| SourceError::Io {
        name,
        path: dir.to_path_buf(),
        error,
    };
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(io_err(error)),
    };
    let mut dirs = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let Ok(file_type) = entry.file_type().await else {
            continue;
        };
        if file_type.is_dir() {
            dirs.push((entry.file_name().to_string_lossy().to_string(), entry.path()));
        }
    }
    dirs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(dirs)
}
