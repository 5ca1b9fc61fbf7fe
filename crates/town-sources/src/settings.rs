//! Per-rig settings split across the shared rig registry (`mayor/rigs.json`)
//! and the rig-local `settings/config.json`. Both files are read-merge-write:
//! fields this module does not own are preserved.

use crate::TownPaths;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid settings for rig {rig}: {reason}")]
    Invalid { rig: String, reason: String },
    #[error("cannot access {}: {error}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
    #[error("malformed JSON in {}: {error}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        error: serde_json::Error,
    },
    #[error("{} must contain a JSON object", .0.display())]
    NotAnObject(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeQueueSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub target_branch: Option<String>,
    #[serde(default)]
    pub run_tests: bool,
    #[serde(default)]
    pub test_command: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RigSettings {
    /// Issue-id prefix, stored in the shared registry.
    pub prefix: Option<String>,
    pub theme: Option<String>,
    pub max_workers: Option<u32>,
    pub merge_queue: Option<MergeQueueSettings>,
}

impl RigSettings {
    pub fn validate(&self, rig: &str) -> Result<(), SettingsError> {
        let invalid = |reason: &str| SettingsError::Invalid {
            rig: rig.to_string(),
            reason: reason.to_string(),
        };
        if rig.trim().is_empty() || rig.contains('/') {
            return Err(invalid("rig name must be a single path segment"));
        }
        if let Some(prefix) = &self.prefix {
            if prefix.is_empty() {
                return Err(invalid("prefix cannot be empty"));
            }
            if !prefix
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
            {
                return Err(invalid("prefix may only contain letters, digits and '-'"));
            }
        }
        if self.max_workers == Some(0) {
            return Err(invalid("max_workers must be greater than zero"));
        }
        if matches!(&self.theme, Some(theme) if theme.trim().is_empty()) {
            return Err(invalid("theme cannot be blank"));
        }
        Ok(())
    }
}

fn read_object(path: &Path) -> Result<Map<String, Value>, SettingsError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
        Err(error) => {
            return Err(SettingsError::Io {
                path: path.to_path_buf(),
                error,
            })
        }
    };
    if contents.trim().is_empty() {
        return Ok(Map::new());
    }
    let value: Value = serde_json::from_str(&contents).map_err(|error| SettingsError::Json {
        path: path.to_path_buf(),
        error,
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(SettingsError::NotAnObject(path.to_path_buf())),
    }
}

fn write_object(path: &Path, object: Map<String, Value>) -> Result<(), SettingsError> {
    let io_err = |error| SettingsError::Io {
        path: path.to_path_buf(),
        error,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let payload =
        serde_json::to_string_pretty(&Value::Object(object)).map_err(|error| SettingsError::Json {
            path: path.to_path_buf(),
            error,
        })?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, payload).map_err(io_err)?;
    fs::rename(&tmp_path, path).map_err(io_err)?;
    Ok(())
}

/// Removes and returns the object stored under `key`; any non-object value
/// is discarded.
fn take_object(parent: &mut Map<String, Value>, key: &str) -> Map<String, Value> {
    match parent.remove(key) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

pub fn load_rig_settings(paths: &TownPaths, rig: &str) -> Result<RigSettings, SettingsError> {
    let registry = read_object(&paths.rigs_registry())?;
    let prefix = registry
        .get("rigs")
        .and_then(|rigs| rigs.get(rig))
        .and_then(|entry| entry.get("beads"))
        .and_then(|beads| beads.get("prefix"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let local_path = paths.rig_settings(rig);
    let local = read_object(&local_path)?;
    let theme = local.get("theme").and_then(Value::as_str).map(str::to_string);
    let max_workers = local
        .get("max_workers")
        .and_then(Value::as_u64)
        .and_then(|value| u32::try_from(value).ok());
    let merge_queue = match local.get("merge_queue") {
        Some(value) => Some(
            serde_json::from_value(value.clone()).map_err(|error| SettingsError::Json {
                path: local_path.clone(),
                error,
            })?,
        ),
        None => None,
    };

    Ok(RigSettings {
        prefix,
        theme,
        max_workers,
        merge_queue,
    })
}

/// Validates and persists `settings`. Only fields that are `Some` are
/// written; everything else in both files is left untouched.
pub fn save_rig_settings(
    paths: &TownPaths,
    rig: &str,
    settings: &RigSettings,
) -> Result<(), SettingsError> {
    settings.validate(rig)?;

    if let Some(prefix) = &settings.prefix {
        let registry_path = paths.rigs_registry();
        let mut registry = read_object(&registry_path)?;
        let mut rigs = take_object(&mut registry, "rigs");
        let mut entry = take_object(&mut rigs, rig);
        let mut beads = take_object(&mut entry, "beads");
        beads.insert("prefix".to_string(), Value::String(prefix.clone()));
        entry.insert("beads".to_string(), Value::Object(beads));
        rigs.insert(rig.to_string(), Value::Object(entry));
        registry.insert("rigs".to_string(), Value::Object(rigs));
        write_object(&registry_path, registry)?;
    }

    if settings.theme.is_some() || settings.max_workers.is_some() || settings.merge_queue.is_some()
    {
        let local_path = paths.rig_settings(rig);
        let mut local = read_object(&local_path)?;
        if let Some(theme) = &settings.theme {
            local.insert("theme".to_string(), Value::String(theme.clone()));
        }
        if let Some(max_workers) = settings.max_workers {
            local.insert("max_workers".to_string(), Value::from(max_workers));
        }
        if let Some(merge_queue) = &settings.merge_queue {
            let encoded = serde_json::to_value(merge_queue).map_err(|error| SettingsError::Json {
                path: local_path.clone(),
                error,
            })?;
            let mut existing = take_object(&mut local, "merge_queue");
            if let Value::Object(fields) = encoded {
                existing.extend(fields);
            }
            local.insert("merge_queue".to_string(), Value::Object(existing));
        }
        write_object(&local_path, local)?;
    }

    info!(rig, "rig settings saved");
    Ok(())
}
