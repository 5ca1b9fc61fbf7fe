//! Directory-per-plugin scanner for the town and each rig.

use crate::{list_subdirs, read_optional, SourceError, SourceReader};
use std::path::Path;
use town_core::{parse_time, PluginInfo};
use tracing::warn;

const TOWN_SCOPE: &str = "town";
const DESCRIPTOR_FILE: &str = "plugin.md";
const DISABLED_MARKER: &str = ".disabled";
const LAST_ERROR_MARKER: &str = ".last-error";
const LAST_RUN_MARKER: &str = ".last-run";
const FRONT_MATTER_FENCE: &str = "+++";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub description: Option<String>,
    pub gate: Option<String>,
    pub schedule: Option<String>,
    pub cooldown: Option<String>,
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}

/// Extracts the `key = "value"` block between the first two `+++` lines.
/// Keys under a `[gate]` table are read as gate settings; anything
/// unrecognized is ignored.
pub fn parse_front_matter(text: &str) -> FrontMatter {
    let mut matter = FrontMatter::default();
    let mut lines = text.lines().skip_while(|line| line.trim() != FRONT_MATTER_FENCE);
    if lines.next().is_none() {
        return matter;
    }
    let mut table = String::new();
    for line in lines {
        let line = line.trim();
        if line == FRONT_MATTER_FENCE {
            break;
        }
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            table = name.trim().to_string();
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = unquote(value);
        match (table.as_str(), key.trim()) {
            ("", "title") | ("", "name") => {
                if matter.title.is_none() || key.trim() == "title" {
                    matter.title = Some(value);
                }
            }
            ("", "description") => matter.description = Some(value),
            ("", "gate") | ("", "gate_type") | ("gate", "type") => matter.gate = Some(value),
            ("", "schedule") | ("gate", "schedule") => matter.schedule = Some(value),
            ("", "cooldown") | ("gate", "cooldown") | ("gate", "duration") => {
                matter.cooldown = Some(value)
            }
            _ => {}
        }
    }
    matter
}

async fn load_plugin(scope: &str, name: String, dir: &Path) -> Result<PluginInfo, SourceError> {
    let descriptor = read_optional("plugins", &dir.join(DESCRIPTOR_FILE)).await?;
    let matter = descriptor
        .as_deref()
        .map(parse_front_matter)
        .unwrap_or_default();
    let enabled = read_optional("plugins", &dir.join(DISABLED_MARKER))
        .await?
        .is_none();
    let last_error = read_optional("plugins", &dir.join(LAST_ERROR_MARKER))
        .await?
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());
    let last_run = read_optional("plugins", &dir.join(LAST_RUN_MARKER))
        .await?
        .and_then(|text| parse_time(&text));
    Ok(PluginInfo {
        title: matter.title.unwrap_or_else(|| name.clone()),
        name,
        scope: scope.to_string(),
        path: dir.display().to_string(),
        description: matter.description,
        gate: matter.gate,
        schedule: matter.schedule,
        cooldown: matter.cooldown,
        enabled,
        last_error,
        last_run,
    })
}

impl SourceReader {
    /// Scans the town plugin directory and every listed rig's plugin
    /// directory. Missing directories contribute nothing; an unreadable
    /// scope or plugin is skipped so the rest still load.
    pub async fn plugins(&self, rigs: &[String]) -> Result<Vec<PluginInfo>, SourceError> {
        let mut scopes = vec![(TOWN_SCOPE.to_string(), self.paths().town_plugins())];
        scopes.extend(
            rigs.iter()
                .map(|rig| (rig.clone(), self.paths().rig_plugins(rig))),
        );

        let mut plugins = Vec::new();
        for (scope, root) in scopes {
            let entries = match list_subdirs("plugins", &root).await {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(scope = %scope, error = %err, "skipping unreadable plugin scope");
                    continue;
                }
            };
            for (name, dir) in entries {
                match load_plugin(&scope, name, &dir).await {
                    Ok(plugin) => plugins.push(plugin),
                    Err(err) => warn!(scope = %scope, error = %err, "skipping unreadable plugin"),
                }
            }
        }
        Ok(plugins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{reader, ScriptedRunner};
    use std::fs;

    #[test]
    fn front_matter_reads_known_keys_only() {
        let text = r#"+++
name = "stale-branch-reaper"
title = "Stale Branch Reaper"
description = "Deletes merged polecat branches"
version = 2

[gate]
type = "cooldown"
duration = "6h"
+++

# Body is ignored
title = "not front matter"
"#;
        let matter = parse_front_matter(text);
        assert_eq!(matter.title.as_deref(), Some("Stale Branch Reaper"));
        assert_eq!(
            matter.description.as_deref(),
            Some("Deletes merged polecat branches")
        );
        assert_eq!(matter.gate.as_deref(), Some("cooldown"));
        assert_eq!(matter.cooldown.as_deref(), Some("6h"));
        assert!(matter.schedule.is_none());
    }

    #[test]
    fn text_without_fence_has_no_front_matter() {
        assert_eq!(parse_front_matter("title = \"x\""), FrontMatter::default());
    }

    #[tokio::test]
    async fn scans_town_and_rig_scopes_with_markers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let town = dir.path().join("plugins").join("digest");
        fs::create_dir_all(&town).expect("mkdir town plugin");
        fs::write(
            town.join("plugin.md"),
            "+++\ntitle = \"Daily Digest\"\nschedule = \"0 9 * * *\"\n+++\n",
        )
        .expect("write descriptor");
        fs::write(town.join(".last-run"), "2026-01-02T07:09:03Z\n").expect("write last run");

        let rig = dir.path().join("gastown").join("plugins").join("reaper");
        fs::create_dir_all(&rig).expect("mkdir rig plugin");
        fs::write(rig.join(".disabled"), "").expect("write disabled");
        fs::write(rig.join(".last-error"), "git push rejected\n").expect("write error");

        let (reader, _) = reader(ScriptedRunner::default(), dir.path());
        let plugins = reader
            .plugins(&["gastown".to_string(), "beads".to_string()])
            .await
            .expect("plugins");

        assert_eq!(plugins.len(), 2);
        let digest = &plugins[0];
        assert_eq!(digest.scope, "town");
        assert_eq!(digest.title, "Daily Digest");
        assert_eq!(digest.schedule.as_deref(), Some("0 9 * * *"));
        assert!(digest.enabled);
        assert!(digest.last_run.is_some());

        let reaper = &plugins[1];
        assert_eq!(reaper.scope, "gastown");
        assert_eq!(reaper.title, "reaper");
        assert!(!reaper.enabled);
        assert_eq!(reaper.last_error.as_deref(), Some("git push rejected"));
    }

    #[tokio::test]
    async fn broken_plugin_does_not_hide_its_siblings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let broken = dir.path().join("plugins").join("broken");
        fs::create_dir_all(broken.join(".disabled")).expect("mkdir marker as dir");
        fs::create_dir_all(dir.path().join("plugins").join("digest")).expect("mkdir digest");
        fs::create_dir_all(dir.path().join("gastown").join("plugins").join("reaper"))
            .expect("mkdir rig plugin");

        let (reader, _) = reader(ScriptedRunner::default(), dir.path());
        let plugins = reader
            .plugins(&["gastown".to_string()])
            .await
            .expect("plugins");

        let names: Vec<_> = plugins.iter().map(|plugin| plugin.name.as_str()).collect();
        assert_eq!(names, vec!["digest", "reaper"]);
    }
}
