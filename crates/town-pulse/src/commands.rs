//! One-shot subcommands. The dashboard itself never mutates the workspace;
//! these are the only paths that write through to the tracker or settings.

use crate::Config;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use town_core::DependencyEdit;
use town_sources::{load_rig_settings, save_rig_settings, RigSettings, SourceReader, SystemRunner};

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
pub enum Command {
    /// Inspect or edit issue dependencies
    Dep {
        #[command(subcommand)]
        action: DepCommand,
    },
    /// Read or append issue comments
    Comment {
        #[command(subcommand)]
        action: CommentCommand,
    },
    /// Show or update per-rig settings
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
pub enum DepCommand {
    List(IssueArgs),
    Add(DepEditArgs),
    #[command(alias = "rm")]
    Remove(DepEditArgs),
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
pub enum CommentCommand {
    List(IssueArgs),
    Add(CommentAddArgs),
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
pub enum SettingsCommand {
    Show(RigArgs),
    Set(SettingsSetArgs),
}

#[derive(Args, Debug)]
pub struct IssueArgs {
    pub issue: String,
}

#[derive(Args, Debug)]
pub struct DepEditArgs {
    pub issue: String,
    /// The issue that `issue` depends on.
    pub depends_on: String,
}

#[derive(Args, Debug)]
pub struct CommentAddArgs {
    pub issue: String,
    pub text: String,
}

#[derive(Args, Debug)]
pub struct RigArgs {
    pub rig: String,
}

#[derive(Args, Debug)]
pub struct SettingsSetArgs {
    pub rig: String,
    #[arg(long)]
    pub prefix: Option<String>,
    #[arg(long)]
    pub theme: Option<String>,
    #[arg(long)]
    pub max_workers: Option<u32>,
}

impl SettingsSetArgs {
    fn to_settings(&self) -> RigSettings {
        RigSettings {
            prefix: self.prefix.clone(),
            theme: self.theme.clone(),
            max_workers: self.max_workers,
            merge_queue: None,
        }
    }
}

fn reader(config: &Config) -> SourceReader {
    let loader = config.loader_config();
    let runner = match loader.timeout {
        Some(limit) => SystemRunner::with_timeout(limit),
        None => SystemRunner::new(),
    };
    SourceReader::new(Arc::new(runner), loader.town_root)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{payload}");
    Ok(())
}

pub async fn handle_command(command: Command, config: &Config) -> Result<()> {
    let cancel = CancellationToken::new();
    match command {
        Command::Dep { action } => handle_dep(action, &reader(config), &cancel).await,
        Command::Comment { action } => handle_comment(action, &reader(config), &cancel).await,
        Command::Settings { action } => handle_settings(action, &reader(config)),
    }
}

async fn handle_dep(
    action: DepCommand,
    reader: &SourceReader,
    cancel: &CancellationToken,
) -> Result<()> {
    let (edit, args) = match action {
        DepCommand::List(args) => {
            let deps = reader
                .issue_dependencies(&args.issue, cancel)
                .await
                .with_context(|| format!("Failed to list dependencies of {}", args.issue))?;
            return print_json(&deps);
        }
        DepCommand::Add(args) => (DependencyEdit::Add, args),
        DepCommand::Remove(args) => (DependencyEdit::Remove, args),
    };
    reader
        .edit_dependency(edit, &args.issue, &args.depends_on, cancel)
        .await
        .with_context(|| format!("Failed to {edit} dependency {} -> {}", args.issue, args.depends_on))?;
    println!("{edit}: {} depends on {}", args.issue, args.depends_on);
    Ok(())
}

async fn handle_comment(
    action: CommentCommand,
    reader: &SourceReader,
    cancel: &CancellationToken,
) -> Result<()> {
    match action {
        CommentCommand::List(args) => {
            let comments = reader
                .issue_comments(&args.issue, cancel)
                .await
                .with_context(|| format!("Failed to read comments on {}", args.issue))?;
            print_json(&comments)
        }
        CommentCommand::Add(args) => {
            reader
                .add_comment(&args.issue, &args.text, cancel)
                .await
                .with_context(|| format!("Failed to comment on {}", args.issue))?;
            println!("Comment added to {}", args.issue);
            Ok(())
        }
    }
}

fn handle_settings(action: SettingsCommand, reader: &SourceReader) -> Result<()> {
    match action {
        SettingsCommand::Show(args) => {
            let settings = load_rig_settings(reader.paths(), &args.rig)
                .with_context(|| format!("Failed to load settings for {}", args.rig))?;
            print_json(&settings)
        }
        SettingsCommand::Set(args) => {
            let settings = args.to_settings();
            save_rig_settings(reader.paths(), &args.rig, &settings)
                .with_context(|| format!("Failed to save settings for {}", args.rig))?;
            println!("Updated settings for {}", args.rig);
            Ok(())
        }
    }
}
