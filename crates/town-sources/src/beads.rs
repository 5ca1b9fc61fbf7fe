//! Readers and the two write operations backed by the `bd` issue tracker.

use crate::{SourceError, SourceReader};
use tokio_util::sync::CancellationToken;
use town_core::{DependencyEdit, Issue, IssueComment, IssueDependency};
use tracing::info;

const BD: &str = "bd";

impl SourceReader {
    pub async fn issues(&self, cancel: &CancellationToken) -> Result<Vec<Issue>, SourceError> {
        self.run_json("issues", BD, &["list", "--json", "--limit", "0"], cancel)
            .await
    }

    /// Issues currently claimed by an agent.
    pub async fn active_issues(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Issue>, SourceError> {
        self.run_json(
            "active_issues",
            BD,
            &["list", "--json", "--status=hooked,in_progress", "--limit", "0"],
            cancel,
        )
        .await
    }

    pub async fn issue_dependencies(
        &self,
        issue_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<IssueDependency>, SourceError> {
        self.run_json(
            "issue_dependencies",
            BD,
            &["dep", "list", issue_id, "--json"],
            cancel,
        )
        .await
    }

    pub async fn issue_comments(
        &self,
        issue_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<IssueComment>, SourceError> {
        self.run_json("issue_comments", BD, &["comments", issue_id, "--json"], cancel)
            .await
    }

    /// Adds or removes the edge "`issue_id` depends on `depends_on`".
    pub async fn edit_dependency(
        &self,
        edit: DependencyEdit,
        issue_id: &str,
        depends_on: &str,
        cancel: &CancellationToken,
    ) -> Result<(), SourceError> {
        self.run_text(
            "dependency_edit",
            BD,
            &["dep", edit.as_str(), issue_id, depends_on],
            cancel,
        )
        .await?;
        info!(issue = issue_id, depends_on, edit = %edit, "dependency updated");
        Ok(())
    }

    pub async fn add_comment(
        &self,
        issue_id: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<(), SourceError> {
        self.run_text("comment", BD, &["comments", "add", issue_id, text], cancel)
            .await?;
        info!(issue = issue_id, "comment appended");
        Ok(())
    }
}
