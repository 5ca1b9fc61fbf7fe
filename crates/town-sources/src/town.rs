//! Readers backed by the `gt` workspace manager.

use crate::{SourceError, SourceReader};
use std::collections::BTreeMap;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use town_core::{Convoy, ConvoyDetail, MailMessage, MergeRequest, Polecat, TownStatus};
use tracing::warn;

const GT: &str = "gt";

impl SourceReader {
    pub async fn town_status(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<TownStatus>, SourceError> {
        self.run_json("status", GT, &["status", "--json"], cancel)
            .await
    }

    pub async fn polecats(&self, cancel: &CancellationToken) -> Result<Vec<Polecat>, SourceError> {
        self.run_json("polecats", GT, &["polecat", "list", "--all", "--json"], cancel)
            .await
    }

    pub async fn convoys(&self, cancel: &CancellationToken) -> Result<Vec<Convoy>, SourceError> {
        self.run_json("convoys", GT, &["convoy", "list", "--json"], cancel)
            .await
    }

    pub async fn closed_convoys(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Convoy>, SourceError> {
        self.run_json(
            "closed_convoys",
            GT,
            &["convoy", "list", "--status=closed", "--json"],
            cancel,
        )
        .await
    }

    pub async fn convoy_detail(
        &self,
        convoy_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ConvoyDetail>, SourceError> {
        self.run_json(
            "convoy_detail",
            GT,
            &["convoy", "status", convoy_id, "--json"],
            cancel,
        )
        .await
    }

    /// Loads every convoy's detail concurrently. A convoy whose detail call
    /// fails keeps a degraded detail built from its list entry.
    pub async fn convoy_details(
        &self,
        convoys: &[Convoy],
        cancel: &CancellationToken,
    ) -> BTreeMap<String, ConvoyDetail> {
        let mut pending = JoinSet::new();
        for convoy in convoys {
            let reader = self.clone();
            let cancel = cancel.clone();
            let convoy_id = convoy.id.clone();
            pending.spawn(async move {
                let result = reader.convoy_detail(&convoy_id, &cancel).await;
                (convoy_id, result)
            });
        }

        let mut details = BTreeMap::new();
        while let Some(joined) = pending.join_next().await {
            match joined {
                Ok((convoy_id, Ok(Some(detail)))) => {
                    details.insert(convoy_id, detail);
                }
                Ok((convoy_id, Ok(None))) => {
                    warn!(convoy = %convoy_id, "convoy detail empty; using list entry");
                }
                Ok((convoy_id, Err(err))) => {
                    warn!(convoy = %convoy_id, error = %err, "convoy detail failed; using list entry");
                }
                Err(err) => warn!(error = %err, "convoy detail task aborted"),
            }
        }

        for convoy in convoys {
            details
                .entry(convoy.id.clone())
                .or_insert_with(|| ConvoyDetail::from(convoy));
        }
        details
    }

    pub async fn mail_inbox(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<MailMessage>, SourceError> {
        self.run_json("mail", GT, &["mail", "inbox", "--json"], cancel)
            .await
    }

    pub async fn merge_queue(
        &self,
        rig: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<MergeRequest>, SourceError> {
        self.run_json("merge_queue", GT, &["mq", "list", rig, "--json"], cancel)
            .await
    }
}
