use crate::{read_optional, SourceError, SourceReader};
use std::collections::HashSet;
use town_core::BeadRoute;
use tracing::debug;

/// Parses the line-delimited routing table. Undecodable lines and lines
/// without a prefix are skipped; the first record for a prefix wins.
pub fn parse_routes(contents: &str) -> Vec<BeadRoute> {
    let mut seen = HashSet::new();
    let mut routes = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let route: BeadRoute = match serde_json::from_str(line) {
            Ok(route) => route,
            Err(err) => {
                debug!(line = idx + 1, error = %err, "skipping malformed route");
                continue;
            }
        };
        if route.prefix.trim().is_empty() {
            continue;
        }
        if seen.insert(route.prefix.clone()) {
            routes.push(route);
        }
    }
    routes
}

impl SourceReader {
    pub async fn routes(&self) -> Result<Vec<BeadRoute>, SourceError> {
        let path = self.paths().routes_file();
        Ok(read_optional("routes", &path)
            .await?
            .map(|contents| parse_routes(&contents))
            .unwrap_or_default())
    }
}
