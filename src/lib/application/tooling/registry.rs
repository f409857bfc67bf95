//! Flattened tool catalog built from every live session.
//!
//! The catalog is a snapshot: it is rebuilt for each model request rather
//! than cached, so a server whose tool list changes between turns is picked
//! up on the next request.

use super::interface::{ServerToolInfo, ToolSession};
use crate::types::ToolSpec;
use futures::future::join_all;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A tool together with the session that serves it.
#[derive(Clone)]
pub struct CatalogEntry {
    pub tool: ServerToolInfo,
    pub session: Arc<dyn ToolSession>,
}

impl CatalogEntry {
    pub fn server(&self) -> &str {
        self.session.name()
    }

    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.tool.name.clone(),
            description: self.tool.description.clone().unwrap_or_default(),
            parameters: self
                .tool
                .input_schema
                .clone()
                .unwrap_or_else(empty_object_schema),
        }
    }
}

#[derive(Clone, Default)]
pub struct ToolCatalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl ToolCatalog {
    /// Poll every session's tool list concurrently, each bounded by `timeout`.
    ///
    /// A session that errors or times out contributes no tools. Sessions are
    /// flattened in the order given; on a name clash the earlier session wins.
    pub async fn snapshot(sessions: &[Arc<dyn ToolSession>], timeout: Duration) -> Self {
        let polls = sessions.iter().map(|session| async move {
            match tokio::time::timeout(timeout, session.list_tools()).await {
                Ok(Ok(tools)) => tools,
                Ok(Err(err)) => {
                    warn!(server = %session.name(), %err, "Could not fetch tools from session");
                    Vec::new()
                }
                Err(_) => {
                    warn!(
                        server = %session.name(),
                        timeout_ms = timeout.as_millis() as u64,
                        "Timed out fetching tools from session"
                    );
                    Vec::new()
                }
            }
        });
        let listings = join_all(polls).await;

        Self::from_listings(sessions.iter().cloned().zip(listings))
    }

    /// Build a catalog from per-session listings in registration order.
    pub fn from_listings(
        listings: impl IntoIterator<Item = (Arc<dyn ToolSession>, Vec<ServerToolInfo>)>,
    ) -> Self {
        let mut catalog = Self::default();
        for (session, tools) in listings {
            for tool in tools {
                if let Some(existing) = catalog.index.get(&tool.name) {
                    debug!(
                        tool = %tool.name,
                        shadowed = %session.name(),
                        owner = %catalog.entries[*existing].server(),
                        "Dropping duplicate tool name"
                    );
                    continue;
                }
                catalog
                    .index
                    .insert(tool.name.clone(), catalog.entries.len());
                catalog.entries.push(CatalogEntry {
                    tool,
                    session: Arc::clone(&session),
                });
            }
        }
        catalog
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.index.get(name).map(|&position| &self.entries[position])
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.tool.name.as_str()).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.entries.iter().map(CatalogEntry::spec).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn empty_object_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}
