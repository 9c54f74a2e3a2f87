//! Provider backed by a local channel export
//!
//! Serves pages from a JSON file holding either an array of messages or an
//! object with a `messages` array, with the same "before cursor, limit"
//! semantics as a live provider.

use crate::fetcher::{FetcherError, FetcherResult, MessageProvider};
use crate::{Message, MessageId};
use async_trait::async_trait;
use serde::Deserialize;
use std::cmp::Reverse;
use std::path::Path;
use tracing::info;

#[derive(Deserialize)]
#[serde(untagged)]
enum ExportDocument {
    Messages(Vec<Message>),
    Wrapped { messages: Vec<Message> },
}

/// In-memory message source, newest message first
#[derive(Debug, Clone, Default)]
pub struct JsonExportProvider {
    messages: Vec<Message>,
}

impl JsonExportProvider {
    /// Build from messages in any order
    pub fn from_messages(mut messages: Vec<Message>) -> Self {
        messages.sort_by_key(|m| Reverse(m.id));
        messages.dedup_by_key(|m| m.id);
        Self { messages }
    }

    /// Load an export file
    pub fn from_file(path: impl AsRef<Path>) -> FetcherResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| FetcherError::IoError(format!("{}: {e}", path.display())))?;
        let document: ExportDocument = serde_json::from_str(&contents)
            .map_err(|e| FetcherError::ParseError(format!("{}: {e}", path.display())))?;
        let messages = match document {
            ExportDocument::Messages(messages) => messages,
            ExportDocument::Wrapped { messages } => messages,
        };
        info!(path = %path.display(), messages = messages.len(), "Loaded channel export");
        Ok(Self::from_messages(messages))
    }

    /// Number of messages in the export
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the export is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[async_trait]
impl MessageProvider for JsonExportProvider {
    async fn fetch_before(
        &self,
        before: Option<MessageId>,
        limit: usize,
    ) -> FetcherResult<Vec<Message>> {
        let start = match before {
            Some(cursor) => self.messages.partition_point(|m| m.id >= cursor),
            None => 0,
        };
        let end = start.saturating_add(limit).min(self.messages.len());
        Ok(self.messages[start..end].to_vec())
    }
}
