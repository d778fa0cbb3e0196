//! Typed view of a ComfyUI history entry.
//!
//! Once a prompt finishes, `/history/{prompt_id}` returns an entry whose
//! `outputs` map node ids to the artifacts that node produced, grouped
//! by kind (`images`, `files`, `videos`). Other per-node keys such as
//! `animated` or `text` are ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Status string ComfyUI uses for a prompt whose execution failed.
pub const STATUS_ERROR: &str = "error";

/// Message type carrying the exception details of a failed prompt.
const EXECUTION_ERROR_MESSAGE: &str = "execution_error";

/// Result payload of one finished workflow run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub outputs: BTreeMap<String, NodeOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ExecutionStatus>,
}

/// Artifacts produced by a single node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    #[serde(default)]
    pub images: Vec<ArtifactDescriptor>,
    #[serde(default)]
    pub files: Vec<ArtifactDescriptor>,
    #[serde(default)]
    pub videos: Vec<ArtifactDescriptor>,
}

/// A file written by the engine, addressed relative to its output root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub subfolder: Option<String>,
    /// Storage kind reported by ComfyUI (`output`, `temp`, ...).
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Execution summary ComfyUI attaches to a history entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStatus {
    #[serde(default)]
    pub status_str: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
    /// `[message_type, payload]` pairs recorded during execution.
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
}

impl NodeOutput {
    /// All artifacts of this node: images, then files, then videos.
    pub fn artifacts(&self) -> impl Iterator<Item = &ArtifactDescriptor> {
        self.images
            .iter()
            .chain(self.files.iter())
            .chain(self.videos.iter())
    }
}

impl ArtifactDescriptor {
    /// Path relative to the output directory: `subfolder/filename`, or just
    /// `filename` when the subfolder is empty. `None` without a filename.
    pub fn relative_path(&self) -> Option<String> {
        let filename = self.filename.as_deref().filter(|f| !f.is_empty())?;
        let subfolder = self
            .subfolder
            .as_deref()
            .map(|s| s.trim_matches('/'))
            .unwrap_or("");
        if subfolder.is_empty() {
            Some(filename.to_string())
        } else {
            Some(format!("{subfolder}/{filename}"))
        }
    }
}

impl HistoryEntry {
    /// Whether ComfyUI marked this run as failed.
    pub fn is_error(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.status_str.as_deref())
            .is_some_and(|s| s == STATUS_ERROR)
    }

    /// Exception message of the first `execution_error`, if recorded.
    pub fn error_message(&self) -> Option<String> {
        let status = self.status.as_ref()?;
        status.messages.iter().find_map(|message| {
            let pair = message.as_array()?;
            if pair.first()?.as_str()? != EXECUTION_ERROR_MESSAGE {
                return None;
            }
            let details = pair.get(1)?;
            let text = details.get("exception_message")?.as_str()?;
            match details.get("node_id").and_then(|n| n.as_str()) {
                Some(node) => Some(format!("node {node}: {}", text.trim())),
                None => Some(text.trim().to_string()),
            }
        })
    }

    /// Total number of artifacts across all nodes.
    pub fn artifact_count(&self) -> usize {
        self.outputs.values().map(|o| o.artifacts().count()).sum()
    }
}
