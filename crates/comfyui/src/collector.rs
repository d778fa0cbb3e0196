//! Gathers the artifacts a workflow produced.
//!
//! The primary source is the history entry ComfyUI returns. When that
//! entry lists nothing, [`OutputCollector::collect_from_disk`] scans the
//! shared output directory for files whose names start with one of the
//! graph's `filename_prefix` values and were modified after the job began.

use std::collections::BTreeSet;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};

use motion_core::graph::ProcessingGraph;
use motion_core::naming::DEFAULT_FALLBACK_PREFIX;

use crate::history::HistoryEntry;

/// Tolerance applied to the job start time when matching file mtimes.
pub const MTIME_SKEW: Duration = Duration::from_secs(5);

/// Resolves artifacts relative to the directory ComfyUI writes into.
#[derive(Debug, Clone)]
pub struct OutputCollector {
    output_dir: PathBuf,
}

impl OutputCollector {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Relative paths of every artifact listed in `entry`, deduplicated,
    /// in node order and then images, files, videos within a node.
    pub fn collect(&self, entry: &HistoryEntry) -> Vec<String> {
        let mut seen = BTreeSet::new();
        entry
            .outputs
            .values()
            .flat_map(|node| node.artifacts())
            .filter_map(|artifact| artifact.relative_path())
            .filter(|path| seen.insert(path.clone()))
            .collect()
    }

    /// Files under the output directory matching one of the graph's
    /// filename prefixes and modified at or after `since - MTIME_SKEW`.
    ///
    /// A missing output directory yields an empty list.
    pub async fn collect_from_disk(
        &self,
        graph: &ProcessingGraph,
        since: SystemTime,
    ) -> io::Result<Vec<String>> {
        let mut prefixes = graph.filename_prefixes();
        if prefixes.is_empty() {
            prefixes.push(DEFAULT_FALLBACK_PREFIX.to_string());
        }
        let cutoff = since.checked_sub(MTIME_SKEW).unwrap_or(SystemTime::UNIX_EPOCH);

        let mut found = BTreeSet::new();
        for prefix in &prefixes {
            let (subdir, stem) = split_prefix(prefix);
            if !is_safe_relative(Path::new(subdir)) {
                tracing::warn!(prefix = %prefix, "Skipping unsafe filename prefix");
                continue;
            }
            let dir = self.output_dir.join(subdir);

            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };

            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name();
                let Some(name) = name.to_str() else { continue };
                if !name.starts_with(stem) {
                    continue;
                }
                // The engine may rename or remove temp files mid-scan.
                let metadata = match tokio::fs::metadata(entry.path()).await {
                    Ok(metadata) => metadata,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(e),
                };
                if !metadata.is_file() || metadata.modified()? < cutoff {
                    continue;
                }
                let relative = if subdir.is_empty() {
                    name.to_string()
                } else {
                    format!("{subdir}/{name}")
                };
                found.insert(relative);
            }
        }

        Ok(found.into_iter().collect())
    }

    /// Absolute location of `relative` inside the output directory, or
    /// `None` when it would escape it.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let path = Path::new(relative);
        if relative.is_empty() || !is_safe_relative(path) {
            return None;
        }
        Some(self.output_dir.join(path))
    }
}

/// Split `"clips/scene_"` into `("clips", "scene_")`.
fn split_prefix(prefix: &str) -> (&str, &str) {
    match prefix.rsplit_once('/') {
        Some((dir, stem)) => (dir.trim_matches('/'), stem),
        None => ("", prefix),
    }
}

/// True when `path` only has normal components.
pub fn is_safe_relative(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
