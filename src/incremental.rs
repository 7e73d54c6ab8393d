//! Incremental re-analysis.
//!
//! Handles efficient updates when files change: per-file extraction is carried
//! over for files whose content hash is unchanged, and only cross-file
//! resolution and graph assembly run again over the whole set.

use crate::analyzer::{AnalysisSnapshot, Analyzer, CancellationFlag};
use crate::error::AnalysisResult;
use crate::provider::FileProvider;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

impl Analyzer {
    /// Re-analyse a project against a previous snapshot of it.
    ///
    /// Reuse only applies when the previous snapshot was built with the same
    /// options; otherwise this is a full run. The result is identical to a
    /// fresh `analyze_project` over the same inputs.
    pub async fn reanalyze(
        &self,
        previous: &AnalysisSnapshot,
        files: &[String],
        provider: Arc<dyn FileProvider>,
        cancel: &CancellationFlag,
    ) -> AnalysisResult<AnalysisSnapshot> {
        let name = previous.project.name.clone();
        self.run(&name, files, provider, cancel, Some(previous)).await
    }
}

/// Identity of an edge for diffing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    pub kind: RelationType,
    pub source: SymbolId,
    pub target: SymbolId,
}

impl From<&Relationship> for EdgeKey {
    fn from(rel: &Relationship) -> Self {
        Self {
            kind: rel.kind,
            source: rel.source.clone(),
            target: rel.target.clone(),
        }
    }
}

/// Differences between two snapshots of one project. All lists are sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    pub files_added: Vec<String>,
    pub files_removed: Vec<String>,
    /// Present in both with a different content hash.
    pub files_changed: Vec<String>,
    pub symbols_added: Vec<SymbolId>,
    pub symbols_removed: Vec<SymbolId>,
    /// Same id, different attributes (location, metrics, signature...).
    pub symbols_changed: Vec<SymbolId>,
    /// Edges are compared as a multiset: a duplicated call counts twice.
    pub edges_added: Vec<EdgeKey>,
    pub edges_removed: Vec<EdgeKey>,
}

impl SnapshotDiff {
    pub fn between(old: &AnalysisSnapshot, new: &AnalysisSnapshot) -> Self {
        let mut diff = SnapshotDiff::default();

        let old_files: BTreeMap<&str, &str> = old
            .graph
            .files()
            .map(|f| (f.path.as_str(), f.content_hash.as_str()))
            .collect();
        let new_files: BTreeMap<&str, &str> = new
            .graph
            .files()
            .map(|f| (f.path.as_str(), f.content_hash.as_str()))
            .collect();
        for (path, hash) in &new_files {
            match old_files.get(path) {
                None => diff.files_added.push(path.to_string()),
                Some(old_hash) if old_hash != hash => diff.files_changed.push(path.to_string()),
                Some(_) => {}
            }
        }
        diff.files_removed = old_files
            .keys()
            .filter(|p| !new_files.contains_key(*p))
            .map(|p| p.to_string())
            .collect();

        let old_ids: BTreeSet<&SymbolId> = old.graph.symbols().map(|s| &s.id).collect();
        let new_ids: BTreeSet<&SymbolId> = new.graph.symbols().map(|s| &s.id).collect();
        diff.symbols_added = new_ids.difference(&old_ids).map(|id| (*id).clone()).collect();
        diff.symbols_removed = old_ids.difference(&new_ids).map(|id| (*id).clone()).collect();
        diff.symbols_changed = new_ids
            .intersection(&old_ids)
            .filter(|id| old.graph.symbol(id) != new.graph.symbol(id))
            .map(|id| (*id).clone())
            .collect();

        let mut counts: BTreeMap<EdgeKey, isize> = BTreeMap::new();
        for rel in old.graph.relationships() {
            *counts.entry(EdgeKey::from(rel)).or_default() -= 1;
        }
        for rel in new.graph.relationships() {
            *counts.entry(EdgeKey::from(rel)).or_default() += 1;
        }
        for (key, delta) in counts {
            let (list, n) = if delta > 0 {
                (&mut diff.edges_added, delta)
            } else {
                (&mut diff.edges_removed, -delta)
            };
            for _ in 0..n {
                list.push(key.clone());
            }
        }

        diff
    }

    pub fn is_empty(&self) -> bool {
        self.files_added.is_empty()
            && self.files_removed.is_empty()
            && self.files_changed.is_empty()
            && self.symbols_added.is_empty()
            && self.symbols_removed.is_empty()
            && self.symbols_changed.is_empty()
            && self.edges_added.is_empty()
            && self.edges_removed.is_empty()
    }
}
