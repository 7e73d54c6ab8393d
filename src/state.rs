//! Snapshot store and the engine's query surface.
//!
//! `EngineState` keeps the latest published snapshot of every analysed
//! project. Publishing swaps an `Arc` in a `DashMap` shard, so readers holding
//! the previous snapshot keep a consistent view until they drop it.

use crate::analyzer::{AnalysisSnapshot, Analyzer, CancellationFlag, RunStats};
use crate::config::AnalysisOptions;
use crate::error::{AnalysisError, AnalysisResult};
use crate::incremental::SnapshotDiff;
use crate::provider::FileProvider;
use crate::query::{self, Cycle, GraphView, ImpactReport, RelatedSymbol};
use crate::search::{self, SearchHit, SearchQuery};
use crate::types::*;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Engine state shared by callers.
pub struct EngineState {
    analyzer: RwLock<Analyzer>,
    /// Latest snapshot per project id.
    snapshots: DashMap<String, Arc<AnalysisSnapshot>>,
}

impl EngineState {
    pub fn new(analyzer: Analyzer) -> Self {
        Self {
            analyzer: RwLock::new(analyzer),
            snapshots: DashMap::new(),
        }
    }

    pub fn with_options(options: AnalysisOptions) -> AnalysisResult<Self> {
        Ok(Self::new(Analyzer::new(options)?))
    }

    /// Options used by later runs. Published snapshots are untouched.
    pub fn set_options(&self, options: AnalysisOptions) -> AnalysisResult<()> {
        let analyzer = Analyzer::with_registry(self.analyzer.read().registry().clone(), options)?;
        *self.analyzer.write() = analyzer;
        Ok(())
    }

    pub fn options(&self) -> AnalysisOptions {
        self.analyzer.read().options().clone()
    }

    fn analyzer(&self) -> Analyzer {
        self.analyzer.read().clone()
    }

    fn publish(&self, snapshot: AnalysisSnapshot) -> Arc<AnalysisSnapshot> {
        let snapshot = Arc::new(snapshot);
        let id = snapshot.project_id().to_string();
        info!(project = %id, "snapshot published");
        self.snapshots.insert(id, Arc::clone(&snapshot));
        snapshot
    }

    // ========================================================================
    // Runs
    // ========================================================================

    /// Analyse a project and publish the result. A failed or cancelled run
    /// leaves the previous snapshot in place.
    pub async fn analyze_project(
        &self,
        name: &str,
        files: &[String],
        provider: Arc<dyn FileProvider>,
        cancel: &CancellationFlag,
    ) -> AnalysisResult<Arc<AnalysisSnapshot>> {
        let analyzer = self.analyzer();
        let snapshot = analyzer.analyze_project(name, files, provider, cancel).await?;
        Ok(self.publish(snapshot))
    }

    /// Re-analyse a published project, reusing unchanged files, and publish
    /// the result along with what changed.
    pub async fn reanalyze_project(
        &self,
        project_id: &str,
        files: &[String],
        provider: Arc<dyn FileProvider>,
        cancel: &CancellationFlag,
    ) -> AnalysisResult<(Arc<AnalysisSnapshot>, SnapshotDiff)> {
        let previous = self.get_snapshot(project_id)?;
        let analyzer = self.analyzer();
        let snapshot = analyzer.reanalyze(&previous, files, provider, cancel).await?;
        let diff = SnapshotDiff::between(&previous, &snapshot);
        debug!(
            project = project_id,
            files_changed = diff.files_changed.len(),
            edges_added = diff.edges_added.len(),
            edges_removed = diff.edges_removed.len(),
            "snapshot diff"
        );
        Ok((self.publish(snapshot), diff))
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    pub fn get_snapshot(&self, project_id: &str) -> AnalysisResult<Arc<AnalysisSnapshot>> {
        self.snapshots
            .get(project_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| AnalysisError::UnknownProject(project_id.to_string()))
    }

    pub fn remove_project(&self, project_id: &str) -> bool {
        self.snapshots.remove(project_id).is_some()
    }

    /// Published project ids, sorted.
    pub fn projects(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.snapshots.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Snapshots in project id order.
    fn snapshots_sorted(&self) -> Vec<Arc<AnalysisSnapshot>> {
        let mut all: Vec<Arc<AnalysisSnapshot>> =
            self.snapshots.iter().map(|e| Arc::clone(e.value())).collect();
        all.sort_by(|a, b| a.project_id().cmp(b.project_id()));
        all
    }

    /// First snapshot, by project id, whose graph holds `id`.
    fn snapshot_holding(&self, id: &SymbolId) -> AnalysisResult<Arc<AnalysisSnapshot>> {
        self.snapshots_sorted()
            .into_iter()
            .find(|s| s.graph.contains(id))
            .ok_or_else(|| AnalysisError::UnknownSymbol(id.to_string()))
    }

    pub fn stats(&self) -> EngineStats {
        let snapshots = self.snapshots_sorted();
        EngineStats {
            project_count: snapshots.len(),
            file_count: snapshots.iter().map(|s| s.graph.file_count()).sum(),
            symbol_count: snapshots.iter().map(|s| s.graph.symbol_count()).sum(),
            relationship_count: snapshots.iter().map(|s| s.graph.relationship_count()).sum(),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Call graph rooted at a symbol of any published project.
    pub fn get_call_graph(&self, symbol_id: &SymbolId, depth: Option<usize>) -> AnalysisResult<GraphView> {
        let snapshot = self.snapshot_holding(symbol_id)?;
        query::call_graph(&snapshot.graph, symbol_id, depth)
    }

    pub fn get_dependency_graph(&self, project_id: &str) -> AnalysisResult<GraphView> {
        let snapshot = self.get_snapshot(project_id)?;
        Ok(match &snapshot.project.dependency_graph {
            Some(view) => view.clone(),
            None => query::dependency_graph(&snapshot.graph),
        })
    }

    pub fn find_circular_dependencies(
        &self,
        project_id: &str,
        edge_type: Option<RelationType>,
    ) -> AnalysisResult<Vec<Cycle>> {
        let snapshot = self.get_snapshot(project_id)?;
        Ok(query::find_cycles(&snapshot.graph, edge_type))
    }

    pub fn search_symbols(&self, project_id: &str, query: &SearchQuery) -> AnalysisResult<Vec<SearchHit>> {
        let snapshot = self.get_snapshot(project_id)?;
        search::search(&snapshot.graph, query)
    }

    pub fn related(&self, symbol_id: &SymbolId, limit: usize) -> AnalysisResult<Vec<RelatedSymbol>> {
        let snapshot = self.snapshot_holding(symbol_id)?;
        query::related(&snapshot.graph, symbol_id, limit)
    }

    pub fn impact(&self, symbol_id: &SymbolId, max_depth: Option<usize>) -> AnalysisResult<ImpactReport> {
        let snapshot = self.snapshot_holding(symbol_id)?;
        query::impact(&snapshot.graph, symbol_id, max_depth)
    }

    /// Stats of the run that produced a project's snapshot.
    pub fn last_run(&self, project_id: &str) -> AnalysisResult<RunStats> {
        Ok(self.get_snapshot(project_id)?.stats)
    }
}

/// Totals across all published snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub project_count: usize,
    pub file_count: usize,
    pub symbol_count: usize,
    pub relationship_count: usize,
}

/// Thread-safe shared state handle.
pub type SharedState = Arc<EngineState>;

/// Create a new shared state with default options.
pub fn create_state() -> AnalysisResult<SharedState> {
    Ok(Arc::new(EngineState::with_options(AnalysisOptions::default())?))
}
