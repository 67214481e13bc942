//! Recommender service: owns the shared indexes and answers requests.
//!
//! ```text
//!   properties, types ──► RecommenderService ──► mode?
//!                                  │              ├─ hierarchy ──► Hierarchy (sibling/cousin counts)
//!                                  │              ├─ hybrid ─────► both, merged by label
//!                                  │              └─ tree ───────► ItemRegistry ──► SchemaTree
//!                                  ▼
//!                           Recommendations
//! ```
//!
//! The schema tree is immutable once built and shared behind an `Arc`. The
//! hierarchy can be swapped at runtime: a reload installs a fully indexed
//! hierarchy or leaves the previous one untouched.

pub mod config;
pub mod dispatch;
pub mod eval;

#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use parking_lot::RwLock;
use schemarec_hierarchy::{Hierarchy, HierarchyError};
use schemarec_index::{transactions, CandidateKinds, Recommendations, SchemaTree};
use tracing::{debug, warn};

pub use config::{RecoMode, ServiceConfig, DEFAULT_HIERARCHY_LIMIT};
pub use dispatch::DispatchOptions;

/// The main recommender
pub struct RecommenderService {
    config: ServiceConfig,
    tree: Arc<SchemaTree>,
    hierarchy: Arc<RwLock<Option<Arc<Hierarchy>>>>,
}

impl RecommenderService {
    /// Wrap an already built tree; no hierarchy is loaded.
    pub fn new(config: ServiceConfig, tree: SchemaTree) -> Self {
        Self {
            config,
            tree: Arc::new(tree),
            hierarchy: Arc::new(RwLock::new(None)),
        }
    }

    /// Build the tree from `config.transactions_path` and load the hierarchy
    /// if one is configured.
    ///
    /// A hierarchy that fails to load is logged and left absent; requests
    /// then fall back to the tree.
    pub fn open(config: ServiceConfig) -> anyhow::Result<Self> {
        let tree = transactions::load_tsv(&config.transactions_path).with_context(|| {
            format!(
                "building schema tree from {}",
                config.transactions_path.display()
            )
        })?;

        let hierarchy_path = config.hierarchy_path.clone();
        let service = Self::new(config, tree);
        if let Some(path) = hierarchy_path {
            if let Err(err) = service.reload_hierarchy(&path) {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "hierarchy unavailable, serving from schema tree"
                );
            }
        }
        Ok(service)
    }

    pub fn with_hierarchy(self, hierarchy: Hierarchy) -> Self {
        *self.hierarchy.write() = Some(Arc::new(hierarchy));
        self
    }

    /// Load a hierarchy and install it. On error the current one stays.
    pub fn reload_hierarchy(&self, path: &Path) -> Result<(), HierarchyError> {
        let hierarchy = Hierarchy::load(path)?;
        debug!(path = %path.display(), "installed hierarchy");
        *self.hierarchy.write() = Some(Arc::new(hierarchy));
        Ok(())
    }

    pub fn clear_hierarchy(&self) {
        *self.hierarchy.write() = None;
    }

    pub fn hierarchy(&self) -> Option<Arc<Hierarchy>> {
        self.hierarchy.read().clone()
    }

    pub fn tree(&self) -> &Arc<SchemaTree> {
        &self.tree
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn options(&self) -> DispatchOptions {
        DispatchOptions {
            kinds: CandidateKinds::from_include_types(self.config.include_types),
            hierarchy_limit: self.config.hierarchy_limit,
        }
    }

    /// Recommend using the configured mode.
    pub fn recommend<P, T>(&self, properties: &[P], types: &[T]) -> Recommendations
    where
        P: AsRef<str>,
        T: AsRef<str>,
    {
        self.recommend_with_mode(properties, types, self.config.mode)
    }

    pub fn recommend_with_mode<P, T>(
        &self,
        properties: &[P],
        types: &[T],
        mode: RecoMode,
    ) -> Recommendations
    where
        P: AsRef<str>,
        T: AsRef<str>,
    {
        // The read lock is released before ranking.
        let hierarchy = self.hierarchy();
        dispatch::recommend(
            &self.tree,
            hierarchy.as_deref(),
            properties,
            types,
            mode,
            self.options(),
        )
    }
}
