//! Service configuration.

use std::convert::Infallible;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Hierarchy candidate cap used when none is configured.
pub const DEFAULT_HIERARCHY_LIMIT: usize = 15;

/// Which recommender answers a request.
///
/// Parsing is lenient: `"hierarchy"` and `"hybrid"` select those modes and
/// anything else selects the schema tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecoMode {
    /// Hierarchy only; the tree answers only when no hierarchy is loaded.
    Hierarchy,
    /// Hierarchy and tree candidates merged by label.
    Hybrid,
    /// Schema tree only.
    #[default]
    Tree,
}

impl RecoMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RecoMode::Hierarchy => "hierarchy",
            RecoMode::Hybrid => "hybrid",
            RecoMode::Tree => "tree",
        }
    }
}

impl From<&str> for RecoMode {
    fn from(value: &str) -> Self {
        match value.trim() {
            "hierarchy" => RecoMode::Hierarchy,
            "hybrid" => RecoMode::Hybrid,
            _ => RecoMode::Tree,
        }
    }
}

impl From<String> for RecoMode {
    fn from(value: String) -> Self {
        RecoMode::from(value.as_str())
    }
}

impl From<RecoMode> for String {
    fn from(mode: RecoMode) -> Self {
        mode.as_str().to_string()
    }
}

impl FromStr for RecoMode {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(RecoMode::from(s))
    }
}

impl fmt::Display for RecoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the recommender service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Training transactions (TSV, one transaction per line)
    pub transactions_path: PathBuf,
    /// Optional tag hierarchy (JSON forest)
    pub hierarchy_path: Option<PathBuf>,
    pub mode: RecoMode,
    /// Also recommend types in tree mode
    pub include_types: bool,
    /// Maximum number of hierarchy candidates
    pub hierarchy_limit: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            transactions_path: PathBuf::from("./tags.tsv"),
            hierarchy_path: None,
            mode: RecoMode::default(),
            include_types: false,
            hierarchy_limit: DEFAULT_HIERARCHY_LIMIT,
        }
    }
}

impl ServiceConfig {
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))
    }
}
