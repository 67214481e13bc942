//! Schema tree: a prefix-tree index over observed property/type combinations.
//!
//! Every training transaction (the set of properties and types one entity
//! description carried) is inserted as a root-to-node path, with items ordered
//! by their global frequency. Each node counts how many transactions passed
//! through it, so any path encodes "how often was exactly this prefix seen".
//!
//! Key pieces:
//! 1. **Item interning**: labels are interned once into compact [`ItemId`]s.
//!    Interning happens in a [`RegistryBuilder`]; serving only ever sees the
//!    sealed, immutable [`ItemRegistry`].
//! 2. **Node arena**: nodes live in one `Vec`, addressed by [`NodeId`]. Parent
//!    links and child lists are plain indices.
//! 3. **Occurrence chains**: for each item, the ids of every node carrying it,
//!    stored contiguously. The recommender walks the chain of the rarest input
//!    item, so the cost is bounded by that item's occurrence count.
//!
//! ## Module Organization
//!
//! - `registry`: item interning, global counts and dense ranks
//! - `tree`: the node arena, builder and occurrence index
//! - `item_list`: resolved query input
//! - `recommend`: candidate generation and ranking
//! - `output`: ranked recommendation lists and their rendering
//! - `transactions`: loading training transactions from TSV

pub mod item_list;
pub mod output;
pub mod recommend;
pub mod registry;
pub mod transactions;
pub mod tree;

use serde::{Deserialize, Serialize};

pub use item_list::ItemList;
pub use output::{Recommendation, Recommendations};
pub use recommend::CandidateKinds;
pub use registry::{Item, ItemRegistry, RegistryBuilder};
pub use tree::{SchemaNode, SchemaTree, SchemaTreeBuilder};

/// Prefix distinguishing type labels from property labels.
pub const TYPE_PREFIX: &str = "t#";

/// Interned item ID (4 bytes instead of a label string).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ItemId(u32);

impl ItemId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a node in the schema tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// The root node (the empty set) is always the first node in the arena.
    pub const ROOT: NodeId = NodeId(0);

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Label under which a type is registered.
pub fn type_label(type_name: &str) -> String {
    format!("{TYPE_PREFIX}{type_name}")
}

/// Whether a label denotes a type rather than a property.
pub fn is_type_label(label: &str) -> bool {
    label.starts_with(TYPE_PREFIX)
}
