//! Tag hierarchy for sibling/cousin recommendations.
//!
//! The hierarchy is a forest of named groups, each optionally tagging a set
//! of leaf labels:
//!
//! ```json
//! [
//!   { "name": "depth0_C1", "tags": ["building=yes"],
//!     "children": [ { "name": "L1", "tags": ["roof:shape=flat"] } ] }
//! ]
//! ```
//!
//! Loading flattens the forest into an arena of groups and indexes every tag
//! to its *enclosing group* (the group whose `tags` list it). After loading
//! the hierarchy is immutable and can be shared freely between threads.

pub mod cooccurrence;
mod recommend;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

/// One group as it appears in the hierarchy file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyGroup {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<HierarchyGroup>,
}

#[derive(Debug, thiserror::Error)]
pub enum HierarchyError {
    #[error("failed to read hierarchy {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A reader failed before a path was known.
    #[error("failed to read hierarchy: {0}")]
    Read(#[source] std::io::Error),
    #[error("malformed hierarchy: {0}")]
    Format(#[source] serde_json::Error),
}

/// Index of a group in the hierarchy arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(u32);

impl GroupId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A group after flattening: children are arena indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    name: String,
    tags: Vec<String>,
    children: Vec<GroupId>,
}

impl Group {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn children(&self) -> &[GroupId] {
        &self.children
    }
}

/// The loaded, indexed forest.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    groups: Vec<Group>,
    roots: Vec<GroupId>,
    tag_to_group: HashMap<String, GroupId>,
}

impl Hierarchy {
    /// Load and index a hierarchy file.
    pub fn load(path: &Path) -> Result<Self, HierarchyError> {
        let file = File::open(path).map_err(|source| HierarchyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let hierarchy = Self::from_reader(BufReader::new(file)).map_err(|err| match err {
            HierarchyError::Read(source) => HierarchyError::Io {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        info!(
            path = %path.display(),
            groups = hierarchy.group_count(),
            tags = hierarchy.tag_count(),
            "loaded tag hierarchy"
        );
        Ok(hierarchy)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, HierarchyError> {
        let roots: Vec<HierarchyGroup> = serde_json::from_reader(reader).map_err(|err| {
            if err.is_io() {
                HierarchyError::Read(err.into())
            } else {
                HierarchyError::Format(err)
            }
        })?;
        Ok(Self::from_groups(roots))
    }

    pub fn from_json_str(json: &str) -> Result<Self, HierarchyError> {
        let roots: Vec<HierarchyGroup> =
            serde_json::from_str(json).map_err(HierarchyError::Format)?;
        Ok(Self::from_groups(roots))
    }

    /// Flatten a forest and build the tag index.
    ///
    /// A tag listed by several groups resolves to the last one in pre-order.
    pub fn from_groups(roots: Vec<HierarchyGroup>) -> Self {
        let mut hierarchy = Hierarchy::default();
        for root in roots {
            let id = hierarchy.insert(root);
            hierarchy.roots.push(id);
        }
        hierarchy
    }

    fn insert(&mut self, group: HierarchyGroup) -> GroupId {
        let id = GroupId(self.groups.len() as u32);
        for tag in &group.tags {
            self.tag_to_group.insert(tag.clone(), id);
        }
        self.groups.push(Group {
            name: group.name,
            tags: group.tags,
            children: Vec::new(),
        });

        let children: Vec<GroupId> = group
            .children
            .into_iter()
            .map(|child| self.insert(child))
            .collect();
        self.groups[id.index()].children = children;
        id
    }

    pub fn group(&self, id: GroupId) -> &Group {
        &self.groups[id.index()]
    }

    pub fn roots(&self) -> &[GroupId] {
        &self.roots
    }

    /// The group that lists `tag` directly.
    pub fn enclosing_group(&self, tag: &str) -> Option<&Group> {
        self.tag_to_group.get(tag).map(|&id| self.group(id))
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of distinct indexed tags.
    pub fn tag_count(&self) -> usize {
        self.tag_to_group.len()
    }

    /// Whether no tag is indexed; recommendations are then always empty.
    pub fn is_empty(&self) -> bool {
        self.tag_to_group.is_empty()
    }
}
