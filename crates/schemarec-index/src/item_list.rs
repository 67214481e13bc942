//! Resolved recommendation input.

use roaring::RoaringBitmap;

use crate::registry::ItemRegistry;
use crate::{type_label, ItemId};

/// The items of one recommendation query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemList(Vec<ItemId>);

impl ItemList {
    pub fn new(items: Vec<ItemId>) -> Self {
        Self(items)
    }

    /// Resolve raw property and type labels, dropping any the registry has
    /// never seen. Types are looked up under [`crate::TYPE_PREFIX`].
    pub fn resolve<P, T>(registry: &ItemRegistry, properties: P, types: T) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        let mut items: Vec<ItemId> = properties
            .into_iter()
            .filter_map(|p| registry.resolve(p.as_ref()).map(|item| item.id()))
            .collect();
        items.extend(
            types
                .into_iter()
                .filter_map(|t| registry.resolve(&type_label(t.as_ref())).map(|item| item.id())),
        );
        Self(items)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[ItemId] {
        &self.0
    }

    pub fn push(&mut self, item: ItemId) {
        self.0.push(item);
    }

    /// Sort descending by global count (ties by rank, the same order tree paths
    /// use) and drop repeated items. The last element is the rarest item.
    pub fn sort_by_support(&mut self, registry: &ItemRegistry) {
        self.0.sort_by_key(|&id| registry.rank_of(id));
        self.0.dedup();
    }

    /// The rarest item, valid after [`ItemList::sort_by_support`].
    pub fn rarest(&self) -> Option<ItemId> {
        self.0.last().copied()
    }

    /// Membership set for O(1) containment tests.
    pub fn to_set(&self) -> RoaringBitmap {
        self.0.iter().map(|id| id.raw()).collect()
    }
}

impl From<Vec<ItemId>> for ItemList {
    fn from(items: Vec<ItemId>) -> Self {
        Self(items)
    }
}

impl FromIterator<ItemId> for ItemList {
    fn from_iter<I: IntoIterator<Item = ItemId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
