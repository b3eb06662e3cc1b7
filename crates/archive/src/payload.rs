//! Payload catalog: logical items indexed by name and wildcard name.

use std::collections::{BTreeMap, BTreeSet};

use items::ItemDefinition;

use crate::names::wildcard_name;

/// Payload items of one archive, looked up by exact or wildcarded name.
///
/// A name may map to several items (hard links, repeated entries) and an
/// item may appear under several names when the archive stores the same
/// content twice.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PayloadCatalog {
    by_name: BTreeMap<String, BTreeSet<ItemDefinition>>,
    by_wildcard: BTreeMap<String, BTreeSet<ItemDefinition>>,
}

impl PayloadCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `item` under `name`.
    pub fn add(&mut self, name: &str, item: ItemDefinition) {
        let item = item.with_name(name);
        self.by_wildcard
            .entry(wildcard_name(name))
            .or_default()
            .insert(item.clone());
        self.by_name.entry(name.to_string()).or_default().insert(item);
    }

    /// Returns `true` when no payload has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Number of distinct payload names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns `true` when `name` is a recorded payload name.
    #[must_use]
    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Items recorded under exactly `name`.
    pub fn with_name(&self, name: &str) -> impl Iterator<Item = &ItemDefinition> {
        self.by_name.get(name).into_iter().flatten()
    }

    /// Items whose wildcarded name equals the wildcarded form of `name`.
    pub fn matching_wildcard(&self, name: &str) -> impl Iterator<Item = &ItemDefinition> {
        self.by_wildcard.get(&wildcard_name(name)).into_iter().flatten()
    }

    /// `(name, item)` pairs in name order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ItemDefinition)> {
        self.by_name
            .iter()
            .flat_map(|(name, items)| items.iter().map(move |item| (name.as_str(), item)))
    }

    /// Every distinct payload identity, each carrying all of its payload names.
    #[must_use]
    pub fn items(&self) -> Vec<ItemDefinition> {
        let mut merged: BTreeMap<ItemDefinition, ItemDefinition> = BTreeMap::new();
        for (name, item) in self.entries() {
            merged
                .entry(item.without_names())
                .and_modify(|existing| *existing = existing.clone().with_name(name))
                .or_insert_with(|| item.without_names().with_name(name));
        }
        merged.into_values().collect()
    }

    /// Returns `true` when some payload has the identity of `item`.
    #[must_use]
    pub fn contains_item(&self, item: &ItemDefinition) -> bool {
        self.by_name.values().any(|items| items.contains(item))
    }

    /// Payload names under which `item` was recorded.
    #[must_use]
    pub fn names_of(&self, item: &ItemDefinition) -> Vec<&str> {
        self.by_name
            .iter()
            .filter(|(_, items)| items.contains(item))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Adds every entry of `other`.
    pub fn merge(&mut self, other: &Self) {
        for (name, item) in other.entries() {
            self.add(name, item.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(data: &[u8]) -> ItemDefinition {
        ItemDefinition::from_bytes(data)
    }

    #[test]
    fn exact_and_wildcard_lookups() {
        let mut catalog = PayloadCatalog::new();
        catalog.add("lib/libfoo.so.1.2", item(b"v1"));
        catalog.add("etc/config", item(b"cfg"));

        assert_eq!(catalog.with_name("etc/config").count(), 1);
        assert_eq!(catalog.with_name("missing").count(), 0);
        let found: Vec<_> = catalog.matching_wildcard("lib/libfoo.so.1.10").collect();
        assert_eq!(found, vec![&item(b"v1")]);
    }

    #[test]
    fn items_merge_names_of_duplicate_content() {
        let mut catalog = PayloadCatalog::new();
        catalog.add("a", item(b"same"));
        catalog.add("b", item(b"same"));
        catalog.add("c", item(b"other"));

        let items = catalog.items();
        assert_eq!(items.len(), 2);
        let same = items.iter().find(|i| **i == item(b"same")).expect("merged item");
        assert_eq!(same.names(), ["a".to_string(), "b".to_string()]);
        assert_eq!(catalog.names_of(&item(b"same")), vec!["a", "b"]);
    }
}
