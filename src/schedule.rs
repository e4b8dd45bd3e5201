use std::collections::BTreeMap;

use indexmap::IndexSet;

use crate::types::FileContractId;

/// Requests to re-check an obligation once the chain reaches a given height.
///
/// An obligation is queued at most once per height; items sharing a height
/// come back in the order they were added.
#[derive(Debug, Clone, Default)]
pub struct ActionItems {
    items: BTreeMap<u64, IndexSet<FileContractId>>,
}

impl ActionItems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, height: u64, id: FileContractId) {
        self.items.entry(height).or_default().insert(id);
    }

    /// Removes and returns every item due at or below `height`.
    pub fn take_due(&mut self, height: u64) -> Vec<(u64, FileContractId)> {
        let later = match height.checked_add(1) {
            Some(next) => self.items.split_off(&next),
            None => BTreeMap::new(),
        };
        let due = std::mem::replace(&mut self.items, later);
        due.into_iter()
            .flat_map(|(height, ids)| ids.into_iter().map(move |id| (height, id)))
            .collect()
    }

    /// Drops every pending item for `id`.
    pub fn remove(&mut self, id: &FileContractId) {
        self.items.retain(|_, ids| {
            ids.shift_remove(id);
            !ids.is_empty()
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &FileContractId)> {
        self.items
            .iter()
            .flat_map(|(height, ids)| ids.iter().map(move |id| (*height, id)))
    }

    pub fn len(&self) -> usize {
        self.items.values().map(IndexSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<(u64, FileContractId)> for ActionItems {
    fn from_iter<I: IntoIterator<Item = (u64, FileContractId)>>(iter: I) -> Self {
        let mut items = Self::new();
        for (height, id) in iter {
            items.add(height, id);
        }
        items
    }
}
