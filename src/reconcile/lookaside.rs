use std::collections::HashMap;

use crate::models::Keyed;

/// Two-tier entity map used during one reconciliation pass.
///
/// The snapshot holds rows preloaded from storage; the overlay holds entities
/// created during the pass, in creation order. Lookups check the overlay
/// first, then the snapshot.
#[derive(Debug)]
pub struct LookAside<T> {
    snapshot: HashMap<String, T>,
    overlay: Vec<T>,
    overlay_index: HashMap<String, usize>,
}

impl<T: Keyed> LookAside<T> {
    pub fn preload(rows: impl IntoIterator<Item = T>) -> Self {
        let snapshot = rows
            .into_iter()
            .map(|row| (row.key().to_owned(), row))
            .collect();

        Self {
            snapshot,
            overlay: Vec::new(),
            overlay_index: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&T> {
        match self.overlay_index.get(key) {
            Some(&idx) => Some(&self.overlay[idx]),
            None => self.snapshot.get(key),
        }
    }

    /// Return the entity stored under `key`, calling `create` only when neither
    /// tier has it. The flag is `true` when a new entity was registered.
    pub fn get_or_create<F>(&mut self, key: &str, create: F) -> (&T, bool)
    where
        F: FnOnce() -> T,
    {
        if let Some(&idx) = self.overlay_index.get(key) {
            return (&self.overlay[idx], false);
        }
        if self.snapshot.contains_key(key) {
            return (&self.snapshot[key], false);
        }

        let entity = create();
        debug_assert_eq!(entity.key(), key);

        let idx = self.overlay.len();
        self.overlay_index.insert(key.to_owned(), idx);
        self.overlay.push(entity);
        (&self.overlay[idx], true)
    }

    #[cfg(test)]
    pub fn created(&self) -> &[T] {
        &self.overlay
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.snapshot.len() + self.overlay.len()
    }

    /// Every entity in the map: preloaded rows ordered by key, then created ones
    /// in creation order.
    pub fn into_entities(self) -> Vec<T> {
        let mut preloaded: Vec<T> = self.snapshot.into_values().collect();
        preloaded.sort_by(|a, b| a.key().cmp(b.key()));
        preloaded.extend(self.overlay);
        preloaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: String,
        value: u32,
    }

    impl Keyed for Row {
        fn key(&self) -> &str {
            &self.id
        }
    }

    fn row(id: &str, value: u32) -> Row {
        Row {
            id: id.to_string(),
            value,
        }
    }

    #[test]
    fn preloaded_rows_are_never_replaced() {
        let mut map = LookAside::preload(vec![row("a", 1)]);

        let (found, created) = map.get_or_create("a", || row("a", 99));
        assert!(!created);
        assert_eq!(found.value, 1);
        assert!(map.created().is_empty());
    }

    #[test]
    fn created_rows_are_visible_to_later_lookups() {
        let mut map: LookAside<Row> = LookAside::preload(Vec::new());

        let (_, created) = map.get_or_create("b", || row("b", 1));
        assert!(created);

        let (found, created) = map.get_or_create("b", || panic!("must not be called"));
        assert!(!created);
        assert_eq!(found.value, 1);
        assert_eq!(map.get("b"), Some(&row("b", 1)));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn entities_come_out_preloaded_first_then_in_creation_order() {
        let mut map = LookAside::preload(vec![row("z", 0), row("m", 0)]);
        map.get_or_create("c", || row("c", 1));
        map.get_or_create("a", || row("a", 2));

        let keys: Vec<String> = map.into_entities().into_iter().map(|r| r.id).collect();
        assert_eq!(keys, vec!["m", "z", "c", "a"]);
    }
}
