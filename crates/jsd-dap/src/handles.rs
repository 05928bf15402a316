use rustc_hash::FxHashMap;

/// Maps client-visible integer handles onto adapter-side payloads.
///
/// Ids start at 1 (0 means "no handle" on the wire), increase monotonically and are
/// never reused, even after the entry they named is cleared.
#[derive(Debug)]
pub struct HandleRegistry<T> {
    next_id: i64,
    entries: FxHashMap<i64, T>,
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            entries: FxHashMap::default(),
        }
    }
}

impl<T> HandleRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, payload: T) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, payload);
        id
    }

    pub fn resolve(&self, id: i64) -> Option<&T> {
        self.entries.get(&id)
    }

    /// Drops every entry matching `predicate`, returning the removed entries in id order.
    pub fn clear<F>(&mut self, predicate: F) -> Vec<(i64, T)>
    where
        F: Fn(&T) -> bool,
    {
        let mut ids = self
            .entries
            .iter()
            .filter(|(_, payload)| predicate(payload))
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        ids.sort_unstable();

        ids.into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|payload| (id, payload)))
            .collect()
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    /// Live entries in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, &T)> {
        let mut entries = self.entries.iter().map(|(id, payload)| (*id, payload)).collect::<Vec<_>>();
        entries.sort_unstable_by_key(|(id, _)| *id);
        entries.into_iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (i64, &mut T)> {
        self.entries.iter_mut().map(|(id, payload)| (*id, payload))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_resolve() {
        let mut registry = HandleRegistry::new();
        let a = registry.allocate("a");
        let b = registry.allocate("b");

        assert_eq!((a, b), (1, 2));
        assert_eq!(registry.resolve(a), Some(&"a"));
        assert_eq!(registry.resolve(b), Some(&"b"));
        assert_eq!(registry.resolve(3), None);
        assert_eq!(registry.resolve(0), None);
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut registry = HandleRegistry::new();
        registry.allocate(1);
        registry.allocate(2);
        registry.clear_all();

        assert!(registry.is_empty());
        assert_eq!(registry.resolve(1), None);
        assert_eq!(registry.allocate(3), 3);
    }

    #[test]
    fn test_clear_with_predicate() {
        let mut registry = HandleRegistry::new();
        for n in 1..=5 {
            registry.allocate(n);
        }

        let removed = registry.clear(|n| n % 2 == 0);

        assert_eq!(removed, vec![(2, 2), (4, 4)]);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.iter().map(|(id, _)| id).collect::<Vec<_>>(), vec![1, 3, 5]);
    }
}
