//! Source units and their registry.

use indexmap::IndexMap;
use loam_core::{NodeId, SourceId};

/// One compiled text file: its content, the top-level nodes it introduced,
/// its import group and the reference stubs its subtree owns.
#[derive(Debug, Clone)]
pub struct Source {
    pub id: SourceId,
    pub content: String,
    /// Top-level nodes in declaration order (import group included).
    pub nodes: Vec<NodeId>,
    pub import_group: Option<NodeId>,
    /// Every import stub in the owned subtree; the compiler scans these to
    /// find dependents of invalidated nodes.
    pub stubs: Vec<NodeId>,
    pub compiled: bool,
}

impl Source {
    pub fn new(id: SourceId, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            nodes: Vec::new(),
            import_group: None,
            stubs: Vec::new(),
            compiled: false,
        }
    }
}

/// Ordered registry of source units, keyed by path.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: IndexMap<SourceId, Source>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: Source) {
        self.sources.insert(source.id.clone(), source);
    }

    pub fn remove(&mut self, id: &SourceId) -> Option<Source> {
        self.sources.shift_remove(id)
    }

    pub fn get(&self, id: &SourceId) -> Option<&Source> {
        self.sources.get(id)
    }

    pub fn get_mut(&mut self, id: &SourceId) -> Option<&mut Source> {
        self.sources.get_mut(id)
    }

    pub fn contains(&self, id: &SourceId) -> bool {
        self.sources.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.values()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn clear(&mut self) {
        self.sources.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== TEST: registry_round_trip ==========
    #[test]
    fn test_registry_round_trip() {
        let mut registry = SourceRegistry::new();
        let id = SourceId::new("/a.loam");
        registry.insert(Source::new(id.clone(), "Class a::A {}"));

        assert!(registry.contains(&id));
        assert_eq!(registry.get(&id).unwrap().content, "Class a::A {}");
        assert_eq!(registry.len(), 1);

        let removed = registry.remove(&id).unwrap();
        assert_eq!(removed.id, id);
        assert!(registry.is_empty());
    }
}
