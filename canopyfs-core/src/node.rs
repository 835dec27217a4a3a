//! Common node identity and the name-keyed child map.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::paths;

/// Case handling for child-name lookups, fixed per tree at construction and
/// propagated through every directory factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseMode {
    /// Names compare byte-for-byte.
    #[default]
    Sensitive,
    /// Names compare after Unicode lowercasing; the original spelling is
    /// preserved for display and full paths.
    Insensitive,
}

impl CaseMode {
    /// Folds a name into its lookup key.
    pub fn fold(self, name: &str) -> String {
        match self {
            CaseMode::Sensitive => name.to_string(),
            CaseMode::Insensitive => name.to_lowercase(),
        }
    }
}

/// Immutable identity shared by every tree element.
///
/// `full_path` is the parent's full path joined with `name`; the empty
/// name/path pair is reserved for tree roots. Both are fixed at
/// construction. A node mounted under an alias keeps the full path of its
/// source — the lookup path and the recorded path disagreeing is expected,
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMeta {
    name: String,
    full_path: String,
}

impl NodeMeta {
    /// Creates node identity from a full path; the name is the last segment.
    pub fn new(full_path: impl Into<String>) -> Self {
        let full_path = full_path.into();
        let name = paths::file_name(&full_path).to_string();
        Self { name, full_path }
    }

    /// The bare name (empty only for roots).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The full path recorded at construction.
    pub fn full_path(&self) -> &str {
        &self.full_path
    }
}

/// Ordered name-keyed map with configurable case folding.
///
/// Keys are folded per [`CaseMode`]; the original spelling of each name is
/// kept alongside the value. Entries are ordered by folded key, which gives
/// the restartable `next_after` cursor used by the enumeration types.
#[derive(Debug, Clone)]
pub struct NameMap<T> {
    case: CaseMode,
    map: BTreeMap<String, (String, T)>,
}

impl<T: Clone> NameMap<T> {
    pub fn new(case: CaseMode) -> Self {
        Self { case, map: BTreeMap::new() }
    }

    pub fn case(&self) -> CaseMode {
        self.case
    }

    pub fn get(&self, name: &str) -> Option<T> {
        self.map.get(&self.case.fold(name)).map(|(_, v)| v.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(&self.case.fold(name))
    }

    /// Inserts under `name`, returning the displaced value if any.
    pub fn insert(&mut self, name: &str, value: T) -> Option<T> {
        self.map
            .insert(self.case.fold(name), (name.to_string(), value))
            .map(|(_, old)| old)
    }

    pub fn remove(&mut self, name: &str) -> Option<T> {
        self.map.remove(&self.case.fold(name)).map(|(_, old)| old)
    }

    /// The first entry strictly after `prev` in folded-key order, or the
    /// first entry overall when `prev` is `None`. Yields the original name.
    pub fn next_after(&self, prev: Option<&str>) -> Option<(String, T)> {
        let folded;
        let lower = match prev {
            Some(p) => {
                folded = self.case.fold(p);
                Bound::Excluded(&folded)
            }
            None => Bound::Unbounded,
        };
        self.map
            .range::<String, _>((lower, Bound::<&String>::Unbounded))
            .next()
            .map(|(_, (name, value))| (name.clone(), value.clone()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.map.values().map(|(name, value)| (name.as_str(), value))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.map.values().map(|(_, value)| value)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &T) -> bool) {
        self.map.retain(|_, (name, value)| keep(name, value));
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}
