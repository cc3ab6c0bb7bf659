use ahash::AHashMap;
use linkx_core::FieldValue;

/// A registered comparator. May return NaN when the values are incomparable.
pub type CustomComparator = fn(&FieldValue, &FieldValue) -> f64;

/// Named custom comparators.
///
/// Schemas refer to custom comparators by name only, so a schema loaded
/// from disk is resolved against whatever registry the caller passes in.
#[derive(Clone, Default)]
pub struct ComparatorRegistry {
    comparators: AHashMap<String, CustomComparator>,
}

impl ComparatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a comparator
    pub fn register<S: Into<String>>(&mut self, name: S, comparator: CustomComparator) -> &mut Self {
        let name = name.into();
        if self.comparators.insert(name.clone(), comparator).is_some() {
            tracing::debug!(name = %name, "replaced custom comparator");
        }
        self
    }

    pub fn with<S: Into<String>>(mut self, name: S, comparator: CustomComparator) -> Self {
        self.register(name, comparator);
        self
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<CustomComparator> {
        self.comparators.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.comparators.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.comparators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ComparatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComparatorRegistry")
            .field("names", &self.names())
            .finish()
    }
}
