//! Attribute bags attached to reflected items
//!
//! Attributes are free-form metadata (`key -> value`) that tools and binding
//! layers read; the runtime itself never interprets them. Well-known keys
//! are provided as constants.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

/// Item is only meaningful at runtime (hidden from tools)
pub const RUNTIME_ONLY: &str = "RuntimeOnly";
/// [`ExcludeFrom`] flags
pub const EXCLUDE_FROM: &str = "ExcludeFrom";
/// Category path for tool listings
pub const CATEGORY: &str = "Category";
/// Short description
pub const TOOLTIP: &str = "ToolTip";
/// Deprecation note
pub const DEPRECATED: &str = "Deprecated";

bitflags::bitflags! {
    /// Surfaces an item is hidden from
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExcludeFrom: u32 {
        /// Node / function listings
        const LIST = 1 << 0;
        /// Generated documentation
        const DOCUMENTATION = 1 << 1;
        /// Preview builds
        const PREVIEW = 1 << 2;
    }
}

/// Key -> value metadata map
#[derive(Clone, Default)]
pub struct Attributes {
    entries: FxHashMap<String, Rc<dyn Any>>,
}

impl Attributes {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an attribute
    pub fn insert<T: Any>(&mut self, key: impl Into<String>, value: T) {
        self.entries.insert(key.into(), Rc::new(value));
    }

    /// Typed lookup
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.entries.get(key)?.downcast_ref::<T>()
    }

    /// Check if a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove an attribute
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Keys in sorted order
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check the [`RUNTIME_ONLY`] flag
    pub fn is_runtime_only(&self) -> bool {
        self.get::<bool>(RUNTIME_ONLY).copied().unwrap_or(false)
    }

    /// Check if excluded from `surface`
    pub fn is_excluded_from(&self, surface: ExcludeFrom) -> bool {
        self.get::<ExcludeFrom>(EXCLUDE_FROM)
            .is_some_and(|flags| flags.intersects(surface))
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_lookup() {
        let mut attrs = Attributes::new();
        attrs.insert(CATEGORY, "Math/Vector");
        attrs.insert(RUNTIME_ONLY, true);

        assert_eq!(attrs.get::<&str>(CATEGORY), Some(&"Math/Vector"));
        assert_eq!(attrs.get::<String>(CATEGORY), None);
        assert!(attrs.is_runtime_only());
        assert_eq!(attrs.keys(), vec![CATEGORY, RUNTIME_ONLY]);
    }

    #[test]
    fn test_exclude_from() {
        let mut attrs = Attributes::new();
        assert!(!attrs.is_excluded_from(ExcludeFrom::LIST));
        attrs.insert(EXCLUDE_FROM, ExcludeFrom::LIST | ExcludeFrom::PREVIEW);
        assert!(attrs.is_excluded_from(ExcludeFrom::LIST));
        assert!(!attrs.is_excluded_from(ExcludeFrom::DOCUMENTATION));
        assert!(attrs.remove(EXCLUDE_FROM));
        assert!(attrs.is_empty());
    }
}
