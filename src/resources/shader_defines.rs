//! Shader Preprocessor Defines
//!
//! A define set is the surface through which plugins, settings and stages
//! influence compiled shaders. Names and values are interned [`Symbol`]s, so
//! comparing two define sets (e.g. to check that regenerating them changed
//! nothing) is a slice comparison.
//!
//! ```rust,ignore
//! use dusk::resources::ShaderDefines;
//!
//! let mut defines = ShaderDefines::new();
//! defines.set("HAVE_PLUGIN_ao", "1");
//! defines.set_display("ao_sample_count", 16);
//! assert_eq!(defines.get("ao_sample_count").as_deref(), Some("16"));
//! ```

use std::collections::BTreeMap;
use std::fmt::Display;
use std::hash::{Hash, Hasher};

use crate::utils::interner::{self, Symbol};

/// A set of `#define NAME VALUE` entries.
///
/// Entries are kept sorted by symbol, so two sets holding the same entries
/// are equal and hash identically regardless of insertion order.
#[derive(Debug, Clone, Default)]
pub struct ShaderDefines {
    defines: Vec<(Symbol, Symbol)>,
}

impl ShaderDefines {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            defines: Vec::new(),
        }
    }

    /// Sets a define, replacing any previous value.
    pub fn set(&mut self, name: &str, value: &str) {
        self.set_symbol(interner::intern(name), interner::intern(value));
    }

    /// Sets a define from any displayable value.
    pub fn set_display(&mut self, name: &str, value: impl Display) {
        self.set(name, &value.to_string());
    }

    /// Sets a define to `1` or `0`.
    pub fn set_flag(&mut self, name: &str, enabled: bool) {
        self.set(name, if enabled { "1" } else { "0" });
    }

    #[inline]
    pub fn set_symbol(&mut self, name: Symbol, value: Symbol) {
        match self.defines.binary_search_by_key(&name, |&(k, _)| k) {
            Ok(idx) => self.defines[idx].1 = value,
            Err(idx) => self.defines.insert(idx, (name, value)),
        }
    }

    /// Removes a define, returning whether it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        let Some(sym) = interner::get(name) else {
            return false;
        };
        match self.defines.binary_search_by_key(&sym, |&(k, _)| k) {
            Ok(idx) => {
                self.defines.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        interner::get(name).is_some_and(|sym| {
            self.defines
                .binary_search_by_key(&sym, |&(k, _)| k)
                .is_ok()
        })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        let sym = interner::get(name)?;
        self.defines
            .binary_search_by_key(&sym, |&(k, _)| k)
            .ok()
            .map(|idx| interner::resolve(self.defines[idx].1).to_string())
    }

    #[inline]
    pub fn clear(&mut self) {
        self.defines.clear();
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.defines.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defines.is_empty()
    }

    /// Iterates entries as strings, in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.defines
            .iter()
            .map(|&(k, v)| (interner::resolve(k), interner::resolve(v)))
    }

    /// Entries sorted by name, as written into the shader configuration.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Merges `other` into `self`; values from `other` win on conflicts.
    pub fn merge(&mut self, other: &ShaderDefines) {
        for &(k, v) in &other.defines {
            self.set_symbol(k, v);
        }
    }

    #[must_use]
    pub fn merged_with(&self, other: &ShaderDefines) -> ShaderDefines {
        let mut result = self.clone();
        result.merge(other);
        result
    }

    /// Content hash, stable for equal define sets.
    #[must_use]
    pub fn compute_hash(&self) -> u64 {
        use std::hash::BuildHasher;

        rustc_hash::FxBuildHasher.hash_one(self)
    }
}

impl Hash for ShaderDefines {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.defines.hash(state);
    }
}

impl PartialEq for ShaderDefines {
    fn eq(&self, other: &Self) -> bool {
        self.defines == other.defines
    }
}

impl Eq for ShaderDefines {}

impl From<&[(&str, &str)]> for ShaderDefines {
    fn from(defines: &[(&str, &str)]) -> Self {
        let mut result = Self::new();
        for (k, v) in defines {
            result.set(k, v);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_value() {
        let mut defines = ShaderDefines::new();
        defines.set("ao_quality", "1000");
        defines.set("ao_quality", "1001");

        assert_eq!(defines.len(), 1);
        assert_eq!(defines.get("ao_quality"), Some("1001".to_string()));
    }

    #[test]
    fn test_flags_and_display() {
        let mut defines = ShaderDefines::new();
        defines.set_flag("REFERENCE_MODE", false);
        defines.set_display("LC_TILE_SLICES", 32);

        assert_eq!(defines.get("REFERENCE_MODE"), Some("0".to_string()));
        assert_eq!(defines.get("LC_TILE_SLICES"), Some("32".to_string()));
    }

    #[test]
    fn test_remove() {
        let mut defines = ShaderDefines::new();
        defines.set("HAVE_PLUGIN_bloom", "1");

        assert!(defines.remove("HAVE_PLUGIN_bloom"));
        assert!(!defines.remove("HAVE_PLUGIN_bloom"));
        assert!(!defines.contains("HAVE_PLUGIN_bloom"));
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let mut d1 = ShaderDefines::new();
        d1.set("A", "1");
        d1.set("B", "2");

        let mut d2 = ShaderDefines::new();
        d2.set("B", "2");
        d2.set("A", "1");

        assert_eq!(d1, d2);
        assert_eq!(d1.compute_hash(), d2.compute_hash());
    }

    #[test]
    fn test_merge_prefers_other() {
        let base = ShaderDefines::from(&[("A", "1"), ("B", "2")][..]);
        let over = ShaderDefines::from(&[("B", "3"), ("C", "4")][..]);

        let merged = base.merged_with(&over);
        assert_eq!(merged.get("A"), Some("1".to_string()));
        assert_eq!(merged.get("B"), Some("3".to_string()));
        assert_eq!(merged.get("C"), Some("4".to_string()));
    }

    #[test]
    fn test_to_map_is_sorted_by_name() {
        let mut defines = ShaderDefines::new();
        defines.set("zeta", "1");
        defines.set("alpha", "2");

        let names: Vec<_> = defines.to_map().into_keys().collect();
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
    }
}
