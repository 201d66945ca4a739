//! Settings Model
//!
//! Typed plugin configuration in two flavours:
//!
//! - [`Setting`]: a static value validated against a closed set of kinds
//!   ([`SettingKind`]). Facets decide whether a change is allowed at runtime
//!   and whether it has to go through a shader reload.
//! - [`DaySetting`]: a value derived every frame from control points over
//!   the time of day.
//!
//! Both are declared per plugin in a [`PluginDescriptor`] and kept in
//! declaration order by a [`SettingMap`].

pub mod day_setting;
pub mod descriptor;
pub mod setting;
pub mod value;

pub use day_setting::{DaySetting, DaySettingKind, DayValue};
pub use descriptor::{DayTimeOverrides, PluginDescriptor, PluginInfo};
pub use setting::{Setting, SettingKind};
pub use value::SettingValue;

use rustc_hash::FxHashMap;

use crate::errors::{PipelineError, Result};

/// An insertion-ordered map from setting id to setting.
#[derive(Debug, Clone)]
pub struct SettingMap<T> {
    entries: Vec<(String, T)>,
    index: FxHashMap<String, usize>,
}

impl<T> Default for SettingMap<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: FxHashMap::default(),
        }
    }
}

impl<T> SettingMap<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a setting. Ids are unique within a map.
    pub fn insert(&mut self, id: &str, value: T) -> Result<()> {
        if self.index.contains_key(id) {
            return Err(PipelineError::config(format!("setting '{id}' is declared twice")));
        }
        self.index.insert(id.to_string(), self.entries.len());
        self.entries.push((id.to_string(), value));
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.index.get(id).map(|&i| &mut self.entries[i].1)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut T)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_map_order_and_uniqueness() {
        let mut map = SettingMap::new();
        map.insert("b", 1).unwrap();
        map.insert("a", 2).unwrap();

        assert!(map.insert("b", 3).is_err());
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(map.get("b"), Some(&1));
        *map.get_mut("a").unwrap() = 5;
        assert_eq!(map.get("a"), Some(&5));
    }
}
