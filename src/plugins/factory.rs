//! Plugin Factory
//!
//! Maps plugin ids to constructors. The registry instantiates plugins only
//! through a factory, so an id without a constructor fails the load.

use std::fmt;

use rustc_hash::FxHashMap;

use super::plugin::Plugin;

type Constructor = Box<dyn Fn() -> Box<dyn Plugin>>;

#[derive(Default)]
pub struct PluginFactory {
    constructors: FxHashMap<String, Constructor>,
}

impl PluginFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the constructor for `id`, replacing any previous one.
    pub fn register<F, P>(&mut self, id: &str, constructor: F)
    where
        F: Fn() -> P + 'static,
        P: Plugin + 'static,
    {
        let constructor: Constructor = Box::new(move || -> Box<dyn Plugin> { Box::new(constructor()) });
        self.constructors.insert(id.to_string(), constructor);
    }

    #[must_use]
    pub fn with<F, P>(mut self, id: &str, constructor: F) -> Self
    where
        F: Fn() -> P + 'static,
        P: Plugin + 'static,
    {
        self.register(id, constructor);
        self
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.constructors.contains_key(id)
    }

    #[must_use]
    pub fn create(&self, id: &str) -> Option<Box<dyn Plugin>> {
        self.constructors.get(id).map(|c| c())
    }

    /// Registered ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.constructors.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Debug for PluginFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginFactory").field("ids", &self.ids()).finish()
    }
}
