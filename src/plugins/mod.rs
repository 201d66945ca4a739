//! Plugin Host
//!
//! Plugins extend the pipeline with stages, settings and defines. They are
//! created through a [`PluginFactory`], configured from their descriptors
//! and driven by lifecycle [`Hook`]s.

pub mod daytime;
pub mod factory;
pub mod hooks;
pub mod plugin;
pub mod probe;
pub mod registry;

pub use daytime::{DayTimeManager, TIME_OF_DAY_BLOCK};
pub use factory::PluginFactory;
pub use hooks::{Hook, HookSet};
pub use plugin::{Plugin, PluginContext};
pub use probe::{EnvironmentProbe, NullEnvironmentProbe, ProbeVolume};
pub use registry::{ENV_PROBE_PLUGIN, PluginEntry, PluginRegistry, Propagation};
