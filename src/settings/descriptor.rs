//! Plugin Descriptors
//!
//! Every plugin ships a `config.yaml` next to its code:
//!
//! ```yaml
//! information:
//!     name: Ambient Occlusion
//!     author: someone
//!     version: 1.2
//!     description: Screen space ambient occlusion
//! settings: !!omap
//!     - technique:
//!         type: enum
//!         values: [SSAO, HBAO]
//!         default: HBAO
//!     - blur_quality:
//!         type: int
//!         range: [1, 4]
//!         default: 2
//! daytime_settings:
//!     occlusion_strength:
//!         type: scalar
//!         range: [0, 4]
//!         default: 1
//! ```
//!
//! `settings` and `daytime_settings` may be a mapping, a list of
//! single-entry mappings (the usual `!!omap` spelling) or null. Declaration
//! order is preserved in every form.
//!
//! The global day-time document only carries control points:
//!
//! ```yaml
//! control_points:
//!     scattering:
//!         sun_intensity: [[0.25, 20], [0.5, 80], [0.75, 10]]
//! ```

use serde::Deserialize;
use serde_yaml::Value;

use super::{DaySetting, Setting, SettingMap};
use crate::errors::{PipelineError, Result};

/// Informational header of a plugin descriptor.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PluginInfo {
    pub name: String,
    pub author: String,
    pub version: Value,
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    #[serde(default)]
    information: PluginInfo,
    #[serde(default)]
    settings: Value,
    #[serde(default)]
    daytime_settings: Value,
}

/// A parsed plugin descriptor.
#[derive(Debug, Clone, Default)]
pub struct PluginDescriptor {
    pub info: PluginInfo,
    pub settings: SettingMap<Setting>,
    pub day_settings: SettingMap<DaySetting>,
}

impl PluginDescriptor {
    /// Parses a descriptor document. Errors name the offending setting.
    pub fn from_yaml(source: &str) -> Result<Self> {
        let raw: RawDescriptor = if source.trim().is_empty() {
            RawDescriptor {
                information: PluginInfo::default(),
                settings: Value::Null,
                daytime_settings: Value::Null,
            }
        } else {
            serde_yaml::from_str(source)?
        };

        let mut settings = SettingMap::new();
        for (id, descriptor) in ordered_entries(&raw.settings, "settings")? {
            let setting = Setting::from_descriptor(&descriptor)
                .map_err(|e| PipelineError::config(format!("setting '{id}': {e}")))?;
            settings.insert(&id, setting)?;
        }

        let mut day_settings = SettingMap::new();
        for (id, descriptor) in ordered_entries(&raw.daytime_settings, "daytime_settings")? {
            let setting = DaySetting::from_descriptor(&descriptor)
                .map_err(|e| PipelineError::config(format!("daytime setting '{id}': {e}")))?;
            day_settings.insert(&id, setting)?;
        }

        Ok(Self {
            info: raw.information,
            settings,
            day_settings,
        })
    }
}

/// Normalizes a mapping, a list of single-entry mappings or null into an
/// ordered list of `(key, value)` pairs.
pub fn ordered_entries(node: &Value, section: &str) -> Result<Vec<(String, Value)>> {
    match node {
        Value::Null => Ok(Vec::new()),
        Value::Tagged(tagged) => ordered_entries(&tagged.value, section),
        Value::Mapping(map) => map
            .iter()
            .map(|(k, v)| Ok((key_string(k, section)?, v.clone())))
            .collect(),
        Value::Sequence(seq) => {
            let mut entries = Vec::with_capacity(seq.len());
            for item in seq {
                match item.as_mapping() {
                    Some(map) if map.len() == 1 => {
                        for (k, v) in map {
                            entries.push((key_string(k, section)?, v.clone()));
                        }
                    }
                    _ => {
                        return Err(PipelineError::config(format!(
                            "'{section}' entries must be single-key mappings, got {item:?}"
                        )));
                    }
                }
            }
            Ok(entries)
        }
        other => Err(PipelineError::config(format!(
            "'{section}' must be a mapping or a list, got {other:?}"
        ))),
    }
}

fn key_string(key: &Value, section: &str) -> Result<String> {
    key.as_str()
        .map(str::to_string)
        .ok_or_else(|| PipelineError::config(format!("'{section}' has a non-string key {key:?}")))
}

/// Control-point overrides, keyed by plugin and then by setting.
#[derive(Debug, Clone, Default)]
pub struct DayTimeOverrides {
    pub control_points: Vec<(String, Vec<(String, Value)>)>,
}

impl DayTimeOverrides {
    pub fn from_yaml(source: &str) -> Result<Self> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        let doc: Value = serde_yaml::from_str(source)?;
        let points = match &doc {
            Value::Mapping(map) => map.get("control_points").cloned().unwrap_or(Value::Null),
            Value::Null => Value::Null,
            _ => return Err(PipelineError::config("daytime document must be a mapping")),
        };

        let control_points = ordered_entries(&points, "control_points")?
            .into_iter()
            .map(|(plugin, settings)| {
                let section = format!("control_points.{plugin}");
                Ok((plugin, ordered_entries(&settings, &section)?))
            })
            .collect::<Result<_>>()?;
        Ok(Self { control_points })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingValue;

    #[test]
    fn test_omap_preserves_order() {
        let doc = "
settings: !!omap
    - zeta: {type: bool, default: true}
    - alpha: {type: int, range: [0, 4], default: 2}
    - mid: {type: float, range: [0, 1], default: 0.5}
daytime_settings:
";
        let d = PluginDescriptor::from_yaml(doc).unwrap();
        let ids: Vec<_> = d.settings.keys().collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
        assert!(d.day_settings.is_empty());
    }

    #[test]
    fn test_plain_mapping() {
        let doc = "
information: {name: Bloom, author: x, version: 1}
settings:
    strength: {type: float, range: [0, 4], default: 1}
daytime_settings:
    tint: {type: color, default: [255, 255, 255]}
";
        let d = PluginDescriptor::from_yaml(doc).unwrap();
        assert_eq!(d.info.name, "Bloom");
        assert_eq!(
            d.settings.get("strength").unwrap().value(),
            &SettingValue::Float(1.0)
        );
        assert!(d.day_settings.contains("tint"));
    }

    #[test]
    fn test_empty_descriptor() {
        let d = PluginDescriptor::from_yaml("").unwrap();
        assert!(d.settings.is_empty());
    }

    #[test]
    fn test_error_names_setting() {
        let doc = "settings:\n    broken: {type: matrix, default: 1}\n";
        let err = PluginDescriptor::from_yaml(doc).unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_overrides() {
        let doc = "
control_points:
    scattering:
        sun_intensity: [[0.25, 20], [0.75, 10]]
    clouds:
        density: [[0.5, 0.3]]
";
        let o = DayTimeOverrides::from_yaml(doc).unwrap();
        assert_eq!(o.control_points.len(), 2);
        assert_eq!(o.control_points[0].0, "scattering");
        assert_eq!(o.control_points[0].1[0].0, "sun_intensity");
    }
}
