//! Static Settings
//!
//! A [`Setting`] holds one typed, validated plugin option. Its kind is one
//! of a closed set ([`SettingKind`]); the descriptor decides the kind, the
//! range and the default, and every later assignment is checked against
//! them.
//!
//! # Descriptor format
//!
//! ```yaml
//! quality:
//!     type: enum
//!     values: [low, medium, high]
//!     default: medium
//!     shader_runtime: true
//!     label: Quality
//! sample_count:
//!     type: int
//!     range: [1, 64]
//!     default: 16
//! ```

use serde::Deserialize;
use serde_yaml::Value;

use super::value::SettingValue;
use crate::errors::{PipelineError, Result, ValidationError};
use crate::resources::ShaderDefines;

/// Offset added to enum indices so enum defines never collide with booleans.
pub const ENUM_DEFINE_BASE: i64 = 1000;

/// The declared kind of a static setting, with its domain.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingKind {
    Bool,
    Int { min: i64, max: i64 },
    Float { min: f64, max: f64 },
    Enum { values: Vec<String> },
    PowerOfTwo { min: i64, max: i64 },
}

impl SettingKind {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int { .. } => "int",
            Self::Float { .. } => "float",
            Self::Enum { .. } => "enum",
            Self::PowerOfTwo { .. } => "power_of_two",
        }
    }

    /// Checks `value` against the domain and returns the value to store.
    pub fn validate(&self, value: &SettingValue) -> std::result::Result<SettingValue, ValidationError> {
        let mismatch = |expected| ValidationError::TypeMismatch {
            expected,
            found: value.type_name(),
        };
        match self {
            Self::Bool => value.as_bool().map(SettingValue::Bool).ok_or_else(|| mismatch("bool")),
            Self::Int { min, max } => {
                let v = value.as_int().ok_or_else(|| mismatch("int"))?;
                check_range(v, *min, *max)?;
                Ok(SettingValue::Int(v))
            }
            Self::Float { min, max } => {
                let v = value.as_float().ok_or_else(|| mismatch("float"))?;
                if !(*min..=*max).contains(&v) {
                    return Err(ValidationError::OutOfRange {
                        value: format!("{v:?}"),
                        min: format!("{min:?}"),
                        max: format!("{max:?}"),
                    });
                }
                Ok(SettingValue::Float(v))
            }
            Self::Enum { values } => {
                let v = value.as_str().ok_or_else(|| mismatch("enum"))?;
                if values.iter().any(|allowed| allowed == v) {
                    Ok(SettingValue::Str(v.to_string()))
                } else {
                    Err(ValidationError::UnknownVariant {
                        value: v.to_string(),
                        allowed: values.clone(),
                    })
                }
            }
            Self::PowerOfTwo { min, max } => {
                let v = value.as_int().ok_or_else(|| mismatch("power_of_two"))?;
                if v <= 0 || v & (v - 1) != 0 {
                    return Err(ValidationError::NotPowerOfTwo(v));
                }
                check_range(v, *min, *max)?;
                Ok(SettingValue::Int(v))
            }
        }
    }
}

fn check_range(v: i64, min: i64, max: i64) -> std::result::Result<(), ValidationError> {
    if (min..=max).contains(&v) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            value: v.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSetting {
    #[serde(rename = "type")]
    kind: String,
    default: Option<Value>,
    range: Option<[Value; 2]>,
    values: Option<Vec<String>>,
    #[serde(default)]
    runtime: bool,
    #[serde(default)]
    shader_runtime: bool,
    #[serde(default)]
    label: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    #[allow(dead_code)]
    display_if: Option<Value>,
}

/// A typed plugin option.
#[derive(Debug, Clone, PartialEq)]
pub struct Setting {
    kind: SettingKind,
    default: SettingValue,
    value: SettingValue,
    runtime: bool,
    shader_runtime: bool,
    label: String,
    description: String,
}

impl Setting {
    /// Builds a setting from its descriptor mapping.
    pub fn from_descriptor(descriptor: &Value) -> Result<Self> {
        let raw: RawSetting = serde_yaml::from_value(descriptor.clone())
            .map_err(|e| PipelineError::config(format!("malformed setting descriptor: {e}")))?;

        let kind = parse_kind(&raw)?;
        let default = raw
            .default
            .as_ref()
            .and_then(SettingValue::from_yaml)
            .ok_or_else(|| PipelineError::config("setting has no scalar default"))?;
        let default = kind
            .validate(&default)
            .map_err(|e| PipelineError::config(format!("invalid default: {e}")))?;

        Ok(Self {
            kind,
            value: default.clone(),
            default,
            // shader_runtime implies runtime
            runtime: raw.runtime || raw.shader_runtime,
            shader_runtime: raw.shader_runtime,
            label: raw.label,
            description: raw.description,
        })
    }

    /// Creates a setting directly from a kind and a default.
    pub fn new(kind: SettingKind, default: impl Into<SettingValue>) -> Result<Self> {
        let default = kind
            .validate(&default.into())
            .map_err(|e| PipelineError::config(format!("invalid default: {e}")))?;
        Ok(Self {
            kind,
            value: default.clone(),
            default,
            runtime: false,
            shader_runtime: false,
            label: String::new(),
            description: String::new(),
        })
    }

    #[must_use]
    pub fn with_runtime(mut self, runtime: bool, shader_runtime: bool) -> Self {
        self.runtime = runtime || shader_runtime;
        self.shader_runtime = shader_runtime;
        self
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &SettingKind {
        &self.kind
    }

    #[inline]
    #[must_use]
    pub fn value(&self) -> &SettingValue {
        &self.value
    }

    #[inline]
    #[must_use]
    pub fn default_value(&self) -> &SettingValue {
        &self.default
    }

    /// Changeable without restarting the pipeline.
    #[inline]
    #[must_use]
    pub fn runtime(&self) -> bool {
        self.runtime
    }

    /// Changing the value requires regenerating defines and reloading shaders.
    #[inline]
    #[must_use]
    pub fn shader_runtime(&self) -> bool {
        self.shader_runtime
    }

    /// Whether the setting writes preprocessor defines.
    #[inline]
    #[must_use]
    pub fn exports_define(&self) -> bool {
        self.shader_runtime || !self.runtime
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Assigns a new value.
    ///
    /// Returns whether the change needs a define refresh and shader reload.
    /// On error the current value is left untouched.
    pub fn set_value(
        &mut self,
        value: impl Into<SettingValue>,
    ) -> std::result::Result<bool, ValidationError> {
        self.value = self.kind.validate(&value.into())?;
        Ok(self.shader_runtime)
    }

    pub fn reset(&mut self) {
        self.value = self.default.clone();
    }

    /// Puts back a value this setting held before.
    pub(crate) fn restore(&mut self, previous: SettingValue) {
        self.value = previous;
    }

    /// Writes the defines of this setting as `{plugin_id}_{setting_id}`.
    pub fn add_defines(&self, plugin_id: &str, setting_id: &str, defines: &mut ShaderDefines) {
        let name = format!("{plugin_id}_{setting_id}");
        match (&self.kind, &self.value) {
            (SettingKind::Bool, SettingValue::Bool(b)) => defines.set_flag(&name, *b),
            (SettingKind::Float { .. }, SettingValue::Float(f)) => {
                defines.set(&name, &format!("{f:?}"));
            }
            (SettingKind::Enum { values }, SettingValue::Str(current)) => {
                for (i, v) in values.iter().enumerate() {
                    let id = ENUM_DEFINE_BASE + i as i64;
                    defines.set_display(&format!("enum_{name}_{v}"), id);
                    if v == current {
                        defines.set_display(&name, id);
                    }
                }
            }
            (_, value) => defines.set_display(&name, value),
        }
    }
}

fn parse_kind(raw: &RawSetting) -> Result<SettingKind> {
    let int_range = || -> Result<(i64, i64)> {
        let [lo, hi] = raw
            .range
            .as_ref()
            .ok_or_else(|| PipelineError::config(format!("{} setting needs a range", raw.kind)))?;
        match (lo.as_i64(), hi.as_i64()) {
            (Some(lo), Some(hi)) if lo <= hi => Ok((lo, hi)),
            _ => Err(PipelineError::config(format!(
                "malformed {} range [{lo:?}, {hi:?}]",
                raw.kind
            ))),
        }
    };

    match raw.kind.as_str() {
        "bool" => Ok(SettingKind::Bool),
        "int" => int_range().map(|(min, max)| SettingKind::Int { min, max }),
        "power_of_two" => {
            let (min, max) = int_range()?;
            for bound in [min, max] {
                if bound <= 0 || bound & (bound - 1) != 0 {
                    return Err(PipelineError::config(format!(
                        "power_of_two bound {bound} is not a power of two"
                    )));
                }
            }
            Ok(SettingKind::PowerOfTwo { min, max })
        }
        "float" => {
            let [lo, hi] = raw
                .range
                .as_ref()
                .ok_or_else(|| PipelineError::config("float setting needs a range"))?;
            match (lo.as_f64(), hi.as_f64()) {
                (Some(min), Some(max)) if min <= max => Ok(SettingKind::Float { min, max }),
                _ => Err(PipelineError::config(format!(
                    "malformed float range [{lo:?}, {hi:?}]"
                ))),
            }
        }
        "enum" => match &raw.values {
            Some(values) if !values.is_empty() => Ok(SettingKind::Enum {
                values: values.clone(),
            }),
            _ => Err(PipelineError::config("enum setting needs a non-empty value list")),
        },
        other => Err(PipelineError::config(format!("unknown setting type '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setting(yaml: &str) -> Setting {
        Setting::from_descriptor(&serde_yaml::from_str(yaml).unwrap()).unwrap()
    }

    #[test]
    fn test_rejected_value_keeps_previous() {
        let mut s = setting("{type: bool, default: true}");
        let before = s.value().clone();

        let err = s.set_value("yes").unwrap_err();
        assert!(matches!(err, ValidationError::TypeMismatch { expected: "bool", .. }));
        assert_eq!(s.value(), &before);
    }

    #[test]
    fn test_int_range() {
        let mut s = setting("{type: int, range: [1, 64], default: 16}");
        assert!(s.set_value(65).is_err());
        assert!(s.set_value(0).is_err());
        assert_eq!(s.value(), &SettingValue::Int(16));
        assert_eq!(s.set_value(32), Ok(false));
        assert_eq!(s.value(), &SettingValue::Int(32));
    }

    #[test]
    fn test_float_accepts_int_literal() {
        let mut s = setting("{type: float, range: [0.0, 10.0], default: 1.5}");
        s.set_value(4).unwrap();
        assert_eq!(s.value(), &SettingValue::Float(4.0));
        assert!(s.set_value(10.5).is_err());
    }

    #[test]
    fn test_power_of_two() {
        let mut s = setting("{type: power_of_two, range: [256, 4096], default: 1024}");
        assert_eq!(s.set_value(1000), Err(ValidationError::NotPowerOfTwo(1000)));
        assert!(s.set_value(8192).is_err());
        s.set_value(2048).unwrap();
        assert_eq!(s.value(), &SettingValue::Int(2048));
    }

    #[test]
    fn test_shader_runtime_requires_refresh() {
        let mut s = setting("{type: enum, values: [low, high], default: low, shader_runtime: true}");
        assert!(s.runtime());
        assert!(s.exports_define());
        assert_eq!(s.set_value("high"), Ok(true));
        assert!(matches!(
            s.set_value("ultra"),
            Err(ValidationError::UnknownVariant { .. })
        ));
    }

    #[test]
    fn test_runtime_only_does_not_export() {
        let s = setting("{type: float, range: [0, 1], default: 0.5, runtime: true}");
        assert!(!s.exports_define());
    }

    #[test]
    fn test_enum_defines() {
        let s = setting("{type: enum, values: [low, medium, high], default: medium}");
        let mut defines = ShaderDefines::new();
        s.add_defines("ao", "quality", &mut defines);

        assert_eq!(defines.get("ao_quality").as_deref(), Some("1001"));
        assert_eq!(defines.get("enum_ao_quality_low").as_deref(), Some("1000"));
        assert_eq!(defines.get("enum_ao_quality_high").as_deref(), Some("1002"));
    }

    #[test]
    fn test_scalar_defines() {
        let mut defines = ShaderDefines::new();
        setting("{type: bool, default: false}").add_defines("bloom", "enabled", &mut defines);
        setting("{type: float, range: [0, 4], default: 2}").add_defines("bloom", "strength", &mut defines);

        assert_eq!(defines.get("bloom_enabled").as_deref(), Some("0"));
        assert_eq!(defines.get("bloom_strength").as_deref(), Some("2.0"));
    }

    #[test]
    fn test_malformed_descriptors() {
        let parse = |yaml: &str| Setting::from_descriptor(&serde_yaml::from_str(yaml).unwrap());

        assert!(parse("{type: vector, default: 1}").unwrap_err().is_config_error());
        assert!(parse("{type: int, default: 1}").unwrap_err().is_config_error());
        assert!(parse("{type: int, range: [5, 1], default: 3}").unwrap_err().is_config_error());
        assert!(parse("{type: int, range: [1, 5], default: 9}").unwrap_err().is_config_error());
        assert!(parse("{type: enum, values: [], default: a}").unwrap_err().is_config_error());
        assert!(parse("{type: bool, default: true, colour: red}").unwrap_err().is_config_error());
    }
}
