//! Time-of-Day Settings
//!
//! A [`DaySetting`] has no stored value. It keeps a sorted list of control
//! points `(time, value)` with `time` in `[0, 1)` and derives its value for
//! any time of day by linear interpolation between the nearest control
//! points below and above, wrapping across midnight.
//!
//! Scalar values are stored in their declared unit. Colors are declared in
//! 0..255 per channel and stored normalized.

use glam::Vec3;
use serde::Deserialize;
use serde_yaml::Value;

use crate::errors::{PipelineError, Result, ValidationError};
use crate::resources::{PtaType, PtaValue};

/// Time of day at which a descriptor default is placed.
pub const DEFAULT_CONTROL_POINT_TIME: f32 = 0.5;

/// Finest time step a wrapped time of day resolves, in days.
///
/// This is the spacing of `f32` values in `[1, 2)`, so a time and the same
/// time one day later land on the same step.
pub const TIME_RESOLUTION: f64 = f32::EPSILON as f64;

/// Wraps `time` into `[0, 1)` and rounds it to [`TIME_RESOLUTION`].
///
/// The reduction runs in `f64`, so `wrap_time_of_day(t)` and
/// `wrap_time_of_day(t + 1.0)` agree exactly for every finite `t` in `[0, 1)`.
/// Non-finite input yields NaN.
#[must_use]
pub fn wrap_time_of_day(time: f32) -> f32 {
    let steps = (f64::from(time).rem_euclid(1.0) / TIME_RESOLUTION).round_ties_even();
    let wrapped = (steps * TIME_RESOLUTION) as f32;
    if wrapped >= 1.0 { 0.0 } else { wrapped }
}

/// Kind and domain of a day setting.
#[derive(Debug, Clone, PartialEq)]
pub enum DaySettingKind {
    Scalar {
        min: f32,
        max: f32,
        unit: Option<String>,
    },
    Color,
}

impl DaySettingKind {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Scalar { .. } => "scalar",
            Self::Color => "color",
        }
    }

    /// Shader input type of evaluated values.
    #[must_use]
    pub const fn pta_type(&self) -> PtaType {
        match self {
            Self::Scalar { .. } => PtaType::Float,
            Self::Color => PtaType::Vec3,
        }
    }

    /// Parses one value as written in a descriptor or override document.
    pub fn parse_value(&self, value: &Value) -> Result<DayValue> {
        match self {
            Self::Scalar { min, max, .. } => {
                let v = value
                    .as_f64()
                    .ok_or_else(|| PipelineError::config(format!("expected a number, got {value:?}")))?
                    as f32;
                if !(*min..=*max).contains(&v) {
                    return Err(PipelineError::config(format!(
                        "value {v} is outside the range [{min}, {max}]"
                    )));
                }
                Ok(DayValue::Scalar(v))
            }
            Self::Color => {
                let channels = value
                    .as_sequence()
                    .filter(|seq| seq.len() == 3)
                    .ok_or_else(|| PipelineError::config(format!("expected [r, g, b], got {value:?}")))?;
                let mut rgb = [0.0_f32; 3];
                for (dst, src) in rgb.iter_mut().zip(channels) {
                    let c = src.as_f64().filter(|c| (0.0..=255.0).contains(c)).ok_or_else(|| {
                        PipelineError::config(format!("color channel {src:?} is not in 0..255"))
                    })?;
                    *dst = c as f32 / 255.0;
                }
                Ok(DayValue::Color(Vec3::from_array(rgb)))
            }
        }
    }

    fn accepts(&self, value: &DayValue) -> bool {
        match (self, value) {
            (Self::Scalar { min, max, .. }, DayValue::Scalar(v)) => (*min..=*max).contains(v),
            (Self::Color, DayValue::Color(c)) => {
                c.cmpge(Vec3::ZERO).all() && c.cmple(Vec3::ONE).all()
            }
            _ => false,
        }
    }
}

/// An evaluated day-setting value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DayValue {
    Scalar(f32),
    Color(Vec3),
}

impl DayValue {
    #[inline]
    fn lerp(self, other: Self, f: f32) -> Self {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => Self::Scalar(a + (b - a) * f),
            (Self::Color(a), Self::Color(b)) => Self::Color(a + (b - a) * f),
            (a, _) => a,
        }
    }

    #[must_use]
    pub fn as_scalar(self) -> Option<f32> {
        match self {
            Self::Scalar(v) => Some(v),
            Self::Color(_) => None,
        }
    }
}

impl From<DayValue> for PtaValue {
    fn from(value: DayValue) -> Self {
        match value {
            DayValue::Scalar(v) => PtaValue::Float(v),
            DayValue::Color(c) => PtaValue::Vec3(c),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDaySetting {
    #[serde(rename = "type")]
    kind: String,
    default: Value,
    range: Option<[f32; 2]>,
    unit: Option<String>,
    #[serde(default)]
    label: String,
    #[serde(default)]
    description: String,
}

/// A setting interpolated over the time of day.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySetting {
    kind: DaySettingKind,
    control_points: Vec<(f32, DayValue)>,
    label: String,
    description: String,
}

impl DaySetting {
    /// Builds a day setting from its descriptor mapping. The default becomes
    /// a single control point at noon.
    pub fn from_descriptor(descriptor: &Value) -> Result<Self> {
        let raw: RawDaySetting = serde_yaml::from_value(descriptor.clone()).map_err(|e| {
            PipelineError::config(format!("malformed daytime setting descriptor: {e}"))
        })?;

        let kind = match raw.kind.as_str() {
            "scalar" => {
                let [min, max] = raw
                    .range
                    .ok_or_else(|| PipelineError::config("scalar daytime setting needs a range"))?;
                if min > max {
                    return Err(PipelineError::config(format!(
                        "malformed range [{min}, {max}]"
                    )));
                }
                DaySettingKind::Scalar {
                    min,
                    max,
                    unit: raw.unit,
                }
            }
            "color" => DaySettingKind::Color,
            other => {
                return Err(PipelineError::config(format!(
                    "unknown daytime setting type '{other}'"
                )));
            }
        };

        let default = kind.parse_value(&raw.default)?;
        Ok(Self {
            kind,
            control_points: vec![(DEFAULT_CONTROL_POINT_TIME, default)],
            label: raw.label,
            description: raw.description,
        })
    }

    /// Creates a day setting from explicit control points.
    pub fn new(kind: DaySettingKind, control_points: Vec<(f32, DayValue)>) -> Result<Self> {
        let mut setting = Self {
            kind,
            control_points: Vec::new(),
            label: String::new(),
            description: String::new(),
        };
        setting.set_control_points(control_points)?;
        Ok(setting)
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &DaySettingKind {
        &self.kind
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Control points, sorted by time.
    #[must_use]
    pub fn control_points(&self) -> &[(f32, DayValue)] {
        &self.control_points
    }

    /// Replaces all control points.
    ///
    /// Times must lie in `[0, 1)` and be distinct after wrapping; values
    /// must fit the declared domain. On error the previous points are kept.
    pub fn set_control_points(&mut self, mut points: Vec<(f32, DayValue)>) -> Result<()> {
        for (t, v) in &points {
            if !(0.0..1.0).contains(t) {
                return Err(PipelineError::config(format!(
                    "control point time {t} is outside [0, 1)"
                )));
            }
            if !self.kind.accepts(v) {
                return Err(PipelineError::config(format!(
                    "control point value {v:?} does not fit a {} setting",
                    self.kind.name()
                )));
            }
        }
        for (t, _) in &mut points {
            *t = wrap_time_of_day(*t);
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        if let Some(w) = points.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(PipelineError::config(format!(
                "duplicate control point at time {}",
                w[0].0
            )));
        }
        self.control_points = points;
        Ok(())
    }

    /// Parses and applies a `[[time, value], ..]` override list.
    pub fn load_control_points(&mut self, points: &Value) -> Result<()> {
        let seq = points
            .as_sequence()
            .ok_or_else(|| PipelineError::config("control points must be a list"))?;
        let mut parsed = Vec::with_capacity(seq.len());
        for point in seq {
            let pair = point
                .as_sequence()
                .filter(|p| p.len() == 2)
                .ok_or_else(|| PipelineError::config(format!("malformed control point {point:?}")))?;
            let t = pair[0]
                .as_f64()
                .ok_or_else(|| PipelineError::config(format!("malformed control point time {:?}", pair[0])))?;
            parsed.push((t as f32, self.kind.parse_value(&pair[1])?));
        }
        self.set_control_points(parsed)
    }

    /// Value at `time_of_day`. Periodic with period 1.
    ///
    /// The time is wrapped with [`wrap_time_of_day`], so `t` and `t + 1.0`
    /// evaluate to the same value for every `t` in `[0, 1)`.
    pub fn evaluate(&self, time_of_day: f32) -> Result<DayValue> {
        if !time_of_day.is_finite() {
            return Err(ValidationError::NotFinite(time_of_day).into());
        }
        let points = &self.control_points;
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return Err(PipelineError::config("daytime setting has no control points"));
        };
        if points.len() == 1 {
            return Ok(first.1);
        }

        let t = wrap_time_of_day(time_of_day);

        let idx = points.partition_point(|(pt, _)| *pt <= t);
        let (prev_t, prev_v) = match idx {
            0 => (last.0 - 1.0, last.1),
            i => points[i - 1],
        };
        let (next_t, next_v) = match points.get(idx) {
            Some(&p) => p,
            None => (first.0 + 1.0, first.1),
        };

        let f = (t - prev_t) / (next_t - prev_t);
        Ok(prev_v.lerp(next_v, f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(min: f32, max: f32) -> DaySettingKind {
        DaySettingKind::Scalar {
            min,
            max,
            unit: None,
        }
    }

    fn sun_intensity() -> DaySetting {
        DaySetting::new(
            scalar(0.0, 100.0),
            vec![
                (0.75, DayValue::Scalar(10.0)),
                (0.25, DayValue::Scalar(20.0)),
                (0.5, DayValue::Scalar(80.0)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_exact_at_control_points() {
        let s = sun_intensity();
        for &(t, v) in s.control_points() {
            assert_eq!(s.evaluate(t).unwrap(), v);
        }
    }

    #[test]
    fn test_sorted_after_set() {
        let times: Vec<_> = sun_intensity().control_points().iter().map(|p| p.0).collect();
        assert_eq!(times, vec![0.25, 0.5, 0.75]);
    }

    #[test]
    fn test_interpolates_between_neighbours() {
        let s = sun_intensity();
        assert_eq!(s.evaluate(0.375).unwrap(), DayValue::Scalar(50.0));
    }

    #[test]
    fn test_wraps_across_midnight() {
        let s = sun_intensity();
        // 0.75 -> 1.25 spans 0.5; midnight is halfway between 10 and 20
        assert_eq!(s.evaluate(0.0).unwrap(), DayValue::Scalar(15.0));
        assert_eq!(s.evaluate(0.875).unwrap(), DayValue::Scalar(12.5));
    }

    #[test]
    fn test_periodic() {
        let s = sun_intensity();
        for t in [0.0, 0.125, 0.25, 0.3125, 0.5, 0.875] {
            assert_eq!(s.evaluate(t).unwrap(), s.evaluate(t + 1.0).unwrap());
            assert_eq!(s.evaluate(t).unwrap(), s.evaluate(t - 1.0).unwrap());
        }
    }

    #[test]
    fn test_periodic_at_arbitrary_times() {
        let ramp = DaySetting::new(
            scalar(0.0, 10.0),
            vec![(0.0, DayValue::Scalar(0.0)), (0.5, DayValue::Scalar(10.0))],
        )
        .unwrap();
        for t in [0.1_f32, 0.3, 0.33, 0.7, 0.999_9] {
            assert_eq!(ramp.evaluate(t).unwrap(), ramp.evaluate(t + 1.0).unwrap(), "t={t}");
        }
        assert_eq!(wrap_time_of_day(0.1), wrap_time_of_day(1.1));
        assert_eq!(wrap_time_of_day(1.0 - f32::EPSILON / 2.0), 0.0);
    }

    #[test]
    fn test_arbitrary_control_point_times_stay_exact() {
        let s = DaySetting::new(
            scalar(0.0, 10.0),
            vec![(0.1, DayValue::Scalar(3.0)), (0.7, DayValue::Scalar(9.0))],
        )
        .unwrap();
        for (t, expected) in [(0.1_f32, 3.0), (1.1, 3.0), (0.7, 9.0), (1.7, 9.0)] {
            assert_eq!(s.evaluate(t).unwrap(), DayValue::Scalar(expected), "t={t}");
        }
    }

    #[test]
    fn test_non_finite_time_is_rejected() {
        let s = sun_intensity();
        for t in [f32::NAN, f32::INFINITY] {
            assert!(matches!(
                s.evaluate(t),
                Err(PipelineError::Validation(ValidationError::NotFinite(_)))
            ));
        }
    }

    #[test]
    fn test_empty_fails() {
        let s = DaySetting::new(scalar(0.0, 1.0), Vec::new()).unwrap();
        assert!(s.evaluate(0.5).unwrap_err().is_config_error());
    }

    #[test]
    fn test_rejects_duplicates_and_bad_times() {
        let mut s = sun_intensity();
        let before = s.control_points().to_vec();

        let dup = vec![(0.5, DayValue::Scalar(1.0)), (0.5, DayValue::Scalar(2.0))];
        assert!(s.set_control_points(dup).is_err());
        assert!(s.set_control_points(vec![(1.0, DayValue::Scalar(1.0))]).is_err());
        assert!(s.set_control_points(vec![(0.1, DayValue::Scalar(101.0))]).is_err());
        assert_eq!(s.control_points(), &before[..]);
    }

    #[test]
    fn test_descriptor_default_at_noon() {
        let descriptor = serde_yaml::from_str("{type: color, default: [255, 0, 51]}").unwrap();
        let s = DaySetting::from_descriptor(&descriptor).unwrap();

        assert_eq!(s.control_points().len(), 1);
        assert_eq!(s.control_points()[0].0, 0.5);
        assert_eq!(
            s.evaluate(0.1).unwrap(),
            DayValue::Color(Vec3::new(1.0, 0.0, 0.2))
        );
    }

    #[test]
    fn test_load_control_points() {
        let descriptor =
            serde_yaml::from_str("{type: scalar, range: [0, 150], default: 50, unit: klux}").unwrap();
        let mut s = DaySetting::from_descriptor(&descriptor).unwrap();

        s.load_control_points(&serde_yaml::from_str("[[0.5, 100], [0.0, 0]]").unwrap())
            .unwrap();
        assert_eq!(s.evaluate(0.25).unwrap(), DayValue::Scalar(50.0));

        let err = s
            .load_control_points(&serde_yaml::from_str("[[0.5, 200]]").unwrap())
            .unwrap_err();
        assert!(err.is_config_error());
    }
}
