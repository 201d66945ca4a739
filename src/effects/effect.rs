//! Effect Declarations
//!
//! An effect describes how one object is rendered: which of the five scene
//! passes it takes part in and which shader program each enabled pass uses.
//! Effects are loaded from YAML and resolved against a set of boolean
//! options:
//!
//! ```yaml
//! vertex:
//!     inject:
//!         transform: |
//!             vOutput.position.z += sin(time) * 0.1;
//! fragment:
//!     template: shader/templates/skin.frag.glsl
//!     inject:
//!         material: |
//!             m.roughness = 0.3;
//! passes:
//!     shadow:
//!         fragment:
//!             template: shader/templates/shadow_alpha.frag.glsl
//! ```
//!
//! The pair `(source, resolved options)` identifies an effect. Two requests
//! that resolve to the same options share one [`Effect`].

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Deserialize;
use xxhash_rust::xxh3::xxh3_64;

use super::pass::RenderPass;
use crate::backend::{ShaderProgram, Vfs};
use crate::errors::{PipelineError, Result};

/// Options every effect understands, with their defaults.
pub const DEFAULT_OPTIONS: [(&str, bool); 9] = [
    ("vertex_texcoord", true),
    ("alpha_testing", false),
    ("normal_mapping", true),
    ("parallax_mapping", false),
    ("render_gbuffer", true),
    ("render_shadow", true),
    ("render_voxelize", true),
    ("render_envmap", true),
    ("render_forward", false),
];

// ============================================================================
// Options
// ============================================================================

/// Option overrides requested for one effect application.
///
/// Only overrides are stored; [`EffectOptions::resolve`] merges them with
/// [`DEFAULT_OPTIONS`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EffectOptions {
    overrides: BTreeMap<String, bool>,
}

impl EffectOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: &str, enabled: bool) -> Self {
        self.set(name, enabled);
        self
    }

    pub fn set(&mut self, name: &str, enabled: bool) {
        self.overrides.insert(name.to_string(), enabled);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<bool> {
        self.overrides.get(name).copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.overrides.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// The complete option set: defaults with overrides applied.
    ///
    /// Fails with the name of the first unknown option.
    pub fn resolve(&self) -> std::result::Result<ResolvedOptions, String> {
        let mut resolved: BTreeMap<String, bool> = DEFAULT_OPTIONS
            .iter()
            .map(|&(k, v)| (k.to_string(), v))
            .collect();
        for (name, &enabled) in &self.overrides {
            match resolved.get_mut(name) {
                Some(slot) => *slot = enabled,
                None => return Err(name.clone()),
            }
        }
        Ok(ResolvedOptions(resolved))
    }
}

impl From<&[(&str, bool)]> for EffectOptions {
    fn from(pairs: &[(&str, bool)]) -> Self {
        let mut options = Self::new();
        for &(k, v) in pairs {
            options.set(k, v);
        }
        options
    }
}

/// A full, normalized option set. Usable as a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolvedOptions(BTreeMap<String, bool>);

impl ResolvedOptions {
    #[must_use]
    pub fn get(&self, name: &str) -> bool {
        self.0.get(name).copied().unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Canonical text form, `name=1;name=0;..` in name order.
    #[must_use]
    pub fn canonical(&self) -> String {
        let mut out = String::with_capacity(self.0.len() * 20);
        for (k, v) in &self.0 {
            let _ = write!(out, "{k}={};", u8::from(*v));
        }
        out
    }
}

// ============================================================================
// Declaration
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ShaderSection {
    template: Option<String>,
    inject: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PassSection {
    vertex: ShaderSection,
    fragment: ShaderSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct EffectDeclaration {
    vertex: ShaderSection,
    fragment: ShaderSection,
    passes: BTreeMap<String, PassSection>,
}

// ============================================================================
// Effect
// ============================================================================

/// A resolved effect: one optional shader program per pass.
#[derive(Debug, Clone)]
pub struct Effect {
    source: String,
    options: ResolvedOptions,
    id: u64,
    programs: [Option<ShaderProgram>; 5],
}

impl Effect {
    /// Reads and resolves the effect at `source`.
    pub fn load(vfs: &dyn Vfs, source: &str, options: &EffectOptions) -> Result<Self> {
        let text = vfs.read_to_string(source).map_err(|e| PipelineError::Effect {
            source_path: source.to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(source, &text, options)
    }

    /// Resolves an effect from its declaration text.
    ///
    /// Rejects unknown options and malformed declarations with
    /// [`PipelineError::Effect`], and effects enabling both the deferred and
    /// the forward pass with [`PipelineError::PassConflict`].
    pub fn parse(source: &str, text: &str, options: &EffectOptions) -> Result<Self> {
        let effect_error = |reason: String| PipelineError::Effect {
            source_path: source.to_string(),
            reason,
        };

        let options = options
            .resolve()
            .map_err(|name| effect_error(format!("unknown option '{name}'")))?;

        if options.get(RenderPass::GBuffer.option_name())
            && options.get(RenderPass::Forward.option_name())
        {
            return Err(PipelineError::PassConflict {
                source_path: source.to_string(),
            });
        }

        let declaration: EffectDeclaration = if text.trim().is_empty() {
            EffectDeclaration::default()
        } else {
            serde_yaml::from_str(text).map_err(|e| effect_error(e.to_string()))?
        };
        if let Some(unknown) = declaration
            .passes
            .keys()
            .find(|name| RenderPass::from_name(name).is_none())
        {
            return Err(effect_error(format!("unknown pass '{unknown}'")));
        }

        let id = Self::compute_id(source, &options);
        let tag = format!("{id:016x}");
        let programs = RenderPass::ALL.map(|pass| {
            options
                .get(pass.option_name())
                .then(|| build_program(&declaration, pass, &options, &tag))
        });

        Ok(Self {
            source: source.to_string(),
            options,
            id,
            programs,
        })
    }

    /// Identity hash of `(source, options)`.
    #[must_use]
    pub fn compute_id(source: &str, options: &ResolvedOptions) -> u64 {
        let key = format!("{source}\0{}", options.canonical());
        xxh3_64(key.as_bytes())
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Tag value that identifies this effect in tag states.
    #[must_use]
    pub fn tag(&self) -> String {
        format!("{:016x}", self.id)
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    #[inline]
    #[must_use]
    pub fn is_pass_enabled(&self, pass: RenderPass) -> bool {
        self.programs[pass as usize].is_some()
    }

    #[must_use]
    pub fn program(&self, pass: RenderPass) -> Option<&ShaderProgram> {
        self.programs[pass as usize].as_ref()
    }
}

fn build_program(
    declaration: &EffectDeclaration,
    pass: RenderPass,
    options: &ResolvedOptions,
    tag: &str,
) -> ShaderProgram {
    let overrides = declaration.passes.get(pass.name());
    let pick = |global: &ShaderSection, local: Option<&ShaderSection>, stage: &str| {
        let template = local
            .and_then(|s| s.template.clone())
            .or_else(|| global.template.clone())
            .unwrap_or_else(|| format!("shader/templates/{}.{stage}.glsl", pass.name()));
        let mut inject = global.inject.clone();
        if let Some(local) = local {
            inject.extend(local.inject.clone());
        }
        (template, inject)
    };

    let (vertex, vertex_inject) = pick(&declaration.vertex, overrides.map(|p| &p.vertex), "vert");
    let (fragment, fragment_inject) =
        pick(&declaration.fragment, overrides.map(|p| &p.fragment), "frag");

    let mut program = ShaderProgram::new(&format!("effect-{tag}-{}", pass.name()))
        .with_vertex(&vertex)
        .with_fragment(&fragment);
    for (k, v) in vertex_inject {
        program.injections.insert(format!("vertex.{k}"), v);
    }
    for (k, v) in fragment_inject {
        program.injections.insert(format!("fragment.{k}"), v);
    }

    for (name, enabled) in options.iter() {
        program
            .defines
            .set_flag(&format!("OPT_{}", name.to_ascii_uppercase()), enabled);
    }
    program
        .defines
        .set(&format!("IS_{}_SHADER", pass.name().to_ascii_uppercase()), "1");
    program
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_enable_deferred_passes() {
        let effect = Effect::parse("effects/default.yaml", "", &EffectOptions::new()).unwrap();

        assert!(effect.is_pass_enabled(RenderPass::GBuffer));
        assert!(effect.is_pass_enabled(RenderPass::Shadow));
        assert!(!effect.is_pass_enabled(RenderPass::Forward));
        assert_eq!(
            effect.program(RenderPass::Shadow).unwrap().fragment.as_deref(),
            Some("shader/templates/shadow.frag.glsl")
        );
    }

    #[test]
    fn test_pass_conflict() {
        let options = EffectOptions::new().with("render_forward", true);
        let err = Effect::parse("effects/glass.yaml", "", &options).unwrap_err();

        assert!(matches!(err, PipelineError::PassConflict { .. }));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_unknown_option() {
        let options = EffectOptions::new().with("render_lasers", true);
        let err = Effect::parse("effects/a.yaml", "", &options).unwrap_err();
        assert!(matches!(err, PipelineError::Effect { .. }));
    }

    #[test]
    fn test_equivalent_options_share_identity() {
        let a = Effect::parse("effects/a.yaml", "", &EffectOptions::new()).unwrap();
        let b = Effect::parse(
            "effects/a.yaml",
            "",
            &EffectOptions::new().with("render_gbuffer", true),
        )
        .unwrap();
        let c = Effect::parse(
            "effects/a.yaml",
            "",
            &EffectOptions::new().with("alpha_testing", true),
        )
        .unwrap();

        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn test_pass_overrides_and_defines() {
        let text = "
fragment:
    inject:
        material: m.roughness = 0.3;
passes:
    shadow:
        fragment:
            template: shader/templates/shadow_alpha.frag.glsl
";
        let options = EffectOptions::new().with("alpha_testing", true);
        let effect = Effect::parse("effects/leaves.yaml", text, &options).unwrap();
        let shadow = effect.program(RenderPass::Shadow).unwrap();

        assert_eq!(
            shadow.fragment.as_deref(),
            Some("shader/templates/shadow_alpha.frag.glsl")
        );
        assert_eq!(
            shadow.injections.get("fragment.material").map(String::as_str),
            Some("m.roughness = 0.3;")
        );
        assert_eq!(shadow.defines.get("OPT_ALPHA_TESTING").as_deref(), Some("1"));
        assert_eq!(shadow.defines.get("IS_SHADOW_SHADER").as_deref(), Some("1"));
    }

    #[test]
    fn test_malformed_declaration() {
        let err = Effect::parse("effects/bad.yaml", "vertex: {colour: red}", &EffectOptions::new())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Effect { .. }));

        let err = Effect::parse("effects/bad.yaml", "passes: {lighting: {}}", &EffectOptions::new())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Effect { .. }));
    }
}
