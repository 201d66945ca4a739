//! Shader Configuration Artifact
//!
//! Every shader includes one generated file holding the input block
//! declarations and all active defines. It is rendered from a minijinja
//! template and rewritten whenever defines change, before the next reload.

use minijinja::{Environment, context};

use crate::errors::Result;
use crate::resources::{GroupedInputBlock, ShaderDefines};

/// Default location of the artifact in the virtual file system.
pub const DEFAULT_CONFIG_PATH: &str = "temp/pipeline_config.inc.glsl";

const AUTOCONFIG_TEMPLATE: &str = "\
// Autogenerated by the render pipeline.
// Changes to this file are overwritten on the next shader reload.
#pragma once

{% for block in blocks %}
{{ block }}
{% endfor %}
{% for name, value in defines %}
#define {{ name }} {{ value }}
{% endfor %}
";

/// Renders the artifact. Defines appear sorted by name.
pub fn render_autoconfig(defines: &ShaderDefines, blocks: &[GroupedInputBlock]) -> Result<String> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_template("autoconfig.glsl", AUTOCONFIG_TEMPLATE)?;

    let defines: Vec<(String, String)> = defines.to_map().into_iter().collect();
    let blocks: Vec<String> = blocks.iter().map(GroupedInputBlock::generate_shader_code).collect();

    let template = env.get_template("autoconfig.glsl")?;
    Ok(template.render(context! { defines => defines, blocks => blocks })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::PtaType;

    #[test]
    fn test_render_contains_defines_and_blocks() {
        let mut defines = ShaderDefines::new();
        defines.set("HAVE_PLUGIN_ao", "1");
        defines.set("CONST_ARRAY", "");
        defines.set("ao_quality", "1001");

        let mut block = GroupedInputBlock::new("MainSceneData");
        block.register_pta("frame_time", PtaType::Float).unwrap();

        let text = render_autoconfig(&defines, &[block]).unwrap();
        assert!(text.starts_with("// Autogenerated"));
        assert!(text.contains("#define HAVE_PLUGIN_ao 1\n"));
        assert!(text.contains("#define ao_quality 1001\n"));
        assert!(text.contains("uniform MainSceneData_UBO {"));
        assert!(text.contains("    float frame_time;"));

        let first = text.find("CONST_ARRAY").unwrap();
        let second = text.find("HAVE_PLUGIN_ao").unwrap();
        assert!(first < second);
    }
}
