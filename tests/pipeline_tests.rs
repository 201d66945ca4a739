//! Frame Orchestrator Tests
//!
//! Tests for:
//! - Creation: stage order, hook order, generated shader configuration
//! - Per-frame order of hooks and the periodic state-cache clearing
//! - Window resize correction to multiples of 4
//! - Shader reload failure leaving bound shaders in place
//! - Lifecycle states and shutdown
//! - Time of day wrapping and validation

mod common;

use anyhow::Result;
use glam::{IVec2, UVec2};

use common::{CallLog, Fixture, settings_with_plugins};
use dusk::backend::LightHandle;
use dusk::plugins::{EnvironmentProbe, NullEnvironmentProbe};
use dusk::resources::{MAIN_SCENE_DATA, PtaValue};
use dusk::{PipelineError, PipelineSettings, PipelineState, ValidationError};

// ============================================================================
// Creation
// ============================================================================

#[test]
fn create_orders_core_plugin_and_final_stages() -> Result<()> {
    let fx = Fixture::new(1280, 720);
    fx.add_plugin("a", "");
    fx.add_plugin("b", "");
    let log = CallLog::default();

    let pipeline = fx.create(settings_with_plugins(&["a", "b"]), &log)?;

    let names: Vec<_> = pipeline.stages().stage_names().collect();
    assert_eq!(
        names,
        vec![
            "GBufferStage",
            "DownscaleZStage",
            "CombineVelocityStage",
            "ApplyLightsStage",
            "AmbientStage",
            "aStage",
            "bStage",
            "FinalStage",
        ]
    );
    assert_eq!(pipeline.stages().owner_of("aStage"), Some("a"));
    assert_eq!(pipeline.stages().owner_of("FinalStage"), None);
    assert_eq!(pipeline.state(), PipelineState::Created);
    Ok(())
}

#[test]
fn create_runs_setup_hooks_in_registration_order() -> Result<()> {
    let fx = Fixture::new(1280, 720);
    fx.add_plugin("a", "");
    fx.add_plugin("b", "");
    let log = CallLog::default();

    fx.create(settings_with_plugins(&["a", "b"]), &log)?;

    assert_eq!(
        *log.borrow(),
        vec![
            "a:stage_setup",
            "b:stage_setup",
            "a:post_stage_setup",
            "b:post_stage_setup",
            "a:pipeline_created",
            "b:pipeline_created",
        ]
    );
    Ok(())
}

#[test]
fn create_writes_shader_configuration() -> Result<()> {
    let fx = Fixture::new(1280, 720);
    fx.add_plugin("ao", "settings:\n    quality: {type: enum, values: [low, high], default: high}\n");
    let log = CallLog::default();

    let pipeline = fx.create(settings_with_plugins(&["ao"]), &log)?;

    let config = fx
        .vfs
        .contents("temp/pipeline_config.inc.glsl")
        .expect("configuration written");
    assert!(config.contains("uniform MainSceneData_UBO {"));
    assert!(config.contains("#define HAVE_PLUGIN_ao 1\n"));
    assert!(config.contains("#define ao_quality 1001\n"));
    assert!(config.contains("#define CAMERA_NEAR 0.1\n"));
    assert_eq!(pipeline.stages().config(), config);

    let scene_data = fx
        .vfs
        .contents("temp/main_scene_data.inc.glsl")
        .expect("scene data written");
    assert!(scene_data.contains("mat4 view_proj_mat_no_jitter;"));

    // Every compile saw the final configuration.
    assert_eq!(fx.compiler.last_config(), config);
    Ok(())
}

#[test]
fn create_applies_default_effect_to_root() -> Result<()> {
    let fx = Fixture::new(1280, 720);
    let pipeline = fx.create(PipelineSettings::default(), &CallLog::default())?;

    let applied = pipeline.effects().applied();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].source, "effects/default.yaml");
    assert_eq!(applied[0].sort, -10);

    let root = fx.scene.node(dusk::NodeId(0)).expect("root");
    assert_eq!(root.shader.map(|(_, priority)| priority), Some(25));
    Ok(())
}

#[test]
fn create_fails_for_unknown_plugin() {
    let fx = Fixture::new(1280, 720);
    let settings = settings_with_plugins(&["missing"]);

    let err = dusk::PipelineBuilder::new(settings)
        .create(fx.host())
        .err()
        .expect("creation fails");

    assert!(matches!(err, PipelineError::PluginLoad { ref plugin, .. } if plugin == "missing"));
}

#[test]
fn create_initializes_lights() -> Result<()> {
    let fx = Fixture::new(1280, 720);
    let mut pipeline = fx.create(PipelineSettings::default(), &CallLog::default())?;

    assert!(fx.lights.shadows_initialized());
    assert_eq!(fx.lights.reload_count(), 1);

    pipeline.add_light(LightHandle(7));
    pipeline.add_light(LightHandle(8));
    pipeline.remove_light(LightHandle(7));
    assert_eq!(fx.lights.lights(), vec![LightHandle(8)]);
    Ok(())
}

// ============================================================================
// Frame update
// ============================================================================

#[test]
fn update_runs_pre_before_post_render_hooks() -> Result<()> {
    let fx = Fixture::new(1280, 720);
    fx.add_plugin("a", "");
    fx.add_plugin("b", "");
    let log = CallLog::default();
    let mut pipeline = fx.create(settings_with_plugins(&["a", "b"]), &log)?;
    log.borrow_mut().clear();

    pipeline.update(1.0 / 60.0)?;

    assert_eq!(
        *log.borrow(),
        vec![
            "a:pre_render_update",
            "b:pre_render_update",
            "a:post_render_update",
            "b:post_render_update",
        ]
    );
    assert_eq!(pipeline.state(), PipelineState::Running);
    assert_eq!(fx.lights.update_count(), 1);
    Ok(())
}

#[test]
fn update_fills_frame_inputs() -> Result<()> {
    let fx = Fixture::new(1280, 720);
    let mut pipeline = fx.create(PipelineSettings::default(), &CallLog::default())?;

    pipeline.update(0.016)?;
    pipeline.update(0.016)?;

    let block = pipeline
        .stages()
        .input_block(MAIN_SCENE_DATA)
        .expect("block registered");
    assert_eq!(block.get_input("frame_index"), Some(PtaValue::Int(2)));
    assert_eq!(
        block.get_input("screen_size"),
        Some(PtaValue::IVec2(IVec2::new(1280, 720)))
    );
    Ok(())
}

#[test]
fn state_cache_is_cleared_periodically() -> Result<()> {
    let fx = Fixture::new(1280, 720);
    let mut pipeline = fx.create(PipelineSettings::default(), &CallLog::default())?;

    pipeline.update(0.25)?;
    assert_eq!(fx.scene.cache_clear_count(), 0);
    pipeline.update(0.25)?;
    assert_eq!(fx.scene.cache_clear_count(), 1);

    pipeline.update(1.0)?;
    assert_eq!(fx.scene.cache_clear_count(), 1);
    pipeline.update(1.0)?;
    assert_eq!(fx.scene.cache_clear_count(), 2);
    Ok(())
}

#[test]
fn scheduler_steps_every_frame() -> Result<()> {
    let fx = Fixture::new(1280, 720);
    let settings = PipelineSettings {
        task_schedule: vec![
            vec!["shadows".to_string()],
            vec!["probes".to_string()],
        ],
        ..PipelineSettings::default()
    };
    let mut pipeline = fx.create(settings, &CallLog::default())?;

    assert!(pipeline.scheduler().is_scheduled("shadows"));
    pipeline.update(0.016)?;
    assert!(pipeline.scheduler().is_scheduled("probes"));
    pipeline.update(0.016)?;
    assert!(pipeline.scheduler().is_scheduled("shadows"));
    Ok(())
}

// ============================================================================
// Resize
// ============================================================================

#[test]
fn resize_corrects_to_multiple_of_4() -> Result<()> {
    let fx = Fixture::new(1280, 720);
    fx.add_plugin("a", "");
    let log = CallLog::default();
    let mut pipeline = fx.create(settings_with_plugins(&["a"]), &log)?;
    log.borrow_mut().clear();

    fx.window.resize(1023, 767);
    assert!(pipeline.handle_window_event()?);

    let session = pipeline.session();
    assert_eq!(session.native_resolution, UVec2::new(1020, 764));
    assert_eq!(session.resolution, UVec2::new(1020, 764));
    assert_eq!(fx.window.requests(), vec![UVec2::new(1020, 764)]);
    assert_eq!(*log.borrow(), vec!["a:window_resized"]);

    // The corrected size arriving from the window is not a new resize.
    assert!(!pipeline.handle_window_event()?);
    Ok(())
}

#[test]
fn resize_to_multiple_of_4_is_kept() -> Result<()> {
    let fx = Fixture::new(1280, 720);
    let mut pipeline = fx.create(PipelineSettings::default(), &CallLog::default())?;

    fx.window.resize(1024, 768);
    assert!(pipeline.handle_window_event()?);

    assert_eq!(pipeline.session().native_resolution, UVec2::new(1024, 768));
    assert!(fx.window.requests().is_empty());
    Ok(())
}

#[test]
fn resize_recomputes_scaled_resolution_and_tiles() -> Result<()> {
    let fx = Fixture::new(1280, 720);
    let settings = PipelineSettings {
        resolution_scale: 0.75,
        ..PipelineSettings::default()
    };
    let mut pipeline = fx.create(settings, &CallLog::default())?;

    fx.window.resize(1920, 1080);
    pipeline.handle_window_event()?;

    let session = pipeline.session();
    assert_eq!(session.resolution, UVec2::new(1440, 808));
    assert_eq!(session.light_grid.tile_size, UVec2::new(60, 51));
    assert_eq!(session.light_grid.num_tiles, UVec2::new(24, 16));
    Ok(())
}

#[test]
fn unchanged_window_is_not_a_resize() -> Result<()> {
    let fx = Fixture::new(1280, 720);
    let log = CallLog::default();
    let mut pipeline = fx.create(PipelineSettings::default(), &log)?;

    assert!(!pipeline.handle_window_event()?);
    assert_eq!(pipeline.session().native_resolution, UVec2::new(1280, 720));
    Ok(())
}

// ============================================================================
// Reload
// ============================================================================

#[test]
fn failed_reload_keeps_bound_shaders() -> Result<()> {
    let fx = Fixture::new(1280, 720);
    let mut pipeline = fx.create(PipelineSettings::default(), &CallLog::default())?;
    let before = pipeline
        .stages()
        .bound_shaders("GBufferStage")
        .map(<[_]>::to_vec);
    let tag_states = fx.scene.tag_state_count();

    fx.compiler.fail_on("final_stage");
    let err = pipeline.reload_shaders().unwrap_err();

    assert!(matches!(err, PipelineError::ShaderCompile { ref stage, .. } if stage == "FinalStage"));
    assert_eq!(
        pipeline.stages().bound_shaders("GBufferStage").map(<[_]>::to_vec),
        before
    );
    assert_eq!(fx.scene.tag_state_count(), tag_states);

    fx.compiler.clear_failures();
    pipeline.reload_shaders()?;
    assert_ne!(
        pipeline.stages().bound_shaders("GBufferStage").map(<[_]>::to_vec),
        before
    );
    Ok(())
}

#[test]
fn reload_triggers_shader_reload_hook_and_lights() -> Result<()> {
    let fx = Fixture::new(1280, 720);
    fx.add_plugin("a", "");
    let log = CallLog::default();
    let mut pipeline = fx.create(settings_with_plugins(&["a"]), &log)?;
    log.borrow_mut().clear();

    pipeline.reload_shaders()?;

    assert_eq!(*log.borrow(), vec!["a:shader_reload"]);
    assert_eq!(fx.lights.reload_count(), 2);
    Ok(())
}

// ============================================================================
// Probes, time of day, shutdown
// ============================================================================

#[test]
fn environment_probe_without_plugin_is_inert() -> Result<()> {
    let fx = Fixture::new(1280, 720);
    let mut pipeline = fx.create(PipelineSettings::default(), &CallLog::default())?;

    let mut probe = pipeline.add_environment_probe();
    probe.set_border_smoothness(0.5);
    probe.set_parallax_correction(false);

    assert!(!probe.is_active());
    assert!(!NullEnvironmentProbe.is_active());
    Ok(())
}

#[test]
fn set_time_of_day_wraps() -> Result<()> {
    let fx = Fixture::new(1280, 720);
    let mut pipeline = fx.create(PipelineSettings::default(), &CallLog::default())?;

    pipeline.set_time_of_day(1.25)?;
    assert_eq!(pipeline.time_of_day(), 0.25);
    Ok(())
}

#[test]
fn set_time_of_day_rejects_non_finite_times() -> Result<()> {
    let fx = Fixture::new(1280, 720);
    let mut pipeline = fx.create(PipelineSettings::default(), &CallLog::default())?;
    pipeline.set_time_of_day(0.75)?;

    for time in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
        let err = pipeline.set_time_of_day(time).unwrap_err();
        assert!(
            matches!(err, PipelineError::Validation(ValidationError::NotFinite(_))),
            "{time}: {err}"
        );
    }
    assert_eq!(pipeline.time_of_day(), 0.75);
    Ok(())
}

#[test]
fn shutdown_rejects_further_frames() -> Result<()> {
    let fx = Fixture::new(1280, 720);
    let mut pipeline = fx.create(PipelineSettings::default(), &CallLog::default())?;
    pipeline.update(0.016)?;

    pipeline.shutdown();

    assert_eq!(pipeline.state(), PipelineState::TornDown);
    assert_eq!(fx.scene.tag_state_count(), 0);
    assert!(matches!(
        pipeline.update(0.016),
        Err(PipelineError::InvalidState(_))
    ));
    assert!(pipeline.reload_shaders().is_err());
    assert!(matches!(
        pipeline.set_time_of_day(0.5),
        Err(PipelineError::InvalidState(_))
    ));
    Ok(())
}
