//! Unit tests for the subpass stages

use std::sync::Arc;
use glam::Vec3;
use crate::command_recorder::{CommandRecorder, RecorderState};
use crate::config::MAX_LIGHTS;
use crate::context::RenderContext;
use crate::error::Error;
use crate::frame_synchronizer::FrameInfo;
use crate::graphics_device::mock_graphics_device::{GpuEvent, MockGraphicsDevice};
use crate::graphics_device::{
    CommandBufferUsage, DescriptorPool, Extent2D, Rect2D, SubmitInfo, TextureFormat,
};
use crate::scene::{DirectionalLight, MaterialKind, PointLight, SceneStore, Transform};
use crate::subpass::{
    CompositeStage, DebugStage, LightingUbo, MeshGpuState, OffscreenStage, SampledOutputs, Subpass, SubpassKind,
    UiDrawCmd, UiDrawData, UiDrawList, UiPushConstants, UiVertex, GBUFFER_COLOR_FORMATS,
};
use crate::swapchain_manager::SwapchainManager;
use crate::test_support::{mock_context, shaders, spawn_mesh, standard_subpasses, ui_stage};

struct Harness {
    mock: Arc<MockGraphicsDevice>,
    ctx: RenderContext,
    screen: SwapchainManager,
    pool: Arc<dyn DescriptorPool>,
    scene: SceneStore,
}

fn harness(frames_in_flight: u32) -> Harness {
    let (mock, ctx) = mock_context(frames_in_flight);
    let screen = SwapchainManager::new(&ctx, Extent2D::new(800, 600)).unwrap();
    let pool = ctx.device().create_descriptor_pool(&ctx.config().descriptor_pool).unwrap();
    Harness { mock, ctx, screen, pool, scene: SceneStore::new() }
}

/// Run a stage through attachments, pipeline and descriptor sets
fn build(h: &Harness, subpass: &mut Subpass, upstream: Option<&SampledOutputs>) {
    subpass.prepare_attachments(&h.ctx).unwrap();
    subpass.create_graphics_pipeline(&h.ctx, h.screen.render_pass()).unwrap();
    subpass.create_descriptor_sets(&h.ctx, &h.pool, upstream).unwrap();
}

fn frame(h: &Harness, frame_index: usize) -> FrameInfo {
    FrameInfo { frame_index, image_index: 0, extent: h.screen.extent() }
}

/// Primary recorder inside the screen render pass
fn open_primary(h: &Harness) -> CommandRecorder {
    let mut recorder = CommandRecorder::new(h.ctx.device().as_ref()).unwrap();
    recorder.begin(CommandBufferUsage::OneTimeSubmit).unwrap();
    recorder
        .begin_render_pass(
            h.screen.render_pass().as_ref(),
            h.screen.framebuffer(0).unwrap().as_ref(),
            Rect2D::full(800, 600),
            &h.screen.clear_values(),
        )
        .unwrap();
    recorder
}

/// End the recording, submit it and return what the mock saw
fn submit(h: &Harness, mut recorder: CommandRecorder) -> Vec<String> {
    recorder.end_render_pass().unwrap();
    recorder.end().unwrap();
    h.ctx
        .device()
        .submit(&SubmitInfo { command_buffers: vec![recorder.command_buffer()], ..Default::default() })
        .unwrap();
    match h.mock.submissions().last() {
        Some(GpuEvent::Submit { commands, .. }) => commands.clone(),
        _ => panic!("no submission recorded"),
    }
}

fn count(commands: &[String], prefix: &str) -> usize {
    commands.iter().filter(|c| c.starts_with(prefix)).count()
}

// ============================================================================
// DISPATCH TESTS
// ============================================================================

#[test]
fn test_kinds_and_private_recording() {
    let (mock, _ctx) = mock_context(2);
    let subpasses = standard_subpasses(mock.as_ref());
    let kinds: Vec<SubpassKind> = subpasses.iter().map(Subpass::kind).collect();
    assert_eq!(kinds, vec![SubpassKind::Offscreen, SubpassKind::Composite, SubpassKind::Debug, SubpassKind::Ui]);

    let private: Vec<bool> = subpasses.iter().map(Subpass::records_privately).collect();
    assert_eq!(private, vec![true, false, false, false]);
}

// ============================================================================
// OFFSCREEN TESTS
// ============================================================================

#[test]
fn test_offscreen_allocates_gbuffer() {
    let h = harness(2);
    let mut stage = OffscreenStage::new(shaders(h.mock.as_ref()));
    stage.prepare_attachments(&h.ctx).unwrap();

    let gbuffer = stage.gbuffer().unwrap();
    assert_eq!(gbuffer.attachments().len(), 6);
    assert_eq!(gbuffer.color_attachment_count(), 5);
    assert_eq!(gbuffer.extent(), Extent2D::new(64, 64));
    assert_eq!(gbuffer.depth_attachment().unwrap().format(), TextureFormat::D32_SFLOAT);
    assert_eq!(gbuffer.clear_values().len(), 6);

    let formats: Vec<TextureFormat> = gbuffer.attachments()[..5].iter().map(|a| a.format()).collect();
    assert_eq!(formats, GBUFFER_COLOR_FORMATS.to_vec());
    assert!(gbuffer.attachments().iter().all(|a| a.is_sampled()));

    let outputs = stage.sampled_outputs().unwrap();
    assert_eq!(outputs.textures.len(), 5);
}

#[test]
fn test_offscreen_pipeline_before_attachments_fails() {
    let h = harness(2);
    let mut stage = OffscreenStage::new(shaders(h.mock.as_ref()));
    assert!(matches!(stage.create_graphics_pipeline(&h.ctx), Err(Error::InvalidOperation(_))));
}

#[test]
fn test_offscreen_provisions_default_materials_only() {
    let mut h = harness(3);
    let mut subpass = Subpass::Offscreen(OffscreenStage::new(shaders(h.mock.as_ref())));
    build(&h, &mut subpass, None);

    let lit = spawn_mesh(&mut h.scene, h.mock.as_ref(), MaterialKind::Default, Vec3::ZERO);
    let wire = spawn_mesh(&mut h.scene, h.mock.as_ref(), MaterialKind::Debug, Vec3::X);
    let sets_before = h.mock.created("descriptor_set");
    let ubos_before = h.mock.created("buffer:uniform");

    subpass.on_mesh_constructed(&h.ctx, &h.pool, &mut h.scene, lit).unwrap();
    subpass.on_mesh_constructed(&h.ctx, &h.pool, &mut h.scene, wire).unwrap();
    // A second notification does not allocate again
    subpass.on_mesh_constructed(&h.ctx, &h.pool, &mut h.scene, lit).unwrap();

    assert_eq!(h.mock.created("descriptor_set") - sets_before, 3);
    assert_eq!(h.mock.created("buffer:uniform") - ubos_before, 3);

    let state = h.scene.get::<MeshGpuState>(lit).unwrap();
    assert_eq!(state.get(SubpassKind::Offscreen).unwrap().frame_count(), 3);
    assert!(h.scene.get::<MeshGpuState>(wire).is_none());
}

#[test]
fn test_offscreen_draw_records_private_buffer() {
    let mut h = harness(2);
    let mut subpass = Subpass::Offscreen(OffscreenStage::new(shaders(h.mock.as_ref())));
    build(&h, &mut subpass, None);
    for x in 0..2 {
        let e = spawn_mesh(&mut h.scene, h.mock.as_ref(), MaterialKind::Default, Vec3::new(x as f32, 0.0, 0.0));
        subpass.on_mesh_constructed(&h.ctx, &h.pool, &mut h.scene, e).unwrap();
    }

    let mut deps = Vec::new();
    subpass.gather_present_dependencies(0, &mut deps);
    assert!(deps.is_empty());

    // The primary recorder is left untouched
    let mut primary = open_primary(&h);
    subpass.draw(&mut primary, &frame(&h, 0), &h.scene, 0.016).unwrap();
    let primary_commands = submit(&h, primary);
    assert_eq!(count(&primary_commands, "draw"), 0);

    let mut deps = Vec::new();
    subpass.gather_present_dependencies(0, &mut deps);
    assert_eq!(deps.len(), 1);
    h.ctx
        .device()
        .submit(&SubmitInfo { command_buffers: vec![deps[0].command_buffer], ..Default::default() })
        .unwrap();
    let Some(GpuEvent::Submit { commands, .. }) = h.mock.submissions().last().cloned() else {
        panic!("no submission recorded");
    };
    assert!(commands.iter().any(|c| c.contains("attachments=6, clears=6")));
    assert!(commands.contains(&"bind_pipeline(offscreen)".to_string()));
    assert_eq!(count(&commands, "draw_indexed(3, 1"), 2);
    drop(deps);

    subpass.mark_dependencies_submitted(0).unwrap();
    let mut deps = Vec::new();
    subpass.gather_present_dependencies(0, &mut deps);
    assert!(deps.is_empty());
    // Slot 1 was never recorded
    subpass.gather_present_dependencies(1, &mut deps);
    assert!(deps.is_empty());
}

#[test]
fn test_offscreen_draw_reuses_recorder_after_completion() {
    let h = harness(1);
    let mut stage = OffscreenStage::new(shaders(h.mock.as_ref()));
    stage.prepare_attachments(&h.ctx).unwrap();
    stage.create_graphics_pipeline(&h.ctx).unwrap();

    stage.draw(&frame(&h, 0), &h.scene, 0.0).unwrap();
    stage.mark_submitted(0).unwrap();
    // Submitted -> Initial happens at the start of the next recording
    stage.draw(&frame(&h, 0), &h.scene, 0.0).unwrap();

    let mut deps = Vec::new();
    stage.gather_present_dependencies(0, &mut deps);
    assert_eq!(deps.len(), 1);
}

#[test]
fn test_offscreen_clean_up_releases_entity_state() {
    let mut h = harness(2);
    let mut offscreen = Subpass::Offscreen(OffscreenStage::new(shaders(h.mock.as_ref())));
    let mut debug = Subpass::Debug(DebugStage::new(shaders(h.mock.as_ref())));
    build(&h, &mut offscreen, None);
    build(&h, &mut debug, None);

    let lit = spawn_mesh(&mut h.scene, h.mock.as_ref(), MaterialKind::Default, Vec3::ZERO);
    let wire = spawn_mesh(&mut h.scene, h.mock.as_ref(), MaterialKind::Debug, Vec3::ZERO);
    for e in [lit, wire] {
        offscreen.on_mesh_constructed(&h.ctx, &h.pool, &mut h.scene, e).unwrap();
        debug.on_mesh_constructed(&h.ctx, &h.pool, &mut h.scene, e).unwrap();
    }

    offscreen.clean_up(&mut h.scene);
    assert!(h.scene.get::<MeshGpuState>(lit).is_none());
    assert!(h.scene.get::<MeshGpuState>(wire).is_some());
    assert!(offscreen.sampled_outputs().is_none());

    debug.clean_up(&mut h.scene);
    assert_eq!(h.scene.count::<MeshGpuState>(), 0);
}

// ============================================================================
// COMPOSITE TESTS
// ============================================================================

#[test]
fn test_composite_requires_offscreen_outputs() {
    let h = harness(2);
    let mut stage = CompositeStage::new(shaders(h.mock.as_ref()));
    stage.create_graphics_pipeline(&h.ctx, h.screen.render_pass()).unwrap();
    assert!(matches!(
        stage.create_descriptor_sets(&h.ctx, &h.pool, None),
        Err(Error::InvalidOperation(_))
    ));
}

#[test]
fn test_composite_sets_per_frame_in_flight() {
    let h = harness(3);
    let mut offscreen = Subpass::Offscreen(OffscreenStage::new(shaders(h.mock.as_ref())));
    build(&h, &mut offscreen, None);
    let outputs = offscreen.sampled_outputs().unwrap();

    let mut stage = CompositeStage::new(shaders(h.mock.as_ref()));
    stage.create_graphics_pipeline(&h.ctx, h.screen.render_pass()).unwrap();
    stage.create_descriptor_sets(&h.ctx, &h.pool, Some(&outputs)).unwrap();
    assert_eq!(stage.descriptor_sets().len(), 3);
}

#[test]
fn test_composite_draws_fullscreen_triangle() {
    let mut h = harness(2);
    let mut offscreen = Subpass::Offscreen(OffscreenStage::new(shaders(h.mock.as_ref())));
    build(&h, &mut offscreen, None);
    let outputs = offscreen.sampled_outputs().unwrap();
    let mut composite = Subpass::Composite(CompositeStage::new(shaders(h.mock.as_ref())));
    build(&h, &mut composite, Some(&outputs));

    let sun = h.scene.create();
    h.scene.attach(sun, DirectionalLight::default()).unwrap();
    h.mock.clear_events();

    let mut primary = open_primary(&h);
    composite.draw(&mut primary, &frame(&h, 1), &h.scene, 0.016).unwrap();
    let commands = submit(&h, primary);

    assert!(commands.contains(&"bind_pipeline(composite)".to_string()));
    assert_eq!(count(&commands, "bind_descriptor_set"), 1);
    assert!(commands.contains(&"draw(3, 1)".to_string()));
    // Lighting + camera blocks
    let writes = h.mock.events().iter().filter(|e| matches!(e, GpuEvent::BufferWrite { .. })).count();
    assert_eq!(writes, 2);
}

#[test]
fn test_lighting_gather_caps_and_positions() {
    let mut scene = SceneStore::new();
    for _ in 0..MAX_LIGHTS + 3 {
        let e = scene.create();
        scene.attach(e, DirectionalLight::default()).unwrap();
    }
    let lamp = scene.create();
    scene.attach(lamp, PointLight { range: 7.0, ..PointLight::default() }).unwrap();
    scene.attach(lamp, Transform::from_position(Vec3::new(1.0, 2.0, 3.0))).unwrap();
    // No transform, not placed
    let stray = scene.create();
    scene.attach(stray, PointLight::default()).unwrap();

    let (ubo, dropped) = LightingUbo::gather(&scene);
    assert_eq!(dropped, 3);
    assert_eq!(ubo.directional_count as usize, MAX_LIGHTS);
    assert_eq!(ubo.point_count, 1);
    assert_eq!(ubo.point[0].position_range.to_array(), [1.0, 2.0, 3.0, 7.0]);
    assert_eq!(ubo.directional[0].direction.to_array(), [0.0, -1.0, 0.0, 0.0]);
}

// ============================================================================
// DEBUG TESTS
// ============================================================================

#[test]
fn test_debug_draws_only_debug_materials() {
    let mut h = harness(2);
    let mut debug = Subpass::Debug(DebugStage::new(shaders(h.mock.as_ref())));
    build(&h, &mut debug, None);

    let lit = spawn_mesh(&mut h.scene, h.mock.as_ref(), MaterialKind::Default, Vec3::ZERO);
    let wire = spawn_mesh(&mut h.scene, h.mock.as_ref(), MaterialKind::Debug, Vec3::Y);
    for e in [lit, wire] {
        debug.on_mesh_constructed(&h.ctx, &h.pool, &mut h.scene, e).unwrap();
    }
    assert!(h.scene.get::<MeshGpuState>(lit).is_none());
    assert!(h.scene.get::<MeshGpuState>(wire).unwrap().contains(SubpassKind::Debug));

    let mut primary = open_primary(&h);
    debug.draw(&mut primary, &frame(&h, 0), &h.scene, 0.0).unwrap();
    let commands = submit(&h, primary);
    assert_eq!(count(&commands, "bind_pipeline(debug)"), 1);
    assert_eq!(count(&commands, "draw_indexed"), 1);
}

#[test]
fn test_debug_without_entities_records_nothing() {
    let h = harness(2);
    let mut debug = Subpass::Debug(DebugStage::new(shaders(h.mock.as_ref())));
    build(&h, &mut debug, None);

    let mut primary = open_primary(&h);
    debug.draw(&mut primary, &frame(&h, 0), &h.scene, 0.0).unwrap();
    let commands = submit(&h, primary);
    assert_eq!(count(&commands, "bind_pipeline"), 0);
}

// ============================================================================
// UI TESTS
// ============================================================================

fn quad_list(clip_rects: &[[f32; 4]]) -> UiDrawList {
    let vertex = UiVertex { pos: [0.0, 0.0], uv: [0.0, 0.0], col: 0xffff_ffff };
    UiDrawList {
        vertices: vec![vertex; 4],
        indices: vec![0, 1, 2, 2, 3, 0],
        commands: clip_rects
            .iter()
            .map(|&clip_rect| UiDrawCmd { clip_rect, elem_count: 6, idx_offset: 0, vtx_offset: 0 })
            .collect(),
    }
}

fn ui_frame(lists: Vec<UiDrawList>) -> UiDrawData {
    UiDrawData {
        display_pos: [0.0, 0.0],
        display_size: [800.0, 600.0],
        framebuffer_scale: [1.0, 1.0],
        draw_lists: lists,
    }
}

#[test]
fn test_ui_push_constants_map_display_to_clip() {
    let pc = UiPushConstants::new([0.0, 0.0], [800.0, 600.0]);
    assert_eq!(pc.scale, [2.0 / 800.0, 2.0 / 600.0]);
    assert_eq!(pc.translate, [-1.0, -1.0]);

    let pc = UiPushConstants::new([100.0, 50.0], [200.0, 100.0]);
    assert_eq!(pc.translate, [-2.0, -2.0]);
}

#[test]
fn test_ui_scissor_is_clamped() {
    let data = ui_frame(Vec::new());
    assert_eq!(data.scissor_for([-10.0, -5.0, 50.0, 40.0], 800, 600), Some(Rect2D { x: 0, y: 0, width: 50, height: 40 }));
    assert_eq!(data.scissor_for([700.0, 500.0, 900.0, 700.0], 800, 600), Some(Rect2D { x: 700, y: 500, width: 100, height: 100 }));
    assert_eq!(data.scissor_for([900.0, 0.0, 1000.0, 10.0], 800, 600), None);

    let hidpi = UiDrawData { framebuffer_scale: [2.0, 2.0], ..ui_frame(Vec::new()) };
    assert_eq!(hidpi.scissor_for([10.0, 10.0, 20.0, 20.0], 1600, 1200), Some(Rect2D { x: 20, y: 20, width: 20, height: 20 }));
}

#[test]
fn test_ui_draw_per_command_scissor() {
    let h = harness(2);
    let mut ui = Subpass::Ui(ui_stage(h.mock.as_ref()));
    build(&h, &mut ui, None);
    ui.as_ui_mut()
        .unwrap()
        .set_draw_data(ui_frame(vec![quad_list(&[[0.0, 0.0, 100.0, 100.0], [900.0, 900.0, 950.0, 950.0]])]));

    let mut primary = open_primary(&h);
    ui.draw(&mut primary, &frame(&h, 0), &SceneStore::new(), 0.0).unwrap();
    let commands = submit(&h, primary);

    assert!(commands.contains(&"bind_pipeline(ui)".to_string()));
    assert!(commands.contains(&"push_constants(0, 16)".to_string()));
    assert!(commands.iter().any(|c| c.starts_with("bind_index_buffer") && c.ends_with("U16)")));
    assert!(commands.contains(&"set_scissor(0,0,100,100)".to_string()));
    // The second command is fully clipped
    assert_eq!(count(&commands, "draw_indexed"), 1);
    assert_eq!(commands.iter().rev().nth(2).map(String::as_str), Some("set_scissor(0,0,800,600)"));
}

#[test]
fn test_ui_restores_screen_viewport() {
    let h = harness(2);
    let mut ui = Subpass::Ui(ui_stage(h.mock.as_ref()));
    build(&h, &mut ui, None);
    let extent = h.screen.extent();
    ui.as_ui_mut().unwrap().set_draw_data(UiDrawData {
        display_size: [400.0, 300.0],
        framebuffer_scale: [1.0, 1.0],
        ..ui_frame(vec![quad_list(&[[0.0, 0.0, 400.0, 300.0]])])
    });

    let mut primary = open_primary(&h);
    ui.draw(&mut primary, &frame(&h, 0), &SceneStore::new(), 0.0).unwrap();
    let commands = submit(&h, primary);

    let viewports: Vec<&String> = commands.iter().filter(|c| c.starts_with("set_viewport")).collect();
    assert_eq!(viewports.first().map(|c| c.as_str()), Some("set_viewport(400x300)"));
    let screen_viewport = format!("set_viewport({}x{})", extent.width, extent.height);
    assert_eq!(viewports.last().map(|c| c.as_str()), Some(screen_viewport.as_str()));
}

#[test]
fn test_ui_draw_offsets_span_lists() {
    let h = harness(2);
    let mut ui = Subpass::Ui(ui_stage(h.mock.as_ref()));
    build(&h, &mut ui, None);
    ui.as_ui_mut().unwrap().set_draw_data(ui_frame(vec![
        quad_list(&[[0.0, 0.0, 800.0, 600.0]]),
        quad_list(&[[0.0, 0.0, 800.0, 600.0]]),
    ]));

    let mut primary = open_primary(&h);
    ui.draw(&mut primary, &frame(&h, 0), &SceneStore::new(), 0.0).unwrap();
    let commands = submit(&h, primary);
    assert!(commands.contains(&"draw_indexed(6, 1, 0, 0)".to_string()));
    assert!(commands.contains(&"draw_indexed(6, 1, 6, 4)".to_string()));
}

#[test]
fn test_ui_skips_empty_or_zero_sized_frames() {
    let h = harness(2);
    let mut ui = Subpass::Ui(ui_stage(h.mock.as_ref()));
    build(&h, &mut ui, None);

    let mut zero = ui_frame(vec![quad_list(&[[0.0, 0.0, 10.0, 10.0]])]);
    zero.display_size = [0.0, 600.0];
    for data in [ui_frame(Vec::new()), zero] {
        ui.as_ui_mut().unwrap().set_draw_data(data);
        let mut primary = open_primary(&h);
        ui.draw(&mut primary, &frame(&h, 0), &SceneStore::new(), 0.0).unwrap();
        let commands = submit(&h, primary);
        assert_eq!(count(&commands, "bind_pipeline"), 0);
    }
}

#[test]
fn test_ui_buffers_grow_on_demand_per_frame() {
    let h = harness(2);
    let mut ui = Subpass::Ui(ui_stage(h.mock.as_ref()));
    build(&h, &mut ui, None);
    let vertex_buffers = || h.mock.created("buffer:vertex");
    let base = vertex_buffers();

    let draw = |ui: &mut Subpass, frame_index: usize| {
        let mut primary = open_primary(&h);
        ui.draw(&mut primary, &frame(&h, frame_index), &SceneStore::new(), 0.0).unwrap();
        submit(&h, primary);
    };

    ui.as_ui_mut().unwrap().set_draw_data(ui_frame(vec![quad_list(&[[0.0, 0.0, 10.0, 10.0]])]));
    draw(&mut ui, 0);
    assert_eq!(vertex_buffers() - base, 1);
    let capacity = ui.as_ui_mut().unwrap().vertex_capacity(0);
    assert_eq!(capacity, 4 * std::mem::size_of::<UiVertex>() as u64);

    // Same size: reused
    draw(&mut ui, 0);
    assert_eq!(vertex_buffers() - base, 1);

    // Other frame in flight has its own buffer
    draw(&mut ui, 1);
    assert_eq!(vertex_buffers() - base, 2);

    // Larger: replaced
    ui.as_ui_mut().unwrap().set_draw_data(ui_frame(vec![
        quad_list(&[[0.0, 0.0, 10.0, 10.0]]),
        quad_list(&[[0.0, 0.0, 10.0, 10.0]]),
    ]));
    draw(&mut ui, 0);
    assert_eq!(vertex_buffers() - base, 3);
    assert!(ui.as_ui_mut().unwrap().vertex_capacity(0) > capacity);
}

#[test]
fn test_ui_draw_before_pipeline_fails() {
    let h = harness(2);
    let mut ui = ui_stage(h.mock.as_ref());
    ui.set_draw_data(ui_frame(vec![quad_list(&[[0.0, 0.0, 10.0, 10.0]])]));
    let mut primary = open_primary(&h);
    assert!(matches!(ui.draw(&mut primary, &frame(&h, 0)), Err(Error::InvalidOperation(_))));
    assert_eq!(primary.state(), RecorderState::Recording);
}
