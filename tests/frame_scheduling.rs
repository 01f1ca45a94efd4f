//! End to end frames through the recording backend

use std::sync::mpsc;

use glam::Vec3;
use rstest::rstest;

use render_scheduler::backend::{BackendCall, BackendError, BackendKind, RecordingBackend};
use render_scheduler::resources::{ImageData, MeshData};
use render_scheduler::scene::{
    Camera, MaterialComponent, ObjectComponent, Scene, TransformComponent,
};
use render_scheduler::{
    ConfigError, RenderGraphTopology, RenderPassName, Renderer, RendererConfig, RendererError,
};

fn renderer(kind: BackendKind, config: RendererConfig) -> Renderer<RecordingBackend> {
    let _ = env_logger::builder().is_test(true).try_init();
    Renderer::new(RecordingBackend::new(kind), config).unwrap()
}

/// Scene with one material shared by `count` cubes in front of the camera
fn cube_scene(renderer: &mut Renderer<RecordingBackend>, count: usize) -> Scene {
    let mut scene = Scene::new();
    scene.camera = Camera::new(Vec3::new(0.0, 3.0, 8.0), Vec3::ZERO);
    let material = scene.spawn(MaterialComponent::default());
    let mesh = MeshData::cube()
        .upload(renderer.backend_mut(), material)
        .unwrap();
    let mesh = scene.spawn(mesh);
    for i in 0..count {
        scene.spawn((
            ObjectComponent::new(mesh),
            TransformComponent::from_translation(Vec3::X * i as f32 * 1.5),
        ));
    }
    scene
}

#[test]
fn test_frame_is_bracketed_by_begin_and_present() {
    let mut renderer = renderer(BackendKind::OpenGl, RendererConfig::default());
    renderer.backend_mut().take_calls();

    renderer.update(&Scene::new()).unwrap();

    let calls = renderer.backend_mut().take_calls();
    assert_eq!(calls.first(), Some(&BackendCall::BeginFrame));
    assert_eq!(
        &calls[calls.len() - 2..],
        &[BackendCall::EndFrame, BackendCall::Present]
    );
    assert_eq!(renderer.ring().frame_count(), 1);
}

#[test]
fn test_shared_material_is_uploaded_once() {
    let mut renderer = renderer(BackendKind::OpenGl, RendererConfig::default());
    let scene = cube_scene(&mut renderer, 3);

    renderer.update(&scene).unwrap();

    let main = renderer.draw_data().main_pass.as_ref().unwrap();
    assert_eq!(main.draws.len(), 3);
    let material_idx = main.draws[0].subsets[0].material_idx;
    assert!(main
        .draws
        .iter()
        .all(|batch| batch.subsets[0].material_idx == material_idx));

    let frame = renderer.ring().current();
    assert_eq!(frame.batch_cache.len(), 3);
    assert_eq!(frame.material_cache.len(), 1);
}

#[test]
fn test_frames_in_flight_cycle_slots() {
    let backend = RecordingBackend::new(BackendKind::D3d12).with_frames_in_flight(2);
    let mut renderer = Renderer::new(backend, RendererConfig::default()).unwrap();
    let scene = cube_scene(&mut renderer, 1);
    assert_eq!(renderer.ring().len(), 2);

    let mut slots = Vec::new();
    let mut per_frame_buffers = Vec::new();
    for _ in 0..4 {
        slots.push(renderer.ring().frame_index());
        per_frame_buffers.push(renderer.ring().current().per_frame_cb.handle());
        renderer.update(&scene).unwrap();
    }

    assert_eq!(slots, vec![0, 1, 0, 1]);
    assert_ne!(per_frame_buffers[0], per_frame_buffers[1]);
    assert_eq!(per_frame_buffers[0], per_frame_buffers[2]);
    assert_eq!(renderer.ring().frame_count(), 4);
}

#[test]
fn test_present_failure_keeps_frame_slot() {
    let mut renderer = renderer(BackendKind::OpenGl, RendererConfig::default());
    renderer.backend_mut().set_fail_present(true);

    let err = renderer.update(&Scene::new()).unwrap_err();

    assert!(matches!(
        err,
        RendererError::Backend(BackendError::DeviceLost)
    ));
    assert_eq!(renderer.ring().frame_count(), 0);

    renderer.backend_mut().set_fail_present(false);
    renderer.update(&Scene::new()).unwrap();
    assert_eq!(renderer.ring().frame_count(), 1);
}

#[rstest]
#[case(BackendKind::OpenGl, RenderGraphTopology::Experimental, RenderGraphTopology::Experimental)]
#[case(BackendKind::OpenGl, RenderGraphTopology::PathTracer, RenderGraphTopology::PathTracer)]
#[case(BackendKind::D3d11, RenderGraphTopology::Experimental, RenderGraphTopology::Default)]
#[case(BackendKind::D3d12, RenderGraphTopology::Default, RenderGraphTopology::Default)]
#[case(BackendKind::Vulkan, RenderGraphTopology::Default, RenderGraphTopology::Dummy)]
#[case(BackendKind::Empty, RenderGraphTopology::PathTracer, RenderGraphTopology::Dummy)]
#[case(BackendKind::Metal, RenderGraphTopology::Experimental, RenderGraphTopology::Dummy)]
#[case(BackendKind::D3d11, RenderGraphTopology::PathTracer, RenderGraphTopology::PathTracer)]
fn test_topology_follows_backend(
    #[case] kind: BackendKind,
    #[case] requested: RenderGraphTopology,
    #[case] expected: RenderGraphTopology,
) {
    let config = RendererConfig {
        topology: requested,
        ..Default::default()
    };
    let mut renderer = renderer(kind, config);
    assert_eq!(renderer.topology(), expected);

    renderer.update(&Scene::new()).unwrap();
    assert!(renderer.resources().contains(renderer.final_image().name));
}

#[test]
fn test_path_tracer_on_d3d12_is_rejected() {
    let config = RendererConfig {
        topology: RenderGraphTopology::PathTracer,
        ..Default::default()
    };
    let result = Renderer::new(RecordingBackend::new(BackendKind::D3d12), config);
    assert!(matches!(
        result,
        Err(RendererError::Config(ConfigError::UnsupportedTopology {
            topology: RenderGraphTopology::PathTracer,
            backend: BackendKind::D3d12,
        }))
    ));
}

#[test]
fn test_dummy_topology_draws_gbuffer_only() {
    let mut renderer = renderer(BackendKind::Vulkan, RendererConfig::default());
    let scene = cube_scene(&mut renderer, 2);

    renderer.update(&scene).unwrap();

    assert_eq!(renderer.graph().sorted_names(), vec![RenderPassName::Gbuffer]);
    assert_eq!(renderer.draw_data().main_pass.as_ref().unwrap().draws.len(), 2);
    assert!(renderer.draw_data().env_pass_idx.is_none());
    assert_eq!(
        renderer
            .backend()
            .count(|call| matches!(call, BackendCall::Dispatch { .. })),
        0
    );
}

#[test]
fn test_loaded_images_become_textures_on_next_frame() {
    let mut renderer = renderer(BackendKind::OpenGl, RendererConfig::default());
    let (sender, receiver) = mpsc::channel();
    renderer
        .image_queue()
        .push(ImageData::solid_color([255, 0, 0, 255], "red"), move |handle| {
            sender.send(handle).unwrap();
        });
    assert!(receiver.try_recv().is_err());

    renderer.update(&Scene::new()).unwrap();

    let handle = receiver.try_recv().unwrap();
    assert!(renderer.backend().calls().contains(&BackendCall::CreateTexture {
        handle,
        label: Some("red".to_string()),
    }));
    assert!(renderer.image_queue().is_empty());
}
