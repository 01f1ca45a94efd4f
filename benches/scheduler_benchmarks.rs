use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::Vec3;

use render_scheduler::backend::{BackendKind, DummyBackend, RecordingBackend};
use render_scheduler::draw::PassContext;
use render_scheduler::frame::{FrameCapacities, FrameContext};
use render_scheduler::pipeline::build_render_graph;
use render_scheduler::render_graph::ResourceRegistry;
use render_scheduler::resources::MeshData;
use render_scheduler::scene::{
    Camera, LightComponent, MaterialComponent, ObjectComponent, Scene, TransformComponent,
};
use render_scheduler::{RenderGraphTopology, Renderer, RendererConfig};

/// `side * side` cubes sharing `materials` materials, lit by one shadowed sun
fn grid_scene(backend: &mut dyn render_scheduler::Backend, side: u32, materials: u32) -> Scene {
    let mut scene = Scene::new();
    scene.camera = Camera::new(Vec3::new(0.0, side as f32, side as f32), Vec3::ZERO);

    let meshes: Vec<_> = (0..materials)
        .map(|_| {
            let material = scene.spawn(MaterialComponent::default());
            let mesh = MeshData::cube().upload(backend, material).unwrap();
            scene.spawn(mesh)
        })
        .collect();

    for x in 0..side {
        for z in 0..side {
            let mesh = meshes[((x + z) % materials) as usize];
            let position = Vec3::new(x as f32 - side as f32 / 2.0, 0.0, z as f32 - side as f32 / 2.0);
            scene.spawn((
                ObjectComponent::new(mesh),
                TransformComponent::from_translation(position * 2.0),
            ));
        }
    }
    scene.spawn((
        LightComponent::infinite(Vec3::ONE, 3.0).with_shadow(),
        TransformComponent::default(),
    ));
    scene
}

// ---------------------------------------------------------------------------
// Draw list filling
// ---------------------------------------------------------------------------

fn bench_fill_main_pass(c: &mut Criterion) {
    let mut backend = DummyBackend::new();
    let scene = grid_scene(&mut backend, 32, 8);
    let mut frame = FrameContext::new(&mut backend, FrameCapacities::default()).unwrap();

    c.bench_function("fill_main_pass_1024_objects", |b| {
        b.iter(|| {
            frame.cleanup();
            black_box(PassContext::fill(&mut frame, &scene, Some(0), |_| true, |_| true))
        });
    });
}

// ---------------------------------------------------------------------------
// Graph construction
// ---------------------------------------------------------------------------

fn bench_build_default_graph(c: &mut Criterion) {
    let config = RendererConfig::default();
    c.bench_function("build_default_graph", |b| {
        b.iter(|| {
            let mut backend = DummyBackend::new();
            let mut resources = ResourceRegistry::new();
            black_box(
                build_render_graph(
                    RenderGraphTopology::Default,
                    &config,
                    &mut backend,
                    &mut resources,
                )
                .unwrap(),
            )
        });
    });
}

// ---------------------------------------------------------------------------
// Whole frames
// ---------------------------------------------------------------------------

fn bench_default_frame(c: &mut Criterion) {
    let backend = RecordingBackend::new(BackendKind::D3d12).with_frames_in_flight(2);
    let mut renderer = Renderer::new(backend, RendererConfig::default()).unwrap();
    let scene = grid_scene(renderer.backend_mut(), 16, 4);

    c.bench_function("default_frame_256_objects", |b| {
        b.iter(|| {
            renderer.update(black_box(&scene)).unwrap();
            renderer.backend_mut().take_calls();
        });
    });
}

criterion_group!(
    benches,
    bench_fill_main_pass,
    bench_build_default_graph,
    bench_default_frame,
);
criterion_main!(benches);
