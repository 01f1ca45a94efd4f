//! Headless demo: renders a small scene through the recording backend and
//! logs what the scheduler submitted each frame.
//!
//! ```text
//! cargo run --example headless -- --backend d3d12 --frames-in-flight 2 --frames 4
//! RUST_LOG=debug cargo run --example headless -- --topology experimental --vxgi
//! ```

use clap::Parser;
use glam::Vec3;

use render_scheduler::backend::{BackendCall, BackendKind, RecordingBackend};
use render_scheduler::resources::{ImageData, MeshData};
use render_scheduler::scene::{
    Camera, LightComponent, MaterialComponent, ObjectComponent, ParticleEmitterComponent, Scene,
    TransformComponent,
};
use render_scheduler::{RenderGraphTopology, Renderer, RendererConfig, RendererResult};

/// Native API family reported by the recording backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
enum CliBackend {
    #[default]
    Opengl,
    D3d11,
    /// No path tracer
    D3d12,
    /// Falls back to the dummy topology
    Vulkan,
    /// Falls back to the dummy topology
    Metal,
    Empty,
}

impl From<CliBackend> for BackendKind {
    fn from(cli: CliBackend) -> Self {
        match cli {
            CliBackend::Opengl => BackendKind::OpenGl,
            CliBackend::D3d11 => BackendKind::D3d11,
            CliBackend::D3d12 => BackendKind::D3d12,
            CliBackend::Vulkan => BackendKind::Vulkan,
            CliBackend::Metal => BackendKind::Metal,
            CliBackend::Empty => BackendKind::Empty,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "headless", about = "Render scheduler headless demo", version)]
struct Args {
    #[arg(long, default_value = "opengl", value_enum)]
    backend: CliBackend,

    /// dummy, default, experimental or pathtracer
    #[arg(long, default_value = "default")]
    topology: RenderGraphTopology,

    /// Number of frames to render
    #[arg(long, default_value = "3")]
    frames: u32,

    #[arg(long, default_value = "1")]
    frames_in_flight: usize,

    #[arg(long, default_value = "1280")]
    width: u32,

    #[arg(long, default_value = "720")]
    height: u32,

    /// Enable voxel cone traced GI (experimental topology only)
    #[arg(long)]
    vxgi: bool,

    #[arg(long)]
    no_bloom: bool,

    /// Skip the final blit
    #[arg(long)]
    runtime: bool,
}

fn build_scene(renderer: &mut Renderer<RecordingBackend>) -> RendererResult<Scene> {
    let mut scene = Scene::new();
    scene.camera = Camera::new(Vec3::new(0.0, 4.0, 10.0), Vec3::ZERO);

    let checker = ImageData::solid_color([200, 200, 200, 255], "checker");
    let material = scene.spawn(MaterialComponent::default());
    renderer.image_queue().push(checker, |handle| {
        log::info!("Checker texture ready as {:?}", handle);
    });

    let cube = scene.spawn(MeshData::cube().upload(renderer.backend_mut(), material)?);
    let floor = scene.spawn(MeshData::plane(20.0, 20.0, 4).upload(renderer.backend_mut(), material)?);

    scene.spawn((ObjectComponent::new(floor), TransformComponent::default()));
    for x in -2..=2 {
        scene.spawn((
            ObjectComponent::new(cube),
            TransformComponent::from_translation(Vec3::new(x as f32 * 2.0, 1.0, 0.0)),
        ));
    }

    scene.spawn((
        LightComponent::infinite(Vec3::ONE, 3.0).with_shadow(),
        TransformComponent::default(),
    ));
    scene.spawn((
        LightComponent::point(Vec3::new(1.0, 0.6, 0.3), 10.0, 8.0).with_shadow(),
        TransformComponent::from_translation(Vec3::new(0.0, 3.0, 2.0)),
    ));
    scene.spawn((
        ParticleEmitterComponent::default(),
        TransformComponent::from_translation(Vec3::new(0.0, 0.5, 3.0)),
    ));

    Ok(scene)
}

fn run(args: Args) -> RendererResult<()> {
    let config = RendererConfig {
        width: args.width,
        height: args.height,
        topology: args.topology,
        enable_vxgi: args.vxgi,
        enable_bloom: !args.no_bloom,
        runtime: args.runtime,
        ..Default::default()
    };
    let backend =
        RecordingBackend::new(args.backend.into()).with_frames_in_flight(args.frames_in_flight.max(1));
    let mut renderer = Renderer::new(backend, config)?;
    log::info!("Pass order: {:?}", renderer.graph().sorted_names());

    let mut scene = build_scene(&mut renderer)?;
    renderer.backend_mut().take_calls();

    for frame in 0..args.frames {
        scene.elapsed_time = frame as f32 / 60.0;
        renderer.update(&scene)?;

        let backend = renderer.backend_mut();
        let draws = backend.draw_call_count();
        let dispatches = backend.count(|call| matches!(call, BackendCall::Dispatch { .. }));
        let uploads = backend.count(|call| matches!(call, BackendCall::UpdateConstantBuffer { .. }));
        let calls = backend.take_calls().len();
        log::info!(
            "Frame {}: {} calls, {} draws, {} dispatches, {} constant buffer uploads",
            frame,
            calls,
            draws,
            dispatches,
            uploads
        );
    }

    let final_image = renderer.final_image();
    log::info!(
        "Presented {} ({}x{}) from slot {} of {}",
        final_image.name,
        final_image.desc.width,
        final_image.desc.height,
        renderer.ring().frame_index(),
        renderer.ring().len()
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    log::info!("Starting headless demo on {:?}", args.backend);

    if let Err(err) = run(args) {
        log::error!("{}", err);
        std::process::exit(1);
    }
}
