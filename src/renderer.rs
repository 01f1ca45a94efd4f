//! Frame orchestration
//!
//! [`Renderer`] owns the backend, the frame ring, the compiled render graph and
//! the render targets. [`Renderer::update`] turns the current scene into draw
//! lists and constant buffer payloads, then runs the graph once.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use bevy_ecs::entity::Entity;
use bytemuck::Zeroable;
use glam::{Mat4, Vec3, Vec4};
use thiserror::Error;

use crate::backend::*;
use crate::draw::*;
use crate::frame::*;
use crate::pipeline::{build_render_graph, final_image, select_topology, RenderGraphTopology};
use crate::render_graph::*;
use crate::resources::{AsyncImageLoader, ImageLoadQueue};
use crate::scene::*;
use crate::{ConfigError, RendererConfig};

/// Anything that stops the renderer from starting or finishing a frame
#[derive(Error, Debug)]
pub enum RendererError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type RendererResult<T> = Result<T, RendererError>;

const CUBE_FACE_COUNT: usize = 6;
const ENV_NEAR_PLANE: f32 = 0.1;
const ENV_FAR_PLANE: f32 = 10.0;
const POINT_SHADOW_NEAR_PLANE: f32 = 0.1;

/// Size in bytes of one simulated particle
const PARTICLE_STRIDE: u32 = 64;

/// View matrices looking down +X, -X, +Y, -Y, +Z and -Z from `position`
pub fn cube_face_views(position: Vec3) -> [Mat4; CUBE_FACE_COUNT] {
    let faces = [
        (Vec3::X, -Vec3::Y),
        (-Vec3::X, -Vec3::Y),
        (Vec3::Y, Vec3::Z),
        (-Vec3::Y, -Vec3::Z),
        (Vec3::Z, -Vec3::Y),
        (-Vec3::Z, -Vec3::Y),
    ];
    faces.map(|(forward, up)| Mat4::look_at_rh(position, position + forward, up))
}

fn cube_face_projection(near: f32, far: f32) -> Mat4 {
    Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, near, far)
}

/// Particle buffers of an emitter and which alive list it reads next
#[derive(Debug, Clone, Copy)]
struct EmitterState {
    buffers: EmitterBuffers,
    pre_sim_index: usize,
}

/// Owns everything needed to render a [`Scene`] with one backend
pub struct Renderer<B: Backend> {
    backend: B,
    config: RendererConfig,
    topology: RenderGraphTopology,
    graph: RenderGraph,
    resources: ResourceRegistry,
    ring: FrameRing,
    draw_data: DrawData,
    image_queue: ImageLoadQueue,
    emitters: HashMap<Entity, EmitterState>,
    /// Environment maps are rendered again while set
    env_dirty: bool,
}

impl<B: Backend> Renderer<B> {
    /// Select the topology for the backend, allocate the frame contexts and
    /// build the render graph
    pub fn new(mut backend: B, config: RendererConfig) -> RendererResult<Self> {
        let topology = select_topology(backend.kind(), config.topology)?;
        log::info!(
            "Creating renderer on {} ({}), {}x{}, {} render graph",
            backend.name(),
            backend.kind(),
            config.width,
            config.height,
            topology
        );

        let ring = FrameRing::new(&mut backend, FrameCapacities::default())?;
        let mut resources = ResourceRegistry::new();
        let graph = build_render_graph(topology, &config, &mut backend, &mut resources)?;
        log::debug!("Render graph order: {:?}", graph.sorted_names());

        Ok(Self {
            backend,
            env_dirty: config.enable_ibl,
            config,
            topology,
            graph,
            resources,
            ring,
            draw_data: DrawData::default(),
            image_queue: ImageLoadQueue::new(),
            emitters: HashMap::new(),
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Topology actually built, which may differ from the configured one
    pub fn topology(&self) -> RenderGraphTopology {
        self.topology
    }

    pub fn graph(&self) -> &RenderGraph {
        &self.graph
    }

    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    pub fn ring(&self) -> &FrameRing {
        &self.ring
    }

    /// Draw lists of the last frame
    pub fn draw_data(&self) -> &DrawData {
        &self.draw_data
    }

    /// Queue drained at the start of every frame
    pub fn image_queue(&self) -> &ImageLoadQueue {
        &self.image_queue
    }

    /// Loader delivering into this renderer's queue
    pub fn image_loader(&self) -> AsyncImageLoader {
        AsyncImageLoader::new(self.image_queue.clone())
    }

    /// Render target holding the presented image
    pub fn final_image(&self) -> std::sync::Arc<GpuTexture> {
        self.resources.texture(final_image(self.topology))
    }

    /// Render the environment maps again on the next frame
    pub fn invalidate_env_maps(&mut self) {
        self.env_dirty = self.config.enable_ibl;
    }

    /// Render and present one frame of `scene`
    pub fn update(&mut self, scene: &Scene) -> RendererResult<()> {
        let frame_index = self.ring.frame_count() as u32;
        let frame = self.ring.current_mut();
        frame.cleanup();
        self.draw_data.clear();

        update_constants(frame, scene, &self.config, frame_index);
        update_lights(frame, &mut self.draw_data, scene, &self.config);

        if self.topology == RenderGraphTopology::Experimental && self.config.enable_vxgi {
            let pass = voxel_pass_constants(&frame.per_frame_cache);
            let pass_idx = frame.pass_cache.push(pass);
            self.draw_data.voxel_pass = Some(PassContext::fill(
                frame,
                scene,
                Some(pass_idx),
                |object| object.flags.contains(ObjectFlags::RENDERABLE),
                |_| true,
            ));
        }

        let camera = &scene.camera;
        let pass_idx = frame.pass_cache.push(PerPassConstantBuffer::new(
            camera.view_matrix(),
            camera.projection_matrix(),
        ));
        let frustum = camera.frustum();
        self.draw_data.main_pass = Some(PassContext::fill(
            frame,
            scene,
            Some(pass_idx),
            |object| object.flags.contains(ObjectFlags::RENDERABLE),
            |bound| frustum.intersects_aabb(bound),
        ));

        if self.env_dirty && self.graph.find_pass(RenderPassName::Env).is_some() {
            let projection = cube_face_projection(ENV_NEAR_PLANE, ENV_FAR_PLANE);
            let views = cube_face_views(Vec3::ZERO);
            let first = frame.pass_cache.len() as u32;
            for view in views {
                frame
                    .pass_cache
                    .push(PerPassConstantBuffer::new(view, projection));
            }
            self.draw_data.env_pass_idx = Some(first);
        }

        self.create_loaded_images()?;

        self.backend.begin_frame();

        if self.graph.find_pass(RenderPassName::Emitter).is_some() {
            self.update_emitters(scene)?;
        }

        let frame = self.ring.current();
        frame.upload(&mut self.backend);
        frame.per_frame_cb.bind(&mut self.backend, 0);

        log::trace!(
            "Frame {}: {} main draws, {} point shadows, {} emitters",
            self.ring.frame_count(),
            self.draw_data.main_pass.as_ref().map_or(0, PassContext::draw_count),
            self.draw_data.point_shadow_count(),
            self.draw_data.emitters.len()
        );

        let mut ctx = PassExecuteContext {
            backend: &mut self.backend,
            frame,
            draw_data: &self.draw_data,
            resources: &self.resources,
            config: &self.config,
        };
        self.graph.execute(&mut ctx);

        if self.draw_data.env_pass_idx.is_some() {
            self.env_dirty = false;
        }

        self.backend.end_frame();
        if let Err(err) = self.backend.present() {
            log::error!("Failed to present frame {}: {}", self.ring.frame_count(), err);
            return Err(err.into());
        }

        self.ring.move_to_next_frame();
        Ok(())
    }

    /// Create textures for images decoded since the last frame and hand the
    /// handles to their callbacks
    fn create_loaded_images(&mut self) -> RendererResult<()> {
        for loaded in self.image_queue.pop_all() {
            let handle = match loaded.image.upload(&mut self.backend) {
                Ok(handle) => handle,
                Err(err) => {
                    log::error!("Failed to create texture {}: {}", loaded.image.name, err);
                    return Err(err.into());
                }
            };
            log::debug!("Created texture {}", loaded.image.name);
            (loaded.callback)(handle);
        }
        Ok(())
    }

    fn update_emitters(&mut self, scene: &Scene) -> RendererResult<()> {
        let frame = self.ring.current_mut();

        for (entity, emitter) in scene.emitters() {
            let state = match self.emitters.entry(entity) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let buffers = create_emitter_buffers(&mut self.backend, emitter)?;
                    log::debug!(
                        "Created particle buffers for {:?} ({} particles)",
                        entity,
                        emitter.max_particle_count
                    );
                    entry.insert(EmitterState {
                        buffers,
                        pre_sim_index: 0,
                    })
                }
            };

            let position = scene
                .get::<TransformComponent>(entity)
                .map_or(Vec3::ZERO, |transform| transform.translation);
            let pre_sim_index = state.pre_sim_index;
            let emitter_idx = frame.emitter_cache.push(EmitterConstantBuffer {
                pre_sim_idx: pre_sim_index as i32,
                post_sim_idx: 1 - pre_sim_index as i32,
                elapsed_time: scene.elapsed_time,
                life_span: emitter.particle_life_span,
                seeds: Vec3::new(rand::random(), rand::random(), rand::random()),
                particle_scale: emitter.particle_scale,
                position,
                particles_per_frame: emitter.particles_per_frame,
                starting_velocity: emitter.starting_velocity,
                max_particle_count: emitter.max_particle_count,
                has_gravity: emitter.gravity as u32,
                ..Zeroable::zeroed()
            });

            self.draw_data.emitters.push(EmitterDraw {
                entity,
                emitter_idx,
                max_particle_count: emitter.max_particle_count,
                pre_sim_index,
                buffers: state.buffers,
            });
            state.pre_sim_index = 1 - pre_sim_index;
        }

        // Emitters gone from the scene release their particle buffers
        let backend = &mut self.backend;
        let draws = &self.draw_data.emitters;
        self.emitters.retain(|entity, state| {
            if draws.iter().any(|draw| draw.entity == *entity) {
                return true;
            }
            log::debug!("Releasing particle buffers of {:?}", entity);
            for buffer in state.buffers.handles() {
                backend.destroy_buffer(buffer);
            }
            false
        });

        Ok(())
    }
}

fn create_emitter_buffers(
    backend: &mut dyn Backend,
    emitter: &ParticleEmitterComponent,
) -> BackendResult<EmitterBuffers> {
    let count = emitter.max_particle_count.max(1);
    let mut buffer = |label: &str, element_size: u32, element_count: u32| {
        backend.create_structured_buffer(&BufferDescriptor {
            label: Some(label.to_string()),
            element_size,
            element_count,
        })
    };

    Ok(EmitterBuffers {
        particles: buffer("particles", PARTICLE_STRIDE, count)?,
        counters: buffer("particle_counters", 4, 4)?,
        dead_list: buffer("particle_dead_list", 4, count)?,
        alive_lists: [
            buffer("particle_alive_list_0", 4, count)?,
            buffer("particle_alive_list_1", 4, count)?,
        ],
        indirect_args: buffer("particle_indirect_args", 4, 8)?,
    })
}

/// Camera, world bound and feature toggles
fn update_constants(
    frame: &mut FrameContext,
    scene: &Scene,
    config: &RendererConfig,
    frame_index: u32,
) {
    let camera = &scene.camera;
    let bound = scene.bound();
    let (world_center, world_size_half) = if bound.is_valid() {
        (bound.center(), (bound.size().max_element() * 0.5).max(f32::EPSILON))
    } else {
        (Vec3::ZERO, 1.0)
    };
    let voxel_count = config.voxel_texture_size.max(1) as f32;

    let constants = &mut frame.per_frame_cache;
    constants.camera_position = camera.position;
    constants.camera_forward = camera.forward();
    constants.camera_right = camera.right();
    constants.camera_up = camera.true_up();
    constants.camera_fov = camera.projection.fov_y();
    constants.frame_index = frame_index;

    constants.world_center = world_center;
    constants.world_size_half = world_size_half;
    constants.texel_size = 1.0 / voxel_count;
    constants.voxel_size = world_size_half * 2.0 / voxel_count;
    constants.debug_voxel_id = config.debug_voxel_id.unwrap_or(-1);

    constants.enable_bloom = config.enable_bloom as u32;
    constants.bloom_threshold = config.bloom_threshold;
    constants.enable_vxgi = config.enable_vxgi as u32;
    constants.enable_shadow = config.enable_shadow as u32;
    constants.elapsed_time = scene.elapsed_time;

    constants.force_field_count = 0;
    for (entity, force_field) in scene.force_fields().take(MAX_FORCE_FIELD_COUNT) {
        let position = scene
            .get::<TransformComponent>(entity)
            .map_or(Vec3::ZERO, |transform| transform.translation);
        constants.force_fields[constants.force_field_count as usize] = ForceField {
            position,
            strength: force_field.strength,
        };
        constants.force_field_count += 1;
    }
}

/// Light array, shadow casting draw lists and point shadow face matrices
fn update_lights(
    frame: &mut FrameContext,
    draw_data: &mut DrawData,
    scene: &Scene,
    config: &RendererConfig,
) {
    let mut lights = Vec::with_capacity(MAX_LIGHT_COUNT);
    let mut point_shadow_count = 0;

    for (entity, light) in scene.lights() {
        if lights.len() == MAX_LIGHT_COUNT {
            log::warn!("Scene has more than {} lights, ignoring the rest", MAX_LIGHT_COUNT);
            break;
        }
        let transform = scene
            .get::<TransformComponent>(entity)
            .copied()
            .unwrap_or_default();

        let mut gpu_light = Light {
            color: light.color * light.energy,
            light_type: light.light_type.gpu_id(),
            position: transform.translation,
            atten_constant: light.atten_constant,
            atten_linear: light.atten_linear,
            atten_quadratic: light.atten_quadratic,
            max_distance: light.max_distance,
            shadow_map_index: -1,
            ..Zeroable::zeroed()
        };

        match light.light_type {
            LightType::Infinite => {
                gpu_light.position = transform.forward();
                if config.enable_shadow && light.cast_shadow && draw_data.shadow_pass.is_none() {
                    if let Some((view, projection, light_box)) =
                        directional_shadow(transform.forward(), &scene.bound())
                    {
                        let pass_idx = frame
                            .pass_cache
                            .push(PerPassConstantBuffer::new(view, projection));
                        draw_data.shadow_pass = Some(PassContext::fill(
                            frame,
                            scene,
                            Some(pass_idx),
                            |object| object.flags.contains(ObjectFlags::CAST_SHADOW),
                            |bound| light_box.intersects(bound),
                        ));
                        gpu_light.view_matrix = view;
                        gpu_light.projection_matrix = projection;
                        gpu_light.cast_shadow = 1;
                        gpu_light.shadow_map_index = 0;
                    }
                }
            }
            LightType::Point => {
                if config.enable_shadow
                    && light.cast_shadow
                    && point_shadow_count < MAX_POINT_LIGHT_SHADOW_COUNT
                {
                    let position = transform.translation;
                    let reach = Aabb::from_center_size(position, Vec3::splat(light.max_distance * 2.0));
                    draw_data.point_shadow_passes[point_shadow_count] = Some(PassContext::fill(
                        frame,
                        scene,
                        None,
                        |object| object.flags.contains(ObjectFlags::CAST_SHADOW),
                        |bound| reach.intersects(bound),
                    ));

                    let projection =
                        cube_face_projection(POINT_SHADOW_NEAR_PLANE, light.max_distance);
                    for (face, view) in cube_face_views(position).into_iter().enumerate() {
                        frame.point_shadow_cache[point_shadow_count * CUBE_FACE_COUNT + face] =
                            PointShadowConstantBuffer {
                                point_light_matrix: projection * view,
                                point_light_position: position,
                                point_light_far: light.max_distance,
                                ..Zeroable::zeroed()
                            };
                    }

                    gpu_light.cast_shadow = 1;
                    gpu_light.shadow_map_index = point_shadow_count as i32;
                    point_shadow_count += 1;
                }
            }
            LightType::Area => {
                let world = transform.world_matrix();
                let corners = [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)];
                gpu_light.points =
                    corners.map(|(x, y)| world * Vec4::new(x, y, 0.0, 1.0));
            }
        }

        lights.push(gpu_light);
    }

    let constants = &mut frame.per_frame_cache;
    constants.light_count = lights.len() as u32;
    constants.lights = [Light::zeroed(); MAX_LIGHT_COUNT];
    constants.lights[..lights.len()].copy_from_slice(&lights);
}

/// Orthographic light view enclosing the scene bound, and the world box it covers
fn directional_shadow(direction: Vec3, scene_bound: &Aabb) -> Option<(Mat4, Mat4, Aabb)> {
    if !scene_bound.is_valid() || direction.length_squared() == 0.0 {
        return None;
    }

    let direction = direction.normalize();
    let center = scene_bound.center();
    let radius = (scene_bound.size().length() * 0.5).max(f32::EPSILON);
    let up = if direction.y.abs() > 0.99 { Vec3::Z } else { Vec3::Y };

    let view = Mat4::look_at_rh(center - direction * radius, center, up);
    let projection = Mat4::orthographic_rh(-radius, radius, -radius, radius, 0.0, radius * 2.0);

    let light_space = Aabb::from_min_max(
        Vec3::new(-radius, -radius, -radius * 2.0),
        Vec3::new(radius, radius, 0.0),
    );
    Some((view, projection, light_space.transformed(&view.inverse())))
}

/// Orthographic view over the voxelized world cube
fn voxel_pass_constants(constants: &PerFrameConstantBuffer) -> PerPassConstantBuffer {
    let center = constants.world_center;
    let half = constants.world_size_half;
    let view = Mat4::look_at_rh(center + Vec3::Z * half, center, Vec3::Y);
    let projection = Mat4::orthographic_rh(-half, half, -half, half, 0.0, half * 2.0);
    PerPassConstantBuffer::new(view, projection)
}
