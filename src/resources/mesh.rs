//! CPU mesh geometry and its upload into a scene mesh component

use bevy_ecs::entity::Entity;
use glam::{Vec2, Vec3, Vec4};

use crate::backend::traits::*;
use crate::backend::types::Vertex;
use crate::scene::{Aabb, MeshComponent, MeshSubset};

/// Vertex and index data waiting to be uploaded
#[derive(Debug, Clone)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Object-space bound of all vertices
    pub fn bound(&self) -> Aabb {
        let mut bound = Aabb::EMPTY;
        for vertex in &self.vertices {
            bound.expand_point(vertex.position);
        }
        bound
    }

    /// Upload the geometry and describe it as a single-subset mesh drawn with `material`
    pub fn upload(&self, backend: &mut dyn Backend, material: Entity) -> BackendResult<MeshComponent> {
        let handle = backend.create_mesh(&self.vertices, &self.indices)?;
        log::debug!(
            "Uploaded mesh {} ({} vertices, {} indices)",
            self.name,
            self.vertices.len(),
            self.indices.len()
        );

        let bound = self.bound();
        Ok(MeshComponent {
            subsets: vec![MeshSubset {
                index_count: self.index_count(),
                index_offset: 0,
                material,
                local_bound: bound,
            }],
            local_bound: bound,
            index_count: self.index_count(),
            armature: None,
            gpu_mesh: Some(handle),
        })
    }

    /// Unit cube centered at the origin
    pub fn cube() -> Self {
        let mut mesh = MeshData::new("cube");

        let faces = [
            (Vec3::Z, Vec3::X),
            (-Vec3::Z, -Vec3::X),
            (Vec3::X, -Vec3::Z),
            (-Vec3::X, Vec3::Z),
            (Vec3::Y, Vec3::X),
            (-Vec3::Y, Vec3::X),
        ];

        for (normal, right) in faces {
            let up = normal.cross(right);
            let base = mesh.vertices.len() as u32;
            let corners = [
                (-right - up, Vec2::new(0.0, 1.0)),
                (right - up, Vec2::new(1.0, 1.0)),
                (right + up, Vec2::new(1.0, 0.0)),
                (-right + up, Vec2::new(0.0, 0.0)),
            ];
            for (offset, uv) in corners {
                mesh.vertices.push(Vertex {
                    position: (normal + offset) * 0.5,
                    normal,
                    uv,
                    tangent: right.extend(1.0),
                });
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        mesh
    }

    /// Quad covering the whole viewport in clip space
    pub fn screen_quad() -> Self {
        let mut mesh = MeshData::new("screen_quad");
        for (x, y) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            mesh.vertices.push(Vertex {
                position: Vec3::new(x, y, 0.0),
                normal: Vec3::Z,
                uv: Vec2::new((x + 1.0) * 0.5, (1.0 - y) * 0.5),
                tangent: Vec4::new(1.0, 0.0, 0.0, 1.0),
            });
        }
        mesh.indices.extend_from_slice(&[0, 1, 2, 0, 2, 3]);
        mesh
    }

    /// Plane on the XZ axis
    pub fn plane(width: f32, depth: f32, subdivisions: u32) -> Self {
        let mut mesh = MeshData::new("plane");
        let subdivisions = subdivisions.max(1);
        let step_x = width / subdivisions as f32;
        let step_z = depth / subdivisions as f32;

        for z in 0..=subdivisions {
            for x in 0..=subdivisions {
                mesh.vertices.push(Vertex {
                    position: Vec3::new(
                        -width / 2.0 + x as f32 * step_x,
                        0.0,
                        -depth / 2.0 + z as f32 * step_z,
                    ),
                    normal: Vec3::Y,
                    uv: Vec2::new(x as f32, z as f32) / subdivisions as f32,
                    tangent: Vec4::new(1.0, 0.0, 0.0, 1.0),
                });
            }
        }

        for z in 0..subdivisions {
            for x in 0..subdivisions {
                let current = z * (subdivisions + 1) + x;
                let next = current + subdivisions + 1;
                mesh.indices.extend_from_slice(&[
                    current,
                    next,
                    current + 1,
                    current + 1,
                    next,
                    next + 1,
                ]);
            }
        }

        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, BackendKind, RecordingBackend};
    use bevy_ecs::world::World;

    #[test]
    fn test_cube_geometry() {
        let cube = MeshData::cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.index_count(), 36);

        let bound = cube.bound();
        assert_eq!(bound.min, Vec3::splat(-0.5));
        assert_eq!(bound.max, Vec3::splat(0.5));
        for vertex in &cube.vertices {
            assert!((vertex.position.dot(vertex.normal) - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_plane_geometry() {
        let plane = MeshData::plane(4.0, 2.0, 2);
        assert_eq!(plane.vertices.len(), 9);
        assert_eq!(plane.index_count(), 24);
        assert_eq!(plane.bound().size(), Vec3::new(4.0, 0.0, 2.0));
    }

    #[test]
    fn test_upload_builds_single_subset_component() {
        let mut backend = RecordingBackend::new(BackendKind::OpenGl);
        let material = World::new().spawn_empty().id();

        let component = MeshData::cube().upload(&mut backend, material).unwrap();

        assert!(component.gpu_mesh.is_some());
        assert_eq!(component.subsets.len(), 1);
        assert_eq!(component.subsets[0].index_count, 36);
        assert_eq!(component.subsets[0].material, material);
        assert_eq!(
            backend.calls(),
            &[BackendCall::CreateMesh {
                handle: component.gpu_mesh.unwrap(),
                index_count: 36
            }]
        );
    }
}
