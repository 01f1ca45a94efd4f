//! Light component

use bevy_ecs::prelude::*;
use glam::Vec3;

/// Kind of light source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    /// Directional light (like the sun), direction from the transform rotation
    Infinite,
    /// Omnidirectional light at the transform translation
    Point,
    /// Unit quad light scaled and placed by the transform
    Area,
}

impl LightType {
    /// Value written to the shader light array
    pub fn gpu_id(&self) -> i32 {
        match self {
            LightType::Infinite => 0,
            LightType::Point => 1,
            LightType::Area => 2,
        }
    }
}

/// Light source component; position and orientation come from the transform
#[derive(Component, Debug, Clone)]
pub struct LightComponent {
    pub light_type: LightType,
    pub color: Vec3,
    pub energy: f32,
    pub cast_shadow: bool,
    pub atten_constant: f32,
    pub atten_linear: f32,
    pub atten_quadratic: f32,
    /// Distance beyond which a point light contributes nothing
    pub max_distance: f32,
}

impl Default for LightComponent {
    fn default() -> Self {
        Self {
            light_type: LightType::Point,
            color: Vec3::ONE,
            energy: 1.0,
            cast_shadow: false,
            atten_constant: 1.0,
            atten_linear: 0.09,
            atten_quadratic: 0.032,
            max_distance: 10.0,
        }
    }
}

impl LightComponent {
    pub fn infinite(color: Vec3, energy: f32) -> Self {
        Self {
            light_type: LightType::Infinite,
            color,
            energy,
            ..Default::default()
        }
    }

    pub fn point(color: Vec3, energy: f32, max_distance: f32) -> Self {
        Self {
            light_type: LightType::Point,
            color,
            energy,
            max_distance,
            ..Default::default()
        }
    }

    pub fn area(color: Vec3, energy: f32) -> Self {
        Self {
            light_type: LightType::Area,
            color,
            energy,
            ..Default::default()
        }
    }

    pub fn with_shadow(mut self) -> Self {
        self.cast_shadow = true;
        self
    }
}
