//! Surface shading models used by the scene.
//!
//! Every shader receives the interpolated world normal and the direction
//! from the surface towards the eye, and returns a colour that the
//! rasterizer writes (or blends) into the framebuffer.

use crate::color::Color;
use crate::math::{calculate_light_intensity, dot, normalize, scale, sub};

/// Contribution of the ambient light relative to the directional light
const AMBIENT_WEIGHT: f64 = 0.35;

/// Directional light shining from `position` towards the origin
#[derive(Clone, Copy, Debug)]
pub struct DirectionalLight {
    pub color: Color,
    pub intensity: f64,
    pub position: [f64; 3],
}

impl DirectionalLight {
    /// Unit vector from a surface towards the light
    pub fn direction(&self) -> [f64; 3] {
        normalize(&self.position)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct AmbientLight {
    pub color: Color,
    pub intensity: f64,
}

#[derive(Clone, Copy, Debug)]
pub struct Lights {
    pub directional: DirectionalLight,
    pub ambient: AmbientLight,
}

impl Lights {
    fn ambient_term(&self) -> Color {
        self.ambient
            .color
            .scale(self.ambient.intensity * AMBIENT_WEIGHT)
    }
}

/// Cel shading: diffuse lighting snapped to a fixed number of bands
#[derive(Clone, Copy, Debug)]
pub struct ToonMaterial {
    pub color: Color,
    /// Number of tones in the gradient map
    pub gradient_steps: u32,
}

impl ToonMaterial {
    pub fn shade(&self, normal: &[f64; 3], lights: &Lights) -> Color {
        let lambert = calculate_light_intensity(normal, &lights.directional.direction());
        let steps = self.gradient_steps.max(1) as f64;
        // Nearest-filtered gradient lookup
        let band = ((lambert * steps).floor() / (steps - 1.0).max(1.0)).min(1.0);
        let direct = lights
            .directional
            .color
            .scale(lights.directional.intensity * band);
        self.color
            .multiply(&lights.ambient_term().add(&direct))
            .clamped()
    }
}

/// Fully transmissive, perfectly smooth dielectric
#[derive(Clone, Copy, Debug)]
pub struct GlassMaterial {
    pub color: Color,
    pub ior: f64,
    pub roughness: f64,
    pub metalness: f64,
    pub transmission: f64,
}

impl GlassMaterial {
    /// Schlick reflectance at normal incidence
    pub fn base_reflectance(&self) -> f64 {
        let r = (self.ior - 1.0) / (self.ior + 1.0);
        r * r
    }

    /// Blends the glass surface over whatever is already behind it
    pub fn shade(
        &self,
        normal: &[f64; 3],
        to_eye: &[f64; 3],
        behind: Color,
        lights: &Lights,
    ) -> Color {
        let f0 = self.base_reflectance();
        let cos_theta = dot(normal, to_eye).abs().min(1.0);
        let fresnel = f0 + (1.0 - f0) * (1.0 - cos_theta).powi(5);

        let light_dir = lights.directional.direction();
        let reflected = sub(&scale(normal, 2.0 * dot(normal, &light_dir)), &light_dir);
        let shininess = 2.0 / (self.roughness * self.roughness).max(1e-3);
        let specular = dot(&reflected, to_eye).max(0.0).powf(shininess.min(256.0));

        let transmitted = behind.multiply(&self.color).scale(self.transmission);
        let opaque = self.color.multiply(&lights.ambient_term());
        let base = opaque.lerp(&transmitted, self.transmission.clamp(0.0, 1.0));

        let reflection = lights
            .directional
            .color
            .scale(fresnel + lights.directional.intensity * specular);
        base.scale(1.0 - fresnel * (1.0 - self.metalness))
            .add(&reflection)
            .clamped()
    }
}

/// Unlit flat colour
#[derive(Clone, Copy, Debug)]
pub struct BasicMaterial {
    pub color: Color,
    pub opacity: f64,
}

impl BasicMaterial {
    pub fn shade(&self) -> Color {
        self.color
    }
}

/// Diffuse surface used for loaded models
#[derive(Clone, Copy, Debug)]
pub struct LambertMaterial {
    pub color: Color,
}

impl LambertMaterial {
    pub fn shade(&self, normal: &[f64; 3], lights: &Lights) -> Color {
        let lambert = calculate_light_intensity(normal, &lights.directional.direction());
        let direct = lights
            .directional
            .color
            .scale(lights.directional.intensity * lambert);
        self.color
            .multiply(&lights.ambient_term().add(&direct))
            .clamped()
    }
}

/// Additive sprite material for the particle field
#[derive(Clone, Copy, Debug)]
pub struct PointsMaterial {
    pub color: Color,
    /// World-space size when `size_attenuation` is set
    pub size: f64,
    pub size_attenuation: bool,
    /// Strength of the additive contribution
    pub opacity: f64,
}

/// Which shared material a scene object is drawn with
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaterialRef {
    Toon,
    Glass,
    Icon(usize),
    Model,
}

impl MaterialRef {
    pub fn is_transparent(&self) -> bool {
        matches!(self, MaterialRef::Glass)
    }
}

/// Shared material table; objects refer into it by `MaterialRef`
#[derive(Clone, Debug)]
pub struct Materials {
    pub toon: ToonMaterial,
    pub glass: GlassMaterial,
    pub icons: Vec<BasicMaterial>,
    pub model: LambertMaterial,
    pub particles: PointsMaterial,
}

impl Materials {
    /// Recolours the toon and glass materials; particles keep their colour
    pub fn set_material_color(&mut self, color: Color) {
        self.toon.color = color;
        self.glass.color = color;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lights() -> Lights {
        Lights {
            directional: DirectionalLight {
                color: Color::WHITE,
                intensity: 1.0,
                position: [0.0, 1.0, 0.0],
            },
            ambient: AmbientLight {
                color: Color::WHITE,
                intensity: 1.0,
            },
        }
    }

    #[test]
    fn toon_shading_is_banded() {
        let toon = ToonMaterial {
            color: Color::rgb(0.5, 0.5, 0.5),
            gradient_steps: 5,
        };
        let lights = lights();
        let tilt = |angle: f64| [angle.sin(), angle.cos(), 0.0];
        // Two normals inside the same band get the same tone
        assert_eq!(
            toon.shade(&tilt(0.30), &lights),
            toon.shade(&tilt(0.35), &lights)
        );
        // Facing away from the light only gets the ambient term
        let dark = toon.shade(&[0.0, -1.0, 0.0], &lights);
        assert!((dark.r - 0.5 * AMBIENT_WEIGHT).abs() < 1e-9);
    }

    #[test]
    fn glass_reflectance_matches_ior() {
        let glass = GlassMaterial {
            color: Color::WHITE,
            ior: 3.1629,
            roughness: 0.0,
            metalness: 0.0,
            transmission: 1.0,
        };
        assert!((glass.base_reflectance() - 0.2699).abs() < 1e-3);
    }

    #[test]
    fn material_color_change_skips_particles() {
        let mut materials = Materials {
            toon: ToonMaterial {
                color: Color::WHITE,
                gradient_steps: 5,
            },
            glass: GlassMaterial {
                color: Color::WHITE,
                ior: 1.5,
                roughness: 0.0,
                metalness: 0.0,
                transmission: 1.0,
            },
            icons: Vec::new(),
            model: LambertMaterial {
                color: Color::WHITE,
            },
            particles: PointsMaterial {
                color: Color::WHITE,
                size: 0.1,
                size_attenuation: true,
                opacity: 1.0,
            },
        };
        let red = Color::rgb(1.0, 0.0, 0.0);
        materials.set_material_color(red);
        assert_eq!(materials.toon.color, red);
        assert_eq!(materials.glass.color, red);
        assert_eq!(materials.particles.color, Color::WHITE);
    }
}
