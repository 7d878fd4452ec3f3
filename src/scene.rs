use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::camera::{CameraRig, PerspectiveCamera};
use crate::color::Color;
use crate::config::{
    SceneSettings, MODEL_SECTION, PARTICLE_COUNT, SECTION_COUNT, SECTION_SPACING,
};
use crate::geometry::{cuboid, torus_knot, Mesh};
use crate::material::{
    AmbientLight, BasicMaterial, DirectionalLight, GlassMaterial, LambertMaterial, Lights,
    MaterialRef, Materials, PointsMaterial, ToonMaterial,
};
use crate::math::{add, multiply_matrix_vector, rotation_matrix, scale};
use crate::model::{AnimationMixer, LoadedModel};
use crate::sky::Sky;
use crate::state::Viewport;

/// Position, Euler rotation (XYZ) and uniform scale
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: [f64; 3],
    pub rotation: [f64; 3],
    pub scale: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: 1.0,
        }
    }
}

impl Transform {
    /// Resolves the transform, shifting the object by `local_offset`
    /// expressed in its own (unscaled) model space
    pub fn world(&self, local_offset: &[f64; 3]) -> WorldTransform {
        let rotation = rotation_matrix(&self.rotation);
        let shift = multiply_matrix_vector(&rotation, &scale(local_offset, self.scale));
        WorldTransform {
            rotation,
            scale: self.scale,
            translation: add(&self.position, &shift),
        }
    }
}

/// Transform resolved once per draw
pub struct WorldTransform {
    rotation: [[f64; 3]; 3],
    scale: f64,
    translation: [f64; 3],
}

impl WorldTransform {
    pub fn point(&self, p: &[f64; 3]) -> [f64; 3] {
        let scaled = [p[0] * self.scale, p[1] * self.scale, p[2] * self.scale];
        add(&multiply_matrix_vector(&self.rotation, &scaled), &self.translation)
    }

    /// Normals only need the rotation since scaling is uniform
    pub fn normal(&self, n: &[f64; 3]) -> [f64; 3] {
        multiply_matrix_vector(&self.rotation, n)
    }
}

#[derive(Clone, Debug)]
pub struct SceneObject {
    pub name: String,
    pub mesh: Mesh,
    pub material: MaterialRef,
    pub transform: Transform,
}

/// One slot per page section; a slot may be empty while its asset loads
#[derive(Clone, Debug, Default)]
pub struct SectionRegistry {
    slots: Vec<Option<SceneObject>>,
}

impl SectionRegistry {
    pub fn with_sections(count: usize) -> Self {
        SectionRegistry {
            slots: vec![None; count],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Fills a slot, growing the registry if needed
    pub fn insert(&mut self, index: usize, object: SceneObject) {
        if index >= self.slots.len() {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = Some(object);
    }

    pub fn get(&self, index: usize) -> Option<&SceneObject> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut SceneObject> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    /// Every slot with its index, empty ones included
    pub fn slots_mut(&mut self) -> impl Iterator<Item = (usize, Option<&mut SceneObject>)> {
        self.slots
            .iter_mut()
            .enumerate()
            .map(|(i, slot)| (i, slot.as_mut()))
    }

    pub fn objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.slots.iter().flatten()
    }
}

#[derive(Clone, Debug)]
pub struct Particles {
    pub positions: Vec<[f64; 3]>,
}

impl Particles {
    /// Scatters points in a 10 x 10 column covering every section
    pub fn scatter(count: usize, sections: usize, rng: &mut impl Rng) -> Self {
        let positions = (0..count)
            .map(|_| {
                [
                    (rng.gen::<f64>() - 0.5) * 10.0,
                    SECTION_SPACING * 0.5 - rng.gen::<f64>() * SECTION_SPACING * sections as f64,
                    (rng.gen::<f64>() - 0.5) * 10.0,
                ]
            })
            .collect();
        Particles { positions }
    }
}

pub struct Scene {
    pub sky: Sky,
    pub lights: Lights,
    pub materials: Materials,
    pub registry: SectionRegistry,
    pub particles: Particles,
    pub rig: CameraRig,
    /// Present once the model has loaded
    pub mixer: Option<AnimationMixer>,
}

/// Per-breakpoint scale and (x, y) placement of a section object
fn layout(section: usize, viewport: &Viewport) -> (f64, [f64; 3]) {
    let base_y = -SECTION_SPACING * section as f64;
    if viewport.is_mobile {
        let (scale, nudge) = match section {
            0 => (0.03, -1.3),
            1 => (0.05, -1.4),
            _ => (0.15, 1.5),
        };
        (scale, [0.0, base_y + nudge, 0.0])
    } else {
        let scale = match section {
            0 => 0.08,
            1 => 0.1,
            _ => 0.4,
        };
        let x = if section == 0 { 2.0 } else { -2.0 };
        (scale, [x, base_y, 0.0])
    }
}

fn section_object(
    name: &str,
    section: usize,
    mesh: Mesh,
    material: MaterialRef,
    viewport: &Viewport,
) -> SceneObject {
    let (scale, position) = layout(section, viewport);
    SceneObject {
        name: name.to_string(),
        mesh,
        material,
        transform: Transform {
            position,
            rotation: [0.0; 3],
            scale,
        },
    }
}

impl Scene {
    /// Builds everything except the model, which arrives later
    pub fn assemble(viewport: &Viewport, settings: &SceneSettings) -> Self {
        let sky = Sky {
            turbidity: 2.0,
            rayleigh: 5.0,
            mie_coefficient: 0.4,
            mie_directional_g: 0.95,
            sun_position: [0.3, -0.038, -0.95],
        };

        let lights = Lights {
            directional: DirectionalLight {
                color: Color::WHITE,
                intensity: 1.0,
                position: [2.0, 2.0, 0.0],
            },
            ambient: AmbientLight {
                color: Color::WHITE,
                intensity: 1.0,
            },
        };

        let icon = |hex: &str| BasicMaterial {
            color: Color::from_hex(hex).unwrap_or(Color::WHITE),
            opacity: 1.0,
        };
        let materials = Materials {
            toon: ToonMaterial {
                color: settings.material_color,
                gradient_steps: 5,
            },
            glass: GlassMaterial {
                color: settings.material_color,
                ior: 3.1629,
                roughness: 0.0,
                metalness: 0.0,
                transmission: 1.0,
            },
            icons: vec![icon("#2b6cb0"), icon("#f6ad55"), icon("#e53e3e")],
            model: LambertMaterial {
                color: Color::from_hex("#d9772b").unwrap_or(Color::WHITE),
            },
            particles: PointsMaterial {
                color: settings.material_color,
                size: 0.1,
                size_attenuation: true,
                opacity: 1.0,
            },
        };

        let mut registry = SectionRegistry::with_sections(SECTION_COUNT);
        registry.insert(
            0,
            section_object("knot-glass", 0, torus_knot(12.0, 2.33, 37, 6, 5, 6), MaterialRef::Glass, viewport),
        );
        registry.insert(
            1,
            section_object("knot-toon", 1, torus_knot(7.62, 2.1, 28, 5, 6, 5), MaterialRef::Toon, viewport),
        );
        for (i, name) in ["sbt", "cami-app", "tprototype"].into_iter().enumerate() {
            let section = MODEL_SECTION + 1 + i;
            registry.insert(
                section,
                section_object(name, section, cuboid(3.0, 3.0, 3.0), MaterialRef::Icon(i), viewport),
            );
        }

        let mut rng = StdRng::seed_from_u64(settings.seed);
        let particles = Particles::scatter(PARTICLE_COUNT, registry.len(), &mut rng);

        let mut camera = PerspectiveCamera::new(35.0, viewport.aspect(), 0.1, 100.0);
        camera.position[2] = 6.0;

        log::info!(
            "scene assembled: {} of {} sections, {} particles, mobile={}",
            registry.objects().count(),
            registry.len(),
            particles.positions.len(),
            viewport.is_mobile
        );

        Scene {
            sky,
            lights,
            materials,
            registry,
            particles,
            rig: CameraRig::new(camera),
            mixer: None,
        }
    }

    /// Places a freshly loaded model into its section and starts its animation
    pub fn attach_model(&mut self, model: LoadedModel, viewport: &Viewport) {
        let scale = if viewport.is_mobile { 0.01 } else { 0.02 };
        let transform = Transform {
            position: [0.0, -SECTION_SPACING * 2.0 + 0.2, 0.0],
            rotation: [0.0, PI / 2.0, 0.0],
            scale,
        };
        if let Some(color) = model.base_color {
            self.materials.model.color = color;
        }
        self.mixer = AnimationMixer::play(model.clips, 1);
        log::info!(
            "model attached to section {}: {} triangles, animated={}",
            MODEL_SECTION,
            model.mesh.triangle_count(),
            self.mixer.is_some()
        );
        self.registry.insert(
            MODEL_SECTION,
            SceneObject {
                name: model.name,
                mesh: model.mesh,
                material: MaterialRef::Model,
                transform,
            },
        );
    }

    /// Model-space root motion of an object this frame
    pub fn animation_offset(&self, section: usize) -> [f64; 3] {
        match &self.mixer {
            Some(mixer) if section == MODEL_SECTION => mixer.root_offset(),
            _ => [0.0; 3],
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::tests::sample_model;

    fn object(name: &str) -> SceneObject {
        SceneObject {
            name: name.to_string(),
            mesh: cuboid(1.0, 1.0, 1.0),
            material: MaterialRef::Toon,
            transform: Transform::default(),
        }
    }

    /// Registry of `len` cubes with slot `gap` left empty
    pub(crate) fn registry_with_gap(len: usize, gap: usize) -> SectionRegistry {
        let mut registry = SectionRegistry::with_sections(len);
        for i in (0..len).filter(|&i| i != gap) {
            registry.insert(i, object(&format!("cube-{i}")));
        }
        registry
    }

    fn assert_close(a: [f64; 3], b: [f64; 3]) {
        assert!(a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9), "{a:?} != {b:?}");
    }

    fn settings() -> SceneSettings {
        SceneSettings {
            material_color: Color::WHITE,
            seed: 7,
        }
    }

    #[test]
    fn registry_lookups_skip_gaps_and_out_of_range() {
        let registry = registry_with_gap(5, 2);
        assert!(registry.get(1).is_some());
        assert!(registry.get(2).is_none());
        assert!(registry.get(99).is_none());
        assert_eq!(registry.objects().count(), 4);
    }

    #[test]
    fn desktop_layout() {
        let viewport = Viewport::new(1920.0, 1080.0, 1.0);
        let scene = Scene::assemble(&viewport, &settings());
        assert_eq!(scene.registry.len(), SECTION_COUNT);
        assert!(scene.registry.get(MODEL_SECTION).is_none());

        let glass = scene.registry.get(0).unwrap();
        assert_eq!(glass.material, MaterialRef::Glass);
        assert_eq!(glass.transform.position, [2.0, 0.0, 0.0]);
        assert_eq!(glass.transform.scale, 0.08);

        let last = scene.registry.get(5).unwrap();
        assert_eq!(last.transform.position, [-2.0, -20.0, 0.0]);
        assert_eq!(last.transform.scale, 0.4);
        assert_eq!(scene.rig.world_position(), [0.0, 0.0, 6.0]);
    }

    #[test]
    fn mobile_layout() {
        let viewport = Viewport::new(600.0, 900.0, 1.0);
        let scene = Scene::assemble(&viewport, &settings());
        let toon = scene.registry.get(1).unwrap();
        assert_eq!(toon.transform.scale, 0.05);
        assert_close(toon.transform.position, [0.0, -5.4, 0.0]);
        let box3 = scene.registry.get(3).unwrap();
        assert_eq!(box3.transform.position, [0.0, -10.5, 0.0]);
    }

    #[test]
    fn particles_fill_the_page_column() {
        let viewport = Viewport::new(1920.0, 1080.0, 1.0);
        let scene = Scene::assemble(&viewport, &settings());
        assert_eq!(scene.particles.positions.len(), PARTICLE_COUNT);
        for p in &scene.particles.positions {
            assert!(p[0].abs() <= 5.0 && p[2].abs() <= 5.0);
            assert!(p[1] <= 2.0 && p[1] >= 2.0 - 24.0);
        }
        // Same seed, same field
        let again = Scene::assemble(&viewport, &settings());
        assert_eq!(again.particles.positions, scene.particles.positions);
    }

    #[test]
    fn attaching_model_fills_its_slot() {
        let viewport = Viewport::new(1920.0, 1080.0, 1.0);
        let mut scene = Scene::assemble(&viewport, &settings());
        scene.attach_model(sample_model(), &viewport);

        let fox = scene.registry.get(MODEL_SECTION).unwrap();
        assert_eq!(fox.material, MaterialRef::Model);
        assert_eq!(fox.transform.scale, 0.02);
        assert_close(fox.transform.position, [0.0, -7.8, 0.0]);
        assert!(scene.mixer.is_some());
    }

    #[test]
    fn world_transform_scales_then_rotates_then_translates() {
        let transform = Transform {
            position: [1.0, 0.0, 0.0],
            rotation: [0.0, PI / 2.0, 0.0],
            scale: 2.0,
        };
        let p = transform.world(&[0.0; 3]).point(&[1.0, 0.0, 0.0]);
        assert!((p[0] - 1.0).abs() < 1e-9);
        assert!((p[2] + 2.0).abs() < 1e-9);
    }
}
