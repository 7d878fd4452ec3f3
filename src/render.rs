//! Software renderer for the scene.
//!
//! The scene is rasterized at `pixel_ratio` times the output resolution,
//! box-filtered down, and handed to a [`Surface`] for display.

use std::io;

use crate::color::Color;
use crate::error::SceneError;
use crate::graphics::{draw_point, draw_triangle, Fragment, Framebuffer};
use crate::material::MaterialRef;
use crate::math::{normalize, scale, sub};
use crate::scene::{Scene, SceneObject};
use crate::vertex::Vertex;

/// Where finished frames go
pub trait Surface {
    /// Shows one frame plus the text lines of the debug overlay
    fn present(&mut self, frame: &Framebuffer, overlay: &[String]) -> io::Result<()>;
}

pub struct Renderer<S: Surface> {
    surface: S,
    /// Output resolution (one pixel per half terminal cell)
    output: Framebuffer,
    /// Supersampled working buffer
    framebuffer: Framebuffer,
    supersample: usize,
    sky_cache: Vec<Color>,
    sky_key: Option<(usize, usize, u64)>,
    frames_rendered: u64,
}

impl<S: Surface> Renderer<S> {
    pub fn new(surface: S) -> Self {
        Renderer {
            surface,
            output: Framebuffer::new(0, 0),
            framebuffer: Framebuffer::new(0, 0),
            supersample: 1,
            sky_cache: Vec::new(),
            sky_key: None,
            frames_rendered: 0,
        }
    }

    /// Resizes the render surface; `pixel_ratio` is already capped
    pub fn set_size(&mut self, width: usize, height: usize, pixel_ratio: f64) {
        self.supersample = (pixel_ratio.round() as usize).max(1);
        self.output.resize(width, height);
        self.framebuffer
            .resize(width * self.supersample, height * self.supersample);
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Draws the whole scene and presents it
    pub fn render(&mut self, scene: &Scene, overlay: &[String]) -> Result<(), SceneError> {
        let (width, height) = (self.framebuffer.width(), self.framebuffer.height());
        if width == 0 || height == 0 {
            return Err(SceneError::EmptySurface { width, height });
        }

        self.refresh_sky(scene);
        self.framebuffer.clear_with(&self.sky_cache);

        let eye = scene.rig.world_position();

        // Opaque objects first, then glass over whatever they left behind
        let (opaque, transparent): (Vec<_>, Vec<_>) = (0..scene.registry.len())
            .filter_map(|index| scene.registry.get(index).map(|object| (index, object)))
            .partition(|(_, object)| !object.material.is_transparent());
        for (index, object) in opaque.into_iter().chain(transparent) {
            let offset = scene.animation_offset(index);
            self.draw_object(scene, object, &eye, &offset);
        }

        self.draw_particles(scene, &eye);

        self.output
            .downsample_from(&self.framebuffer, self.supersample);
        self.surface.present(&self.output, overlay)?;
        self.frames_rendered += 1;
        Ok(())
    }

    /// Sky only depends on the projection, so it is cached per size and aspect
    fn refresh_sky(&mut self, scene: &Scene) {
        let (width, height) = (self.framebuffer.width(), self.framebuffer.height());
        let camera = &scene.rig.camera;
        let key = (width, height, camera.aspect.to_bits() ^ camera.fov.to_bits());
        if self.sky_key == Some(key) {
            return;
        }
        let directions = (0..height).flat_map(|y| {
            (0..width).map(move |x| {
                let ndc = [
                    (x as f64 + 0.5) / width as f64 * 2.0 - 1.0,
                    1.0 - (y as f64 + 0.5) / height as f64 * 2.0,
                ];
                camera.ray_direction(ndc)
            })
        });
        scene.sky.fill(directions, &mut self.sky_cache);
        self.sky_key = Some(key);
        log::debug!("sky background rebuilt at {width}x{height}");
    }

    fn to_screen(&self, ndc: [f64; 2]) -> [f64; 2] {
        [
            (ndc[0] + 1.0) / 2.0 * self.framebuffer.width() as f64,
            (1.0 - ndc[1]) / 2.0 * self.framebuffer.height() as f64,
        ]
    }

    fn draw_object(&mut self, scene: &Scene, object: &SceneObject, eye: &[f64; 3], offset: &[f64; 3]) {
        let camera = &scene.rig.camera;
        let world = object.transform.world(offset);

        // Transform and project vertices; points outside the depth range stay None
        let vertices: Vec<Option<Vertex>> = object
            .mesh
            .positions
            .iter()
            .zip(&object.mesh.normals)
            .map(|(position, normal)| {
                let view = sub(&world.point(position), eye);
                let ndc = camera.project(&view)?;
                Some(Vertex {
                    position: view,
                    screen_position: self.to_screen(ndc),
                    normal: normalize(&world.normal(normal)),
                    depth: -view[2],
                })
            })
            .collect();

        let lights = &scene.lights;
        let materials = &scene.materials;
        let material = object.material;
        let shade = |fragment: &Fragment, behind: Color| -> Color {
            match material {
                MaterialRef::Toon => materials.toon.shade(&fragment.normal, lights),
                MaterialRef::Glass => {
                    let to_eye = normalize(&scale(&fragment.position, -1.0));
                    materials
                        .glass
                        .shade(&fragment.normal, &to_eye, behind, lights)
                }
                MaterialRef::Icon(i) => materials
                    .icons
                    .get(i)
                    .map_or(Color::WHITE, |icon| icon.shade().lerp(&behind, 1.0 - icon.opacity)),
                MaterialRef::Model => materials.model.shade(&fragment.normal, lights),
            }
        };

        let write_depth = !material.is_transparent();
        for &[a, b, c] in &object.mesh.triangles {
            if let (Some(Some(v0)), Some(Some(v1)), Some(Some(v2))) =
                (vertices.get(a), vertices.get(b), vertices.get(c))
            {
                draw_triangle(v0, v1, v2, &mut self.framebuffer, write_depth, &shade);
            }
        }
    }

    fn draw_particles(&mut self, scene: &Scene, eye: &[f64; 3]) {
        let camera = &scene.rig.camera;
        let material = &scene.materials.particles;
        let height = self.framebuffer.height() as f64;
        let color = material.color.scale(material.opacity);

        for position in &scene.particles.positions {
            let view = sub(position, eye);
            let Some(ndc) = camera.project(&view) else {
                continue;
            };
            let depth = -view[2];
            let size_px = if material.size_attenuation {
                material.size * camera.pixels_per_unit(depth, height)
            } else {
                material.size
            };
            draw_point(self.to_screen(ndc), depth, size_px / 2.0, color, &mut self.framebuffer);
        }
    }
}

#[cfg(test)]
impl<S: Surface> Renderer<S> {
    pub(crate) fn output_size(&self) -> (usize, usize) {
        (self.output.width(), self.output.height())
    }

    pub(crate) fn supersample(&self) -> usize {
        self.supersample
    }

    pub(crate) fn surface(&self) -> &S {
        &self.surface
    }

    pub(crate) fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub(crate) fn output(&self) -> &Framebuffer {
        &self.output
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::SceneSettings;
    use crate::state::Viewport;

    /// Keeps presented frames in memory
    #[derive(Default)]
    pub(crate) struct RecordingSurface {
        pub(crate) presented: usize,
        pub(crate) last_overlay: Vec<String>,
        pub(crate) last_frame: Option<Framebuffer>,
        /// Number of upcoming presents that fail
        pub(crate) fail_next: usize,
    }

    impl Surface for RecordingSurface {
        fn present(&mut self, frame: &Framebuffer, overlay: &[String]) -> io::Result<()> {
            if self.fail_next > 0 {
                self.fail_next -= 1;
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "surface gone"));
            }
            self.presented += 1;
            self.last_overlay = overlay.to_vec();
            self.last_frame = Some(frame.clone());
            Ok(())
        }
    }

    fn scene() -> Scene {
        Scene::assemble(
            &Viewport::new(640.0, 640.0, 1.0),
            &SceneSettings {
                material_color: Color::WHITE,
                seed: 3,
            },
        )
    }

    #[test]
    fn render_presents_one_frame() {
        let scene = scene();
        let mut renderer = Renderer::new(RecordingSurface::default());
        renderer.set_size(40, 40, 1.0);
        renderer.render(&scene, &["hello".to_string()]).unwrap();

        let surface = renderer.surface();
        assert_eq!(surface.presented, 1);
        assert_eq!(surface.last_overlay, vec!["hello".to_string()]);
        let frame = surface.last_frame.as_ref().unwrap();
        assert_eq!((frame.width(), frame.height()), (40, 40));
        assert_eq!(renderer.frames_rendered(), 1);
    }

    #[test]
    fn objects_are_drawn_over_the_sky() {
        let mut scene = scene();
        let mut renderer = Renderer::new(RecordingSurface::default());
        renderer.set_size(32, 32, 1.0);
        renderer.render(&scene, &[]).unwrap();
        let with_objects = renderer.output().pixels().to_vec();

        scene.registry = crate::scene::SectionRegistry::with_sections(6);
        scene.particles.positions.clear();
        renderer.render(&scene, &[]).unwrap();
        let sky_only = renderer.output().pixels().to_vec();

        assert_ne!(with_objects, sky_only);
    }

    #[test]
    fn supersampling_keeps_output_size() {
        let mut renderer = Renderer::new(RecordingSurface::default());
        renderer.set_size(20, 10, 2.0);
        assert_eq!(renderer.output_size(), (20, 10));
        assert_eq!(renderer.supersample(), 2);
        renderer.render(&scene(), &[]).unwrap();

        renderer.set_size(20, 10, 0.5);
        assert_eq!(renderer.supersample(), 1);
        assert_eq!(renderer.output_size(), (20, 10));
    }

    #[test]
    fn zero_sized_surface_is_an_error() {
        let mut renderer = Renderer::new(RecordingSurface::default());
        assert!(matches!(
            renderer.render(&scene(), &[]),
            Err(SceneError::EmptySurface { .. })
        ));
    }
}
