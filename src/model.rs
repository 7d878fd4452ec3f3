//! glTF model loading and playback.
//!
//! Loading runs on a background thread so the frame loop keeps ticking; the
//! result is picked up with [`ModelLoader::poll`]. The mesh is flattened into
//! a single bind-pose triangle list. Playback follows the translation channel
//! of the skeleton root, which moves the whole mesh with the clip.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use thiserror::Error;

use crate::color::Color;
use crate::geometry::Mesh;
use crate::math::{calculate_normal, normalize};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to load glTF file: {0}")]
    Load(#[from] gltf::Error),

    #[error("missing position data for mesh: {0}")]
    MissingPositions(String),

    #[error("model {0} contains no triangles")]
    Empty(String),
}

/// Keyframed translation of a single node
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f64,
    /// (time, translation) pairs sorted by time
    pub root_translation: Vec<(f64, [f64; 3])>,
}

impl AnimationClip {
    /// Linearly interpolated translation at `time`, clamped to the keyframes
    pub fn sample(&self, time: f64) -> [f64; 3] {
        let keys = &self.root_translation;
        let (Some(first), Some(last)) = (keys.first(), keys.last()) else {
            return [0.0; 3];
        };
        if time <= first.0 {
            return first.1;
        }
        if time >= last.0 {
            return last.1;
        }
        let next = keys.partition_point(|(t, _)| *t <= time);
        let (t0, a) = keys[next - 1];
        let (t1, b) = keys[next];
        let f = if t1 > t0 { (time - t0) / (t1 - t0) } else { 0.0 };
        [
            a[0] + (b[0] - a[0]) * f,
            a[1] + (b[1] - a[1]) * f,
            a[2] + (b[2] - a[2]) * f,
        ]
    }
}

/// Plays one clip on a loop
#[derive(Clone, Debug)]
pub struct AnimationMixer {
    clip: AnimationClip,
    time: f64,
}

impl AnimationMixer {
    /// Starts clip `preferred`, or the first clip if there are fewer
    pub fn play(mut clips: Vec<AnimationClip>, preferred: usize) -> Option<Self> {
        if clips.is_empty() {
            return None;
        }
        let index = if preferred < clips.len() { preferred } else { 0 };
        let clip = clips.swap_remove(index);
        log::debug!("playing clip {:?} ({:.2}s)", clip.name, clip.duration);
        Some(AnimationMixer { clip, time: 0.0 })
    }

    pub fn update(&mut self, delta: f64) {
        self.time += delta;
        if self.clip.duration > 0.0 {
            self.time = self.time.rem_euclid(self.clip.duration);
        }
    }

    #[cfg(test)]
    pub fn time(&self) -> f64 {
        self.time
    }

    #[cfg(test)]
    pub fn clip(&self) -> &AnimationClip {
        &self.clip
    }

    /// Displacement of the root relative to the start of the clip
    pub fn root_offset(&self) -> [f64; 3] {
        let now = self.clip.sample(self.time);
        let rest = self.clip.sample(0.0);
        [now[0] - rest[0], now[1] - rest[1], now[2] - rest[2]]
    }
}

#[derive(Clone, Debug)]
pub struct LoadedModel {
    pub name: String,
    pub mesh: Mesh,
    pub clips: Vec<AnimationClip>,
    /// Base colour factor when the material is untextured
    pub base_color: Option<Color>,
}

type Mat4 = [[f64; 4]; 4];

const IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Column-major 4x4 product
fn mat4_mul(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [[0.0; 4]; 4];
    for col in 0..4 {
        for row in 0..4 {
            out[col][row] = (0..4).map(|k| a[k][row] * b[col][k]).sum();
        }
    }
    out
}

fn transform_point(m: &Mat4, p: [f32; 3]) -> [f64; 3] {
    let p = [p[0] as f64, p[1] as f64, p[2] as f64];
    let mut out = [0.0; 3];
    for (row, value) in out.iter_mut().enumerate() {
        *value = m[0][row] * p[0] + m[1][row] * p[1] + m[2][row] * p[2] + m[3][row];
    }
    out
}

fn transform_normal(m: &Mat4, n: [f32; 3]) -> [f64; 3] {
    let n = [n[0] as f64, n[1] as f64, n[2] as f64];
    let mut out = [0.0; 3];
    for (row, value) in out.iter_mut().enumerate() {
        *value = m[0][row] * n[0] + m[1][row] * n[1] + m[2][row] * n[2];
    }
    normalize(&out)
}

fn node_matrix(node: &gltf::Node) -> Mat4 {
    node.transform()
        .matrix()
        .map(|col| col.map(|v| v as f64))
}

/// Load a glTF/GLB file and flatten it into one mesh
pub fn load_gltf_model(path: impl AsRef<Path>) -> Result<LoadedModel, ModelError> {
    let path = path.as_ref();
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());
    let (document, buffers, _images) = gltf::import(path)?;

    let mut mesh = Mesh::default();
    let mut base_color = None;
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next());

    if let Some(scene) = &scene {
        for node in scene.nodes() {
            process_node(&node, &IDENTITY, &buffers, &mut mesh, &mut base_color)?;
        }
    }

    if mesh.triangles.is_empty() {
        return Err(ModelError::Empty(name));
    }

    let root_node = root_motion_node(&document, scene.as_ref());
    let clips = document
        .animations()
        .map(|animation| read_clip(&animation, root_node, &buffers))
        .collect::<Vec<_>>();

    log::info!(
        "loaded glTF model {}: {} vertices, {} triangles, {} clips",
        name,
        mesh.positions.len(),
        mesh.triangle_count(),
        clips.len()
    );

    Ok(LoadedModel {
        name,
        mesh,
        clips,
        base_color,
    })
}

/// Process a glTF node and its children recursively.
fn process_node(
    node: &gltf::Node,
    parent: &Mat4,
    buffers: &[gltf::buffer::Data],
    mesh: &mut Mesh,
    base_color: &mut Option<Color>,
) -> Result<(), ModelError> {
    let world = mat4_mul(parent, &node_matrix(node));

    if let Some(node_mesh) = node.mesh() {
        // Skinned vertices are already in model space
        let placement = if node.skin().is_some() { IDENTITY } else { world };
        let mesh_name = node_mesh.name().unwrap_or("unnamed").to_string();

        for primitive in node_mesh.primitives() {
            if !matches!(primitive.mode(), gltf::mesh::Mode::Triangles) {
                log::debug!("skipping non-triangle primitive in {mesh_name}");
                continue;
            }
            mesh.extend(read_primitive(&primitive, &placement, buffers, &mesh_name)?);

            let pbr = primitive.material().pbr_metallic_roughness();
            if base_color.is_none() && pbr.base_color_texture().is_none() {
                let [r, g, b, _] = pbr.base_color_factor();
                *base_color = Some(Color::rgb(r as f64, g as f64, b as f64));
            }
        }
    }

    for child in node.children() {
        process_node(&child, &world, buffers, mesh, base_color)?;
    }

    Ok(())
}

fn read_primitive(
    primitive: &gltf::Primitive,
    placement: &Mat4,
    buffers: &[gltf::buffer::Data],
    mesh_name: &str,
) -> Result<Mesh, ModelError> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));

    let positions: Vec<[f64; 3]> = reader
        .read_positions()
        .ok_or_else(|| ModelError::MissingPositions(mesh_name.to_string()))?
        .map(|p| transform_point(placement, p))
        .collect();

    let indices: Vec<usize> = match reader.read_indices() {
        Some(indices) => indices.into_u32().map(|i| i as usize).collect(),
        None => (0..positions.len()).collect(),
    };
    let triangles: Vec<[usize; 3]> = indices
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .filter(|t| t.iter().all(|&i| i < positions.len()))
        .collect();

    let normals = match reader.read_normals() {
        Some(normals) => normals.map(|n| transform_normal(placement, n)).collect(),
        None => smooth_normals(&positions, &triangles),
    };

    Ok(Mesh {
        positions,
        normals,
        triangles,
    })
}

/// Averaged face normals for meshes that ship without vertex normals
fn smooth_normals(positions: &[[f64; 3]], triangles: &[[usize; 3]]) -> Vec<[f64; 3]> {
    let mut normals = vec![[0.0; 3]; positions.len()];
    for &[a, b, c] in triangles {
        let normal = calculate_normal(&positions[a], &positions[b], &positions[c]);
        for index in [a, b, c] {
            for axis in 0..3 {
                normals[index][axis] += normal[axis];
            }
        }
    }
    normals.iter().map(normalize).collect()
}

/// Skeleton root of the first skin, or the first scene root node
fn root_motion_node(document: &gltf::Document, scene: Option<&gltf::Scene>) -> Option<usize> {
    let from_skin = document
        .skins()
        .next()
        .and_then(|skin| skin.skeleton().or_else(|| skin.joints().next()))
        .map(|node| node.index());
    from_skin.or_else(|| scene.and_then(|s| s.nodes().next()).map(|node| node.index()))
}

fn read_clip(
    animation: &gltf::Animation,
    root_node: Option<usize>,
    buffers: &[gltf::buffer::Data],
) -> AnimationClip {
    let mut duration: f64 = 0.0;
    let mut root_translation = Vec::new();

    for channel in animation.channels() {
        let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
        let Some(inputs) = reader.read_inputs() else {
            continue;
        };
        let times: Vec<f64> = inputs.map(|t| t as f64).collect();
        if let Some(&end) = times.last() {
            duration = duration.max(end);
        }

        let target = channel.target();
        let is_root = Some(target.node().index()) == root_node;
        if !is_root || !matches!(target.property(), gltf::animation::Property::Translation) {
            continue;
        }
        if let Some(gltf::animation::util::ReadOutputs::Translations(outputs)) =
            reader.read_outputs()
        {
            root_translation = times
                .iter()
                .zip(outputs)
                .map(|(&t, v)| (t, [v[0] as f64, v[1] as f64, v[2] as f64]))
                .collect();
        }
    }

    AnimationClip {
        name: animation
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("clip-{}", animation.index())),
        duration,
        root_translation,
    }
}

/// Receives the model from a background loader thread
pub struct ModelLoader {
    receiver: Option<Receiver<Result<LoadedModel, ModelError>>>,
}

impl ModelLoader {
    pub fn spawn(path: PathBuf) -> Self {
        let (sender, receiver) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("model-loader".into())
            .spawn(move || {
                let result = load_gltf_model(&path);
                // The app may have quit already
                let _ = sender.send(result);
            });
        match spawned {
            Ok(_) => ModelLoader::from_receiver(receiver),
            Err(e) => {
                log::error!("could not start model loader: {e}");
                ModelLoader { receiver: None }
            }
        }
    }

    pub fn from_receiver(receiver: Receiver<Result<LoadedModel, ModelError>>) -> Self {
        ModelLoader {
            receiver: Some(receiver),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.receiver.is_some()
    }

    /// Returns the model once it has arrived; failures are logged and
    /// leave its section empty for good
    pub fn poll(&mut self) -> Option<LoadedModel> {
        let outcome = match self.receiver.as_ref()?.try_recv() {
            Err(TryRecvError::Empty) => return None,
            Ok(Ok(model)) => Some(model),
            Ok(Err(e)) => {
                log::error!("model failed to load: {e}");
                None
            }
            Err(TryRecvError::Disconnected) => {
                log::error!("model loader exited without a result");
                None
            }
        };
        self.receiver = None;
        outcome
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::geometry::cuboid;

    pub(crate) fn sample_clip() -> AnimationClip {
        AnimationClip {
            name: "Walk".to_string(),
            duration: 2.0,
            root_translation: vec![
                (0.0, [0.0, 10.0, 0.0]),
                (1.0, [0.0, 12.0, 4.0]),
                (2.0, [0.0, 10.0, 0.0]),
            ],
        }
    }

    pub(crate) fn sample_model() -> LoadedModel {
        LoadedModel {
            name: "Fox".to_string(),
            mesh: cuboid(10.0, 10.0, 10.0),
            clips: vec![
                AnimationClip {
                    name: "Survey".to_string(),
                    duration: 3.0,
                    root_translation: Vec::new(),
                },
                sample_clip(),
            ],
            base_color: None,
        }
    }

    #[test]
    fn clip_interpolates_between_keys() {
        let clip = sample_clip();
        assert_eq!(clip.sample(0.5), [0.0, 11.0, 2.0]);
        assert_eq!(clip.sample(-1.0), [0.0, 10.0, 0.0]);
        assert_eq!(clip.sample(5.0), [0.0, 10.0, 0.0]);
    }

    #[test]
    fn mixer_prefers_requested_clip_and_loops() {
        let mut mixer = AnimationMixer::play(sample_model().clips, 1).unwrap();
        assert_eq!(mixer.clip().name, "Walk");
        mixer.update(1.0);
        assert_eq!(mixer.root_offset(), [0.0, 2.0, 4.0]);
        mixer.update(1.5);
        assert!((mixer.time() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn mixer_falls_back_to_first_clip() {
        let mixer = AnimationMixer::play(vec![sample_clip()], 1).unwrap();
        assert_eq!(mixer.clip().name, "Walk");
        assert!(AnimationMixer::play(Vec::new(), 0).is_none());
    }

    #[test]
    fn loader_hands_over_model_once() {
        let (sender, receiver) = mpsc::channel();
        let mut loader = ModelLoader::from_receiver(receiver);
        assert!(loader.poll().is_none());
        assert!(loader.is_pending());

        sender.send(Ok(sample_model())).unwrap();
        assert_eq!(loader.poll().map(|m| m.name), Some("Fox".to_string()));
        assert!(!loader.is_pending());
        assert!(loader.poll().is_none());
    }

    #[test]
    fn loader_failure_is_terminal() {
        let (sender, receiver) = mpsc::channel();
        let mut loader = ModelLoader::from_receiver(receiver);
        sender
            .send(Err(ModelError::Empty("broken".to_string())))
            .unwrap();
        assert!(loader.poll().is_none());
        assert!(!loader.is_pending());
    }

    #[test]
    fn missing_file_reports_load_error() {
        let result = load_gltf_model("does/not/exist.gltf");
        assert!(matches!(result, Err(ModelError::Load(_))));
    }

    #[test]
    fn column_major_product_composes_translations() {
        let mut a = IDENTITY;
        a[3] = [1.0, 2.0, 3.0, 1.0];
        let mut b = IDENTITY;
        b[3] = [10.0, 0.0, 0.0, 1.0];
        let m = mat4_mul(&a, &b);
        assert_eq!(transform_point(&m, [0.0, 0.0, 0.0]), [11.0, 2.0, 3.0]);
    }
}
