//! Decoded 3D models.
//!
//! A [`ModelData`] is an immutable template: named node hierarchy, triangle
//! meshes with bind-pose bounds, and animation clips. Instances are created in
//! a [`crate::scene::Scene`]; CPU-side mesh data is shared between instances.

use crate::animation::{AnimationClip, Channel, ChannelValues, Interpolation};
use crate::bounds::Aabb;
use crate::error::{CatalogError, Result};
use glam::{Quat, Vec3};
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureData {
    /// Decode a PNG/JPEG file into RGBA8.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)?.to_rgba8();
        Ok(Self {
            width: img.width(),
            height: img.height(),
            rgba: img.into_raw(),
        })
    }

    fn from_gltf(data: &gltf::image::Data) -> Result<Self> {
        use gltf::image::Format;
        let px = data.width as usize * data.height as usize;
        let rgba = match data.format {
            Format::R8G8B8A8 => data.pixels.clone(),
            Format::R8G8B8 => {
                let mut out = Vec::with_capacity(px * 4);
                for c in data.pixels.chunks_exact(3) {
                    out.extend_from_slice(&[c[0], c[1], c[2], 255]);
                }
                out
            }
            Format::R8 => {
                let mut out = Vec::with_capacity(px * 4);
                for &v in &data.pixels {
                    out.extend_from_slice(&[v, v, v, 255]);
                }
                out
            }
            other => return Err(CatalogError::UnsupportedTexture(other)),
        };
        Ok(Self {
            width: data.width,
            height: data.height,
            rgba,
        })
    }
}

#[derive(Clone, Debug)]
pub struct MaterialData {
    pub name: String,
    pub base_color: [f32; 4],
    pub base_color_texture: Option<Rc<TextureData>>,
    pub metallic: f32,
    pub roughness: f32,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color: [0.8, 0.8, 0.8, 1.0],
            base_color_texture: None,
            metallic: 0.0,
            roughness: 1.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MeshData {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    pub material: MaterialData,
    /// Bind-pose bounds in mesh space; skinning deformation is ignored.
    pub bounds: Aabb,
    pub skinned: bool,
}

#[derive(Clone, Debug)]
pub struct ModelNode {
    pub name: String,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub meshes: Vec<usize>,
    pub children: Vec<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct ModelData {
    pub nodes: Vec<ModelNode>,
    pub roots: Vec<usize>,
    pub meshes: Vec<Rc<MeshData>>,
    pub animations: Vec<AnimationClip>,
}

impl ModelData {
    /// Decode a binary glTF (or self-contained .gltf) document.
    pub fn from_glb(bytes: &[u8]) -> Result<Self> {
        let (doc, buffers, images) = gltf::import_slice(bytes)?;

        let textures: Vec<Option<Rc<TextureData>>> = images
            .iter()
            .map(|img| match TextureData::from_gltf(img) {
                Ok(t) => Some(Rc::new(t)),
                Err(e) => {
                    log::warn!("[model] skipping texture: {}", e);
                    None
                }
            })
            .collect();

        let mut model = ModelData::default();
        // gltf mesh index -> model mesh indices (one per triangle primitive)
        let mut mesh_map: Vec<Vec<usize>> = Vec::new();
        for mesh in doc.meshes() {
            let mut prims = Vec::new();
            for primitive in mesh.primitives() {
                if let Some(m) = load_primitive(&mesh, &primitive, &buffers, &textures) {
                    prims.push(model.meshes.len());
                    model.meshes.push(Rc::new(m));
                }
            }
            mesh_map.push(prims);
        }

        let scene = doc
            .default_scene()
            .or_else(|| doc.scenes().next())
            .ok_or(CatalogError::EmptyScene)?;

        // gltf node index -> model node index
        let mut node_map = vec![None; doc.nodes().len()];
        for node in scene.nodes() {
            let idx = load_node(&node, &mesh_map, &mut model.nodes, &mut node_map);
            model.roots.push(idx);
        }
        if model.roots.is_empty() {
            return Err(CatalogError::EmptyScene);
        }

        for animation in doc.animations() {
            if let Some(clip) = load_animation(&animation, &buffers, &node_map) {
                model.animations.push(clip);
            }
        }

        Ok(model)
    }

    /// Bind-pose bounds of the whole model in model space.
    pub fn bounds(&self) -> Option<Aabb> {
        let mut out: Option<Aabb> = None;
        for &root in &self.roots {
            self.accumulate_bounds(root, glam::Mat4::IDENTITY, &mut out);
        }
        out
    }

    fn accumulate_bounds(&self, idx: usize, parent: glam::Mat4, out: &mut Option<Aabb>) {
        let Some(node) = self.nodes.get(idx) else {
            return;
        };
        let m = parent
            * glam::Mat4::from_scale_rotation_translation(node.scale, node.rotation, node.translation);
        for &mi in &node.meshes {
            if let Some(mesh) = self.meshes.get(mi) {
                let b = mesh.bounds.transformed(&m);
                *out = Some(match out {
                    Some(acc) => acc.union(&b),
                    None => b,
                });
            }
        }
        for &c in &node.children {
            self.accumulate_bounds(c, m, out);
        }
    }
}

fn load_node(
    node: &gltf::Node,
    mesh_map: &[Vec<usize>],
    nodes: &mut Vec<ModelNode>,
    node_map: &mut [Option<usize>],
) -> usize {
    let (t, r, s) = node.transform().decomposed();
    let idx = nodes.len();
    nodes.push(ModelNode {
        name: node.name().unwrap_or_default().to_string(),
        translation: Vec3::from(t),
        rotation: Quat::from_array(r),
        scale: Vec3::from(s),
        meshes: node
            .mesh()
            .and_then(|m| mesh_map.get(m.index()).cloned())
            .unwrap_or_default(),
        children: Vec::new(),
    });
    if let Some(slot) = node_map.get_mut(node.index()) {
        *slot = Some(idx);
    }
    let children: Vec<usize> = node
        .children()
        .map(|c| load_node(&c, mesh_map, nodes, node_map))
        .collect();
    nodes[idx].children = children;
    idx
}

fn load_primitive(
    mesh: &gltf::Mesh,
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
    textures: &[Option<Rc<TextureData>>],
) -> Option<MeshData> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        return None;
    }
    let reader = primitive.reader(|b| buffers.get(b.index()).map(|d| d.0.as_slice()));
    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    if positions.is_empty() {
        return None;
    }
    let indices: Vec<u32> = reader
        .read_indices()
        .map(|it| it.into_u32().collect())
        .unwrap_or_else(|| (0..positions.len() as u32).collect());
    let normals: Vec<[f32; 3]> = match reader.read_normals() {
        Some(it) => it.collect(),
        None => compute_normals(&positions, &indices),
    };
    let uvs: Vec<[f32; 2]> = reader
        .read_tex_coords(0)
        .map(|it| it.into_f32().collect())
        .unwrap_or_else(|| vec![[0.0, 0.0]; positions.len()]);
    let skinned = reader.read_joints(0).is_some();

    let mat = primitive.material();
    let pbr = mat.pbr_metallic_roughness();
    let material = MaterialData {
        name: mat.name().unwrap_or_default().to_string(),
        base_color: pbr.base_color_factor(),
        base_color_texture: pbr
            .base_color_texture()
            .and_then(|info| textures.get(info.texture().source().index()).cloned().flatten()),
        metallic: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
    };

    let bounds = Aabb::from_points(positions.iter().map(|p| Vec3::from(*p)))?;
    Some(MeshData {
        name: mesh.name().unwrap_or_default().to_string(),
        positions,
        normals,
        uvs,
        indices,
        material,
        bounds,
        skinned,
    })
}

fn load_animation(
    animation: &gltf::Animation,
    buffers: &[gltf::buffer::Data],
    node_map: &[Option<usize>],
) -> Option<AnimationClip> {
    use gltf::animation::util::ReadOutputs;
    let mut channels = Vec::new();
    let mut duration: f32 = 0.0;
    for channel in animation.channels() {
        let Some(node) = node_map.get(channel.target().node().index()).copied().flatten() else {
            continue;
        };
        let reader = channel.reader(|b| buffers.get(b.index()).map(|d| d.0.as_slice()));
        let Some(inputs) = reader.read_inputs() else {
            continue;
        };
        let times: Vec<f32> = inputs.collect();
        let Some(outputs) = reader.read_outputs() else {
            continue;
        };
        let (interpolation, cubic) = match channel.sampler().interpolation() {
            gltf::animation::Interpolation::Step => (Interpolation::Step, false),
            gltf::animation::Interpolation::Linear => (Interpolation::Linear, false),
            gltf::animation::Interpolation::CubicSpline => (Interpolation::Linear, true),
        };
        let values = match outputs {
            ReadOutputs::Translations(it) => {
                ChannelValues::Translation(keyframe_values(it.map(Vec3::from).collect(), cubic))
            }
            ReadOutputs::Rotations(it) => ChannelValues::Rotation(keyframe_values(
                it.into_f32().map(Quat::from_array).collect(),
                cubic,
            )),
            ReadOutputs::Scales(it) => {
                ChannelValues::Scale(keyframe_values(it.map(Vec3::from).collect(), cubic))
            }
            ReadOutputs::MorphTargetWeights(_) => continue,
        };
        if let Some(&last) = times.last() {
            duration = duration.max(last);
        }
        channels.push(Channel {
            node,
            times,
            values,
            interpolation,
        });
    }
    if channels.is_empty() {
        return None;
    }
    Some(AnimationClip {
        name: animation.name().unwrap_or_default().to_string(),
        duration,
        channels,
    })
}

/// Cubic-spline outputs store (in-tangent, value, out-tangent) per key; keep the value.
fn keyframe_values<T: Copy>(raw: Vec<T>, cubic: bool) -> Vec<T> {
    if cubic {
        raw.chunks_exact(3).map(|c| c[1]).collect()
    } else {
        raw
    }
}

fn compute_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut acc = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        let (pa, pb, pc) = (
            Vec3::from(positions[a]),
            Vec3::from(positions[b]),
            Vec3::from(positions[c]),
        );
        let n = (pb - pa).cross(pc - pa);
        acc[a] += n;
        acc[b] += n;
        acc[c] += n;
    }
    acc.into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Y).to_array())
        .collect()
}

/// Procedural models for placeholders and tests.
pub mod primitives {
    use super::*;

    /// Axis-aligned box mesh centred on the origin.
    pub fn box_mesh(name: &str, size: Vec3, color: [f32; 4]) -> MeshData {
        let h = size * 0.5;
        let faces: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::X, Vec3::Y, Vec3::Z),
            (Vec3::NEG_X, Vec3::Y, Vec3::NEG_Z),
            (Vec3::Y, Vec3::Z, Vec3::X),
            (Vec3::NEG_Y, Vec3::NEG_Z, Vec3::X),
            (Vec3::Z, Vec3::Y, Vec3::NEG_X),
            (Vec3::NEG_Z, Vec3::Y, Vec3::X),
        ];
        let mut positions = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut uvs = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (n, up, right) in faces {
            let base = positions.len() as u32;
            let c = n * h;
            let u = right * h;
            let v = up * h;
            for (p, uv) in [
                (c - u - v, [0.0, 1.0]),
                (c + u - v, [1.0, 1.0]),
                (c + u + v, [1.0, 0.0]),
                (c - u + v, [0.0, 0.0]),
            ] {
                positions.push(p.to_array());
                normals.push(n.to_array());
                uvs.push(uv);
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        MeshData {
            name: name.to_string(),
            positions,
            normals,
            uvs,
            indices,
            material: MaterialData {
                name: name.to_string(),
                base_color: color,
                ..MaterialData::default()
            },
            bounds: Aabb::new(-h, h),
            skinned: false,
        }
    }

    /// Incremental builder for named node hierarchies.
    #[derive(Default)]
    pub struct ModelBuilder {
        model: ModelData,
    }

    impl ModelBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a node under `parent` (or as a root) and return its index.
        pub fn node(
            &mut self,
            name: &str,
            parent: Option<usize>,
            translation: Vec3,
            mesh: Option<MeshData>,
        ) -> usize {
            let meshes = match mesh {
                Some(m) => {
                    self.model.meshes.push(Rc::new(m));
                    vec![self.model.meshes.len() - 1]
                }
                None => Vec::new(),
            };
            let idx = self.model.nodes.len();
            self.model.nodes.push(ModelNode {
                name: name.to_string(),
                translation,
                rotation: Quat::IDENTITY,
                scale: Vec3::ONE,
                meshes,
                children: Vec::new(),
            });
            match parent.and_then(|p| self.model.nodes.get_mut(p)) {
                Some(p) => p.children.push(idx),
                None => self.model.roots.push(idx),
            }
            idx
        }

        pub fn animation(&mut self, clip: AnimationClip) -> &mut Self {
            self.model.animations.push(clip);
            self
        }

        pub fn build(self) -> ModelData {
            self.model
        }
    }

    /// Single named box as a complete model.
    pub fn cuboid(name: &str, size: Vec3) -> ModelData {
        let mut b = ModelBuilder::new();
        b.node(name, None, Vec3::ZERO, Some(box_mesh(name, size, [0.8, 0.8, 0.8, 1.0])));
        b.build()
    }
}

#[cfg(test)]
mod tests {
    use super::primitives::*;
    use super::*;

    #[test]
    fn cuboid_bounds_match_size() {
        let m = cuboid("crate", Vec3::new(2.0, 1.0, 0.5));
        let b = m.bounds().unwrap();
        assert!((b.size() - Vec3::new(2.0, 1.0, 0.5)).length() < 1e-6);
        assert_eq!(m.meshes[0].indices.len(), 36);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(ModelData::from_glb(b"definitely not a glb").is_err());
    }

    #[test]
    fn missing_normals_are_generated() {
        let n = compute_normals(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], &[0, 1, 2]);
        assert_eq!(n[0], [0.0, 0.0, 1.0]);
    }
}
