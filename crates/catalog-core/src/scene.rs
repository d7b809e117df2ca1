//! Arena scene graph.
//!
//! Nodes live in a `SlotMap` keyed by [`NodeId`]; stale ids simply stop
//! resolving once a subtree is removed. Mesh instances carry a [`MeshId`] that
//! the renderer uses as its GPU-buffer cache key; removing a node queues its
//! mesh ids so the renderer can free the buffers on its next pass.

use crate::bounds::Aabb;
use crate::model::{MeshData, ModelData};
use glam::{Mat4, Quat, Vec3};
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::rc::Rc;

new_key_type! {
    pub struct NodeId;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u64);

#[derive(Clone, Debug)]
pub struct MeshInstance {
    pub id: MeshId,
    pub data: Rc<MeshData>,
}

#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: SmallVec<[NodeId; 4]>,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub meshes: SmallVec<[MeshInstance; 1]>,
    pub visible: bool,
}

impl Node {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parent: None,
            children: SmallVec::new(),
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            meshes: SmallVec::new(),
            visible: true,
        }
    }

    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Result of instantiating a model: the group node plus a map from model node
/// index to scene node (used to bind animation channels).
#[derive(Clone, Debug)]
pub struct Instance {
    pub root: NodeId,
    pub nodes: Vec<NodeId>,
}

/// One mesh to draw this frame.
#[derive(Clone, Debug)]
pub struct DrawItem {
    pub mesh: MeshId,
    pub data: Rc<MeshData>,
    pub world: Mat4,
}

pub struct Scene {
    nodes: SlotMap<NodeId, Node>,
    root: NodeId,
    next_mesh: u64,
    released: Vec<MeshId>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::named("scene"));
        Self {
            nodes,
            root,
            next_mesh: 0,
            released: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // the root is always present
        self.nodes.len() <= 1
    }

    fn next_mesh_id(&mut self) -> MeshId {
        self.next_mesh += 1;
        MeshId(self.next_mesh)
    }

    /// Add an empty node; a missing parent attaches to the scene root.
    pub fn add_node(&mut self, name: &str, parent: Option<NodeId>) -> NodeId {
        let parent = parent.filter(|p| self.contains(*p)).unwrap_or(self.root);
        let mut node = Node::named(name);
        node.parent = Some(parent);
        let id = self.nodes.insert(node);
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(id);
        }
        id
    }

    pub fn attach_mesh(&mut self, node: NodeId, data: Rc<MeshData>) -> Option<MeshId> {
        let id = self.next_mesh_id();
        let n = self.nodes.get_mut(node)?;
        n.meshes.push(MeshInstance { id, data });
        Some(id)
    }

    /// Instantiate `model` under a fresh group node named `name`.
    pub fn instantiate(&mut self, model: &ModelData, name: &str, parent: Option<NodeId>) -> Instance {
        let root = self.add_node(name, parent);
        let mut nodes = vec![root; model.nodes.len()];
        for &r in &model.roots {
            self.instantiate_node(model, r, root, &mut nodes);
        }
        Instance { root, nodes }
    }

    fn instantiate_node(&mut self, model: &ModelData, idx: usize, parent: NodeId, map: &mut [NodeId]) {
        let Some(src) = model.nodes.get(idx) else {
            return;
        };
        let id = self.add_node(&src.name, Some(parent));
        if let Some(n) = self.nodes.get_mut(id) {
            n.translation = src.translation;
            n.rotation = src.rotation;
            n.scale = src.scale;
        }
        for &mi in &src.meshes {
            if let Some(mesh) = model.meshes.get(mi) {
                self.attach_mesh(id, Rc::clone(mesh));
            }
        }
        if let Some(slot) = map.get_mut(idx) {
            *slot = id;
        }
        for &c in &src.children {
            self.instantiate_node(model, c, id, map);
        }
    }

    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut m = Mat4::IDENTITY;
        let mut cur = Some(id);
        while let Some(c) = cur {
            let Some(n) = self.nodes.get(c) else {
                break;
            };
            m = n.local_matrix() * m;
            cur = n.parent;
        }
        m
    }

    pub fn world_position(&self, id: NodeId) -> Vec3 {
        self.world_matrix(id).transform_point3(Vec3::ZERO)
    }

    /// Bind-pose bounds of the subtree in world space; `None` if it has no meshes.
    pub fn world_bounds(&self, id: NodeId) -> Option<Aabb> {
        let parent = self
            .nodes
            .get(id)?
            .parent
            .map(|p| self.world_matrix(p))
            .unwrap_or(Mat4::IDENTITY);
        let mut out = None;
        self.accumulate_bounds(id, parent, &mut out);
        out
    }

    fn accumulate_bounds(&self, id: NodeId, parent: Mat4, out: &mut Option<Aabb>) {
        let Some(n) = self.nodes.get(id) else {
            return;
        };
        let m = parent * n.local_matrix();
        for mesh in &n.meshes {
            let b = mesh.data.bounds.transformed(&m);
            if !b.is_finite() {
                continue;
            }
            *out = Some(match out {
                Some(acc) => acc.union(&b),
                None => b,
            });
        }
        for &c in &n.children {
            self.accumulate_bounds(c, m, out);
        }
    }

    /// Move a node so its origin lands at `world` regardless of its ancestors.
    pub fn set_world_translation(&mut self, id: NodeId, world: Vec3) {
        let parent_inv = self
            .nodes
            .get(id)
            .and_then(|n| n.parent)
            .map(|p| self.world_matrix(p).inverse())
            .unwrap_or(Mat4::IDENTITY);
        let local = parent_inv.transform_point3(world);
        if let Some(n) = self.nodes.get_mut(id) {
            if local.is_finite() {
                n.translation = local;
            }
        }
    }

    /// Depth-first search below `from` for a node whose name matches ignoring case.
    pub fn find_by_name_ci(&self, from: NodeId, name: &str) -> Option<NodeId> {
        let n = self.nodes.get(from)?;
        if n.name.eq_ignore_ascii_case(name) {
            return Some(from);
        }
        n.children.iter().find_map(|&c| self.find_by_name_ci(c, name))
    }

    /// Deep copy of a subtree. Mesh data is shared, mesh ids are fresh.
    pub fn clone_subtree(&mut self, id: NodeId, parent: Option<NodeId>) -> Option<NodeId> {
        let src = self.nodes.get(id)?.clone();
        let new_id = self.add_node(&src.name, parent);
        let meshes: SmallVec<[MeshInstance; 1]> = src
            .meshes
            .iter()
            .map(|m| MeshInstance {
                id: self.next_mesh_id(),
                data: Rc::clone(&m.data),
            })
            .collect();
        if let Some(n) = self.nodes.get_mut(new_id) {
            n.translation = src.translation;
            n.rotation = src.rotation;
            n.scale = src.scale;
            n.visible = src.visible;
            n.meshes = meshes;
        }
        for &c in &src.children {
            self.clone_subtree(c, Some(new_id));
        }
        Some(new_id)
    }

    /// Remove a subtree and queue its mesh ids for GPU release.
    pub fn remove_subtree(&mut self, id: NodeId) {
        if id == self.root {
            return;
        }
        if let Some(p) = self.nodes.get(id).and_then(|n| n.parent) {
            if let Some(pn) = self.nodes.get_mut(p) {
                pn.children.retain(|c| *c != id);
            }
        }
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if let Some(n) = self.nodes.remove(cur) {
                self.released.extend(n.meshes.iter().map(|m| m.id));
                stack.extend(n.children.iter().copied());
            }
        }
    }

    /// Insert an identity-transform wrapper between `id` and its parent.
    pub fn insert_parent(&mut self, id: NodeId, name: &str) -> Option<NodeId> {
        let parent = self.nodes.get(id)?.parent?;
        let mut wrapper = Node::named(name);
        wrapper.parent = Some(parent);
        wrapper.children.push(id);
        let wid = self.nodes.insert(wrapper);
        if let Some(pn) = self.nodes.get_mut(parent) {
            for c in pn.children.iter_mut() {
                if *c == id {
                    *c = wid;
                }
            }
        }
        if let Some(n) = self.nodes.get_mut(id) {
            n.parent = Some(wid);
        }
        Some(wid)
    }

    pub fn has_skinned_descendants(&self, id: NodeId) -> bool {
        let Some(n) = self.nodes.get(id) else {
            return false;
        };
        n.meshes.iter().any(|m| m.data.skinned)
            || n.children.iter().any(|&c| self.has_skinned_descendants(c))
    }

    /// Visible meshes with their world matrices, parents before children.
    pub fn collect_draws(&self) -> Vec<DrawItem> {
        let mut out = Vec::new();
        let mut stack = vec![(self.root, Mat4::IDENTITY)];
        while let Some((id, parent)) = stack.pop() {
            let Some(n) = self.nodes.get(id) else {
                continue;
            };
            if !n.visible {
                continue;
            }
            let world = parent * n.local_matrix();
            for m in &n.meshes {
                out.push(DrawItem {
                    mesh: m.id,
                    data: Rc::clone(&m.data),
                    world,
                });
            }
            for &c in n.children.iter().rev() {
                stack.push((c, world));
            }
        }
        out
    }

    /// Mesh ids freed since the last call.
    pub fn drain_released(&mut self) -> Vec<MeshId> {
        std::mem::take(&mut self.released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::primitives::box_mesh;

    #[test]
    fn world_translation_respects_parent_scale() {
        let mut s = Scene::new();
        let p = s.add_node("p", None);
        s.node_mut(p).unwrap().scale = Vec3::splat(2.0);
        s.node_mut(p).unwrap().translation = Vec3::new(1.0, 0.0, 0.0);
        let c = s.add_node("c", Some(p));
        s.set_world_translation(c, Vec3::new(5.0, 2.0, 0.0));
        assert!((s.world_position(c) - Vec3::new(5.0, 2.0, 0.0)).length() < 1e-5);
        assert_eq!(s.node(c).unwrap().translation, Vec3::new(2.0, 1.0, 0.0));
    }

    #[test]
    fn clone_gets_fresh_mesh_ids_and_remove_releases_them() {
        let mut s = Scene::new();
        let a = s.add_node("Shelf", None);
        let original = s.attach_mesh(a, Rc::new(box_mesh("shelf", Vec3::ONE, [1.0; 4]))).unwrap();
        let b = s.clone_subtree(a, None).unwrap();
        let cloned = s.node(b).unwrap().meshes[0].id;
        assert_ne!(original, cloned);
        s.remove_subtree(b);
        assert_eq!(s.drain_released(), vec![cloned]);
        assert!(s.drain_released().is_empty());
        assert_eq!(s.find_by_name_ci(s.root(), "SHELF"), Some(a));
    }

    #[test]
    fn wrapper_keeps_world_transform() {
        let mut s = Scene::new();
        let c = s.add_node("character", None);
        s.node_mut(c).unwrap().translation = Vec3::new(0.0, 1.0, 0.0);
        let before = s.world_position(c);
        let w = s.insert_parent(c, "character-wrapper").unwrap();
        assert_eq!(s.node(c).unwrap().parent, Some(w));
        assert_eq!(s.world_position(c), before);
        assert!(s.node(s.root()).unwrap().children.contains(&w));
    }
}
