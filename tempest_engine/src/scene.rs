//! Boundary to the host scene graph.
//!
//! The pipeline only talks to the renderer through [`Scene`]. Hosts implement
//! it over their own entity system; [`RecordingScene`] keeps everything in
//! memory for headless runs and tests.

use std::collections::BTreeMap;

use glam::Vec3;
use serde::Serialize;

use crate::palette::Rgb;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EntityHandle(pub u64);

/// Prefabs the pipeline asks the host to instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefabKind {
    /// Parent node of one visualization group.
    GroupRoot,
    /// Container for one pooled point; owns the representations below.
    PointRoot,
    Ellipsoid,
    Cloud,
    NumericLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Particle {
    pub offset: Vec3,
    pub color: Rgb,
    pub size: f32,
}

pub trait Scene {
    fn spawn(&mut self, prefab: PrefabKind) -> EntityHandle;
    fn destroy(&mut self, handle: EntityHandle);
    fn set_active(&mut self, handle: EntityHandle, active: bool);
    fn set_parent(&mut self, child: EntityHandle, parent: EntityHandle);
    fn set_local_position(&mut self, handle: EntityHandle, position: Vec3);
    fn set_local_scale(&mut self, handle: EntityHandle, scale: Vec3);
    fn set_material_color(&mut self, handle: EntityHandle, color: Rgb);
    fn emit_particles(&mut self, handle: EntityHandle, particles: &[Particle]);
    fn set_label_text(&mut self, handle: EntityHandle, text: &str);
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneNode {
    pub prefab: PrefabKind,
    pub parent: Option<EntityHandle>,
    pub active: bool,
    pub position: Vec3,
    pub scale: Vec3,
    pub color: Option<Rgb>,
    pub label: Option<String>,
    /// Particles emitted by the most recent `emit_particles` call.
    pub particles: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SceneCounters {
    pub spawned: usize,
    pub destroyed: usize,
    pub activations: usize,
    pub particles_emitted: usize,
}

/// Serialisable view of a [`RecordingScene`].
#[derive(Debug, Clone, Serialize)]
pub struct SceneSnapshot {
    pub counters: SceneCounters,
    /// Visible representations per prefab.
    pub visible: BTreeMap<String, usize>,
    pub nodes: BTreeMap<u64, SceneNode>,
}

/// In-memory scene used for headless playback.
#[derive(Debug, Default)]
pub struct RecordingScene {
    nodes: BTreeMap<EntityHandle, SceneNode>,
    next_handle: u64,
    counters: SceneCounters,
}

impl RecordingScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, handle: EntityHandle) -> Option<&SceneNode> {
        self.nodes.get(&handle)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (EntityHandle, &SceneNode)> {
        self.nodes.iter().map(|(handle, node)| (*handle, node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn counters(&self) -> SceneCounters {
        self.counters
    }

    /// True when the node and every ancestor are active.
    pub fn is_active_in_hierarchy(&self, handle: EntityHandle) -> bool {
        let mut current = Some(handle);
        while let Some(handle) = current {
            match self.nodes.get(&handle) {
                Some(node) if node.active => current = node.parent,
                _ => return false,
            }
        }
        true
    }

    /// Nodes of `prefab` that are visible in the hierarchy.
    pub fn visible(&self, prefab: PrefabKind) -> Vec<EntityHandle> {
        self.nodes
            .iter()
            .filter(|(handle, node)| node.prefab == prefab && self.is_active_in_hierarchy(**handle))
            .map(|(handle, _)| *handle)
            .collect()
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        let mut visible = BTreeMap::new();
        for (handle, node) in &self.nodes {
            if self.is_active_in_hierarchy(*handle) {
                *visible.entry(format!("{:?}", node.prefab)).or_insert(0) += 1;
            }
        }
        SceneSnapshot {
            counters: self.counters,
            visible,
            nodes: self
                .nodes
                .iter()
                .map(|(handle, node)| (handle.0, node.clone()))
                .collect(),
        }
    }

    fn node_mut(&mut self, handle: EntityHandle) -> Option<&mut SceneNode> {
        let node = self.nodes.get_mut(&handle);
        if node.is_none() {
            log::warn!("scene call on unknown entity {}", handle.0);
        }
        node
    }
}

impl Scene for RecordingScene {
    fn spawn(&mut self, prefab: PrefabKind) -> EntityHandle {
        let handle = EntityHandle(self.next_handle);
        self.next_handle += 1;
        self.counters.spawned += 1;
        self.nodes.insert(
            handle,
            SceneNode {
                prefab,
                parent: None,
                active: false,
                position: Vec3::ZERO,
                scale: Vec3::ONE,
                color: None,
                label: None,
                particles: 0,
            },
        );
        handle
    }

    fn destroy(&mut self, handle: EntityHandle) {
        if self.nodes.remove(&handle).is_some() {
            self.counters.destroyed += 1;
        }
    }

    fn set_active(&mut self, handle: EntityHandle, active: bool) {
        let mut activated = false;
        if let Some(node) = self.node_mut(handle) {
            activated = active && !node.active;
            node.active = active;
        }
        if activated {
            self.counters.activations += 1;
        }
    }

    fn set_parent(&mut self, child: EntityHandle, parent: EntityHandle) {
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
    }

    fn set_local_position(&mut self, handle: EntityHandle, position: Vec3) {
        if let Some(node) = self.node_mut(handle) {
            node.position = position;
        }
    }

    fn set_local_scale(&mut self, handle: EntityHandle, scale: Vec3) {
        if let Some(node) = self.node_mut(handle) {
            node.scale = scale;
        }
    }

    fn set_material_color(&mut self, handle: EntityHandle, color: Rgb) {
        if let Some(node) = self.node_mut(handle) {
            node.color = Some(color);
        }
    }

    fn emit_particles(&mut self, handle: EntityHandle, particles: &[Particle]) {
        let mut emitted = 0;
        if let Some(node) = self.node_mut(handle) {
            node.particles = particles.len();
            node.color = particles.first().map(|p| p.color).or(node.color);
            emitted = particles.len();
        }
        self.counters.particles_emitted += emitted;
    }

    fn set_label_text(&mut self, handle: EntityHandle, text: &str) {
        if let Some(node) = self.node_mut(handle) {
            node.label = Some(text.to_string());
        }
    }
}
