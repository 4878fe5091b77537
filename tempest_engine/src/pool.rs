use std::collections::VecDeque;

use serde::Serialize;

use crate::point_cache::PointDataCache;
use crate::scene::{EntityHandle, PrefabKind, Scene};
use crate::visual::VisualKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EntityId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    Free,
    /// Handed out by `acquire`, no sample displayed yet.
    Acquired,
    Populated,
}

/// Which table cell a pooled point currently displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PointBinding {
    pub spatial: usize,
    pub data_file: usize,
    pub variable: Option<usize>,
}

#[derive(Debug)]
pub struct PooledVisual {
    root: EntityHandle,
    /// One slot per [`VisualKind`], indexed by `VisualKind::slot`.
    representations: [Option<EntityHandle>; 3],
    kind: VisualKind,
    state: EntityState,
    binding: Option<PointBinding>,
    cache: PointDataCache,
}

impl PooledVisual {
    pub fn root(&self) -> EntityHandle {
        self.root
    }

    pub fn kind(&self) -> VisualKind {
        self.kind
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    pub fn binding(&self) -> Option<PointBinding> {
        self.binding
    }

    pub fn representation(&self, kind: VisualKind) -> Option<EntityHandle> {
        self.representations[kind.slot()]
    }

    pub fn cache(&self) -> &PointDataCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut PointDataCache {
        &mut self.cache
    }

    /// Rebinds the entity. A different cell invalidates the cached series.
    pub fn bind(&mut self, binding: PointBinding) {
        if self.binding != Some(binding) {
            self.cache.clear();
        }
        self.binding = Some(binding);
    }

    pub fn mark_populated(&mut self) {
        if self.state == EntityState::Acquired {
            self.state = EntityState::Populated;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub capacity: usize,
    /// Entities created per warm-up step at most.
    pub batch_size: usize,
}

impl PoolConfig {
    pub const DEFAULT_BATCH: usize = 100;
    pub const DEFAULT_HEADROOM: f32 = 1.2;

    /// Sizes the pool for the busiest timestep plus headroom.
    pub fn for_load(max_points: usize, data_files: usize, headroom: f32) -> Self {
        let busiest = max_points * data_files;
        Self {
            capacity: (busiest as f32 * headroom.max(1.0)).ceil() as usize,
            batch_size: Self::DEFAULT_BATCH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

impl Progress {
    pub fn is_done(&self) -> bool {
        self.done >= self.total
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub created: usize,
    pub exhaustions: usize,
    pub acquires: usize,
    pub releases: usize,
    pub duplicate_releases: usize,
}

/// Reusable point entities for one visualization group.
#[derive(Debug)]
pub struct VisualPool {
    name: String,
    parent: Option<EntityHandle>,
    config: PoolConfig,
    entities: Vec<PooledVisual>,
    free: VecDeque<EntityId>,
    /// Created during the current warm-up step; enqueued on the next one.
    pending: Vec<EntityId>,
    ready: bool,
    stats: PoolStats,
}

impl VisualPool {
    pub fn new(name: impl Into<String>, config: PoolConfig) -> Self {
        Self {
            name: name.into(),
            parent: None,
            config,
            entities: Vec::with_capacity(config.capacity),
            free: VecDeque::with_capacity(config.capacity),
            pending: Vec::new(),
            ready: false,
            stats: PoolStats::default(),
        }
    }

    /// Entities created from now on are parented under `parent`.
    pub fn with_parent(mut self, parent: EntityHandle) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Every entity ever created, free or not.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    pub fn free_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.free.iter().copied()
    }

    pub fn get(&self, id: EntityId) -> Option<&PooledVisual> {
        self.entities.get(id.0)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut PooledVisual> {
        self.entities.get_mut(id.0)
    }

    pub fn state(&self, id: EntityId) -> Option<EntityState> {
        self.get(id).map(PooledVisual::state)
    }

    pub fn is_free(&self, id: EntityId) -> bool {
        self.state(id) == Some(EntityState::Free) && self.free.contains(&id)
    }

    pub fn progress(&self) -> Progress {
        let settled = self.entities.len() - self.pending.len();
        Progress {
            done: settled.min(self.config.capacity),
            total: self.config.capacity,
        }
    }

    /// Performs at most `max_work` entity creations. A batch only joins the
    /// free list on the following step, once the host has had a chance to
    /// initialise it.
    pub fn step_warmup<S: Scene>(&mut self, scene: &mut S, max_work: usize) -> Progress {
        if self.ready {
            return self.progress();
        }

        for id in self.pending.drain(..) {
            let root = self.entities[id.0].root;
            scene.set_active(root, false);
            self.free.push_back(id);
        }

        // Entities created on demand before warm-up finished count toward capacity.
        let remaining = self.config.capacity.saturating_sub(self.entities.len());
        let budget = remaining
            .min(max_work)
            .min(self.config.batch_size.max(1));
        for _ in 0..budget {
            let id = self.create(scene, true);
            let root = self.entities[id.0].root;
            scene.set_active(root, true);
            self.pending.push(id);
        }

        if self.pending.is_empty() && self.entities.len() >= self.config.capacity {
            self.ready = true;
            log::info!(
                "pool '{}' ready with {} entities",
                self.name,
                self.entities.len()
            );
        } else {
            log::debug!(
                "pool '{}' warm-up {}/{}",
                self.name,
                self.progress().done,
                self.config.capacity
            );
        }
        self.progress()
    }

    /// Runs warm-up to completion in one go.
    pub fn warm_up<S: Scene>(&mut self, scene: &mut S) -> Progress {
        let mut progress = self.step_warmup(scene, self.config.batch_size.max(1));
        while !self.ready {
            progress = self.step_warmup(scene, self.config.batch_size.max(1));
        }
        progress
    }

    pub fn acquire<S: Scene>(&mut self, scene: &mut S) -> EntityId {
        let id = match self.free.pop_front() {
            Some(id) => id,
            None => {
                self.stats.exhaustions += 1;
                log::warn!(
                    "pool '{}' exhausted at {} entities; creating another (consider more headroom)",
                    self.name,
                    self.entities.len()
                );
                self.create(scene, false)
            }
        };
        let entity = &mut self.entities[id.0];
        entity.state = EntityState::Acquired;
        scene.set_active(entity.root, true);
        self.stats.acquires += 1;
        id
    }

    /// Returns `id` to the free list. Releasing a free entity is a no-op and
    /// reports false.
    pub fn release<S: Scene>(&mut self, scene: &mut S, id: EntityId) -> bool {
        let Some(entity) = self.entities.get_mut(id.0) else {
            log::warn!("pool '{}' asked to release unknown entity {}", self.name, id.0);
            return false;
        };
        if entity.state == EntityState::Free {
            self.stats.duplicate_releases += 1;
            log::debug!("pool '{}' ignored repeated release of {}", self.name, id.0);
            return false;
        }

        scene.set_active(entity.root, false);
        for handle in entity.representations.iter().flatten() {
            scene.set_active(*handle, false);
        }
        entity.cache.clear();
        entity.binding = None;
        entity.state = EntityState::Free;
        self.free.push_back(id);
        self.stats.releases += 1;
        true
    }

    /// Leaves exactly one representation of `id` active, creating it on first
    /// use.
    pub fn show<S: Scene>(
        &mut self,
        scene: &mut S,
        id: EntityId,
        kind: VisualKind,
    ) -> Option<EntityHandle> {
        let entity = self.entities.get_mut(id.0)?;
        for other in VisualKind::ALL {
            if other == kind {
                continue;
            }
            if let Some(handle) = entity.representations[other.slot()] {
                scene.set_active(handle, false);
            }
        }

        let handle = match entity.representations[kind.slot()] {
            Some(handle) => handle,
            None => {
                let handle = scene.spawn(kind.prefab());
                scene.set_parent(handle, entity.root);
                entity.representations[kind.slot()] = Some(handle);
                handle
            }
        };
        scene.set_active(handle, true);
        entity.kind = kind;
        Some(handle)
    }

    /// Destroys every entity the pool ever created.
    pub fn teardown<S: Scene>(&mut self, scene: &mut S) {
        for entity in self.entities.drain(..) {
            for handle in entity.representations.iter().flatten() {
                scene.destroy(*handle);
            }
            scene.destroy(entity.root);
        }
        self.free.clear();
        self.pending.clear();
        self.ready = false;
    }

    fn create<S: Scene>(&mut self, scene: &mut S, prewarm: bool) -> EntityId {
        let root = scene.spawn(PrefabKind::PointRoot);
        if let Some(parent) = self.parent {
            scene.set_parent(root, parent);
        }
        scene.set_active(root, false);

        let mut representations = [None; 3];
        if prewarm {
            for kind in VisualKind::ALL {
                let handle = scene.spawn(kind.prefab());
                scene.set_parent(handle, root);
                scene.set_active(handle, false);
                representations[kind.slot()] = Some(handle);
            }
        }

        let id = EntityId(self.entities.len());
        self.entities.push(PooledVisual {
            root,
            representations,
            kind: VisualKind::default(),
            state: EntityState::Free,
            binding: None,
            cache: PointDataCache::new(),
        });
        self.stats.created += 1;
        id
    }
}
