use std::collections::HashMap;

use crate::surface::{Surface, VisualHandle};

use super::EntityId;

/// Placed entities keyed by their visual handle.
#[derive(Debug, Default)]
pub struct Registry {
    owners: HashMap<VisualHandle, EntityId>,
}

impl Registry {
    /// Mounts the handle; false when it is already registered.
    pub fn add(&mut self, surface: &mut dyn Surface, handle: VisualHandle, owner: EntityId) -> bool {
        if self.owners.contains_key(&handle) {
            return false;
        }
        self.owners.insert(handle, owner);
        surface.mount(handle);
        true
    }

    /// Unmounts the handle; false when it was not registered.
    pub fn remove(&mut self, surface: &mut dyn Surface, handle: VisualHandle) -> bool {
        if self.owners.remove(&handle).is_none() {
            return false;
        }
        surface.unmount(handle);
        true
    }

    pub fn find_owner(&self, handle: VisualHandle) -> Option<EntityId> {
        self.owners.get(&handle).copied()
    }

    pub fn contains(&self, handle: VisualHandle) -> bool {
        self.owners.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Registered owners in id order.
    pub fn owners(&self) -> Vec<EntityId> {
        let mut owners: Vec<EntityId> = self.owners.values().copied().collect();
        owners.sort_unstable();
        owners
    }

    /// Other registered entities whose screen rectangle overlaps `subject`'s,
    /// topmost first: higher layer, then the later entity on ties.
    pub fn find_intersecting(
        &self,
        surface: &dyn Surface,
        subject: VisualHandle,
        layer_of: impl Fn(EntityId) -> i32,
    ) -> Vec<EntityId> {
        let area = surface.bounding_rect(subject);
        if area.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<(i32, EntityId)> = self
            .owners
            .iter()
            .filter(|(handle, _)| **handle != subject)
            .filter(|(handle, _)| {
                let other = surface.bounding_rect(**handle);
                !other.is_empty() && other.intersects(&area)
            })
            .map(|(_, owner)| (layer_of(*owner), *owner))
            .collect();
        hits.sort_unstable_by(|a, b| b.cmp(a));
        hits.into_iter().map(|(_, owner)| owner).collect()
    }
}
