use std::collections::BTreeMap;

use skirmish_common::{BoundingVolume, EntityId, Transform};

use crate::entity::{AnimateContext, Entity, EntityKind, EntityState, Lifecycle};
use crate::terrain::HeightField;

/// A record produced by every registry mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    Added { id: EntityId, kind: EntityKind },
    Deactivated { id: EntityId, kind: EntityKind },
    /// Inactive entities were dropped from storage.
    Compacted { removed: usize },
    SelectionChanged {
        old: Option<EntityId>,
        new: Option<EntityId>,
    },
}

/// Ordered arena of scene entities.
///
/// The registry is the sole owner of every entity. Everything else holds
/// `EntityId` handles and looks entities up on demand, so a handle can go
/// stale but never dangle. Storage positions are private: compaction moves
/// entities around, and no caller can hold a position across it.
#[derive(Debug, Default)]
pub struct Registry {
    entities: Vec<Entity>,
    /// Handle to storage position. Rebuilt on compaction.
    slots: BTreeMap<EntityId, usize>,
    next_id: u64,
    selection: Option<EntityId>,
    events: Vec<RegistryEvent>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entities, active or not.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.iter_active().count()
    }

    pub fn count_active(&self, kind: EntityKind) -> usize {
        self.iter_active().filter(|e| e.kind() == kind).count()
    }

    /// Append a new active entity and return its handle.
    pub fn add(&mut self, transform: Transform, bounds: BoundingVolume, state: EntityState) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        let kind = state.kind();
        self.slots.insert(id, self.entities.len());
        self.entities.push(Entity::new(id, transform, bounds, state));
        self.events.push(RegistryEvent::Added { id, kind });
        tracing::trace!(%id, kind = kind.label(), "entity added");
        id
    }

    /// Look up a stored entity. Inactive entities remain visible here until
    /// compaction; use [`Registry::get_active`] for simulation queries.
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.slots.get(&id).map(|&slot| &self.entities[slot])
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let slot = *self.slots.get(&id)?;
        Some(&mut self.entities[slot])
    }

    pub fn get_active(&self, id: EntityId) -> Option<&Entity> {
        self.get(id).filter(|e| e.is_active())
    }

    pub fn get_active_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.get_mut(id).filter(|e| e.is_active())
    }

    pub fn is_active(&self, id: EntityId) -> bool {
        self.get_active(id).is_some()
    }

    /// All stored entities in insertion order, including inactive ones.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> + Clone + '_ {
        self.entities.iter()
    }

    /// Active entities in insertion order. The iterator is lazy and can be
    /// cloned to restart from the current position.
    pub fn iter_active(&self) -> impl Iterator<Item = &Entity> + Clone + '_ {
        self.entities.iter().filter(|e| e.is_active())
    }

    pub fn for_each_active(&self, mut f: impl FnMut(&Entity)) {
        for entity in self.iter_active() {
            f(entity);
        }
    }

    /// Handles of active entities of one kind, in insertion order.
    ///
    /// A snapshot: entities added or deactivated afterwards are not reflected.
    pub fn active_ids(&self, kind: EntityKind) -> Vec<EntityId> {
        self.iter_active()
            .filter(|e| e.kind() == kind)
            .map(Entity::id)
            .collect()
    }

    pub fn first_active(&self, kind: EntityKind) -> Option<&Entity> {
        self.iter_active().find(|e| e.kind() == kind)
    }

    /// Mark an entity inactive and drop any selection naming it.
    ///
    /// Returns `true` only on the active → inactive transition; repeated
    /// calls and unknown handles are no-ops.
    pub fn deactivate(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.get_mut(id) else {
            return false;
        };
        if !entity.set_inactive() {
            return false;
        }
        let kind = entity.kind();
        self.events.push(RegistryEvent::Deactivated { id, kind });
        tracing::debug!(%id, kind = kind.label(), "entity deactivated");
        if self.selection == Some(id) {
            self.set_selection(None);
        }
        true
    }

    /// Drop inactive entities from storage. Handles of survivors stay valid.
    pub fn remove_inactive(&mut self) -> usize {
        let before = self.entities.len();
        self.entities.retain(Entity::is_active);
        let removed = before - self.entities.len();
        if removed > 0 {
            self.slots = self
                .entities
                .iter()
                .enumerate()
                .map(|(slot, e)| (e.id(), slot))
                .collect();
            self.events.push(RegistryEvent::Compacted { removed });
            tracing::trace!(removed, remaining = self.entities.len(), "registry compacted");
        }
        removed
    }

    pub fn selection(&self) -> Option<EntityId> {
        self.selection
    }

    pub fn selected(&self) -> Option<&Entity> {
        self.selection.and_then(|id| self.get_active(id))
    }

    /// Select an active entity, replacing any prior selection.
    /// Returns `false` (and leaves selection untouched) for inactive handles.
    pub fn select(&mut self, id: EntityId) -> bool {
        if !self.is_active(id) {
            return false;
        }
        self.set_selection(Some(id));
        true
    }

    pub fn clear_selection(&mut self) {
        self.set_selection(None);
    }

    fn set_selection(&mut self, new: Option<EntityId>) {
        let old = self.selection;
        if old != new {
            self.selection = new;
            self.events.push(RegistryEvent::SelectionChanged { old, new });
        }
    }

    /// Advance every active entity by one frame and deactivate the ones that
    /// expired. Returns the expired handles in registry order.
    pub fn animate(&mut self, dt: f32, ground: Option<&HeightField>) -> Vec<EntityId> {
        let ctx = AnimateContext {
            dt,
            player_position: self
                .first_active(EntityKind::Player)
                .map(|p| p.transform.position),
            ground,
        };
        let expired: Vec<EntityId> = self
            .entities
            .iter_mut()
            .filter(|e| e.is_active())
            .filter_map(|e| (e.animate(&ctx) == Lifecycle::Expired).then(|| e.id()))
            .collect();
        for &id in &expired {
            self.deactivate(id);
        }
        expired
    }

    pub fn events(&self) -> &[RegistryEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<RegistryEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{BulletState, EnemyState, ContactMode, PlayerState};
    use glam::Vec3;

    fn enemy(registry: &mut Registry, x: f32) -> EntityId {
        registry.add(
            Transform::at(Vec3::new(x, 0.0, 0.0)),
            BoundingVolume::cube(0.5),
            EntityState::Enemy(EnemyState {
                health: 10.0,
                contact_damage: 1.0,
                contact: ContactMode::Persist,
                speed: 0.0,
            }),
        )
    }

    #[test]
    fn registry_starts_empty() {
        let r = Registry::new();
        assert!(r.is_empty());
        assert_eq!(r.active_count(), 0);
        assert!(r.selection().is_none());
    }

    #[test]
    fn ids_follow_insertion_order() {
        let mut r = Registry::new();
        let ids: Vec<EntityId> = (0..5).map(|i| enemy(&mut r, i as f32)).collect();
        let seen: Vec<EntityId> = r.iter_active().map(Entity::id).collect();
        assert_eq!(seen, ids);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn active_iteration_is_restartable() {
        let mut r = Registry::new();
        enemy(&mut r, 0.0);
        enemy(&mut r, 1.0);
        let mut iter = r.iter_active();
        iter.next();
        let restarted = r.iter_active().count();
        let rest = iter.clone().count();
        assert_eq!(restarted, 2);
        assert_eq!(rest, 1);
    }

    #[test]
    fn deactivated_entities_skip_iteration_immediately() {
        let mut r = Registry::new();
        let a = enemy(&mut r, 0.0);
        let b = enemy(&mut r, 1.0);
        assert!(r.deactivate(a));
        let seen: Vec<EntityId> = r.iter_active().map(Entity::id).collect();
        assert_eq!(seen, vec![b]);
        // Still stored until compaction.
        assert_eq!(r.len(), 2);
        assert!(r.get(a).is_some());
        assert!(r.get_active(a).is_none());
    }

    #[test]
    fn deactivate_is_idempotent() {
        let mut r = Registry::new();
        let a = enemy(&mut r, 0.0);
        assert!(r.deactivate(a));
        assert!(!r.deactivate(a));
        let deactivations = r
            .events()
            .iter()
            .filter(|e| matches!(e, RegistryEvent::Deactivated { .. }))
            .count();
        assert_eq!(deactivations, 1);
    }

    #[test]
    fn deactivate_unknown_handle_is_noop() {
        let mut r = Registry::new();
        assert!(!r.deactivate(EntityId(99)));
    }

    #[test]
    fn deactivating_selected_entity_clears_selection() {
        let mut r = Registry::new();
        let ids: Vec<EntityId> = (0..4).map(|i| enemy(&mut r, i as f32)).collect();
        for &id in &ids {
            assert!(r.select(id));
            r.deactivate(id);
            assert_eq!(r.selection(), None, "selection survived deactivation of {id}");
        }
    }

    #[test]
    fn deactivating_other_entity_keeps_selection() {
        let mut r = Registry::new();
        let a = enemy(&mut r, 0.0);
        let b = enemy(&mut r, 1.0);
        r.select(a);
        r.deactivate(b);
        assert_eq!(r.selection(), Some(a));
    }

    #[test]
    fn cannot_select_inactive_entity() {
        let mut r = Registry::new();
        let a = enemy(&mut r, 0.0);
        r.deactivate(a);
        assert!(!r.select(a));
        assert!(r.selected().is_none());
    }

    #[test]
    fn compaction_keeps_handles_valid() {
        let mut r = Registry::new();
        let ids: Vec<EntityId> = (0..6).map(|i| enemy(&mut r, i as f32)).collect();
        r.deactivate(ids[1]);
        r.deactivate(ids[4]);
        assert_eq!(r.remove_inactive(), 2);
        assert_eq!(r.len(), 4);
        assert!(r.get(ids[1]).is_none());
        for &id in &[ids[0], ids[2], ids[3], ids[5]] {
            assert_eq!(r.get(id).map(Entity::id), Some(id));
        }
        assert_eq!(r.remove_inactive(), 0);
    }

    #[test]
    fn added_after_compaction_continue_id_sequence() {
        let mut r = Registry::new();
        let a = enemy(&mut r, 0.0);
        r.deactivate(a);
        r.remove_inactive();
        let b = enemy(&mut r, 1.0);
        assert!(b > a);
        assert!(r.get(a).is_none());
    }

    #[test]
    fn animate_deactivates_expired_entities() {
        let mut r = Registry::new();
        let bullet = r.add(
            Transform::default(),
            BoundingVolume::sphere(0.1),
            EntityState::Bullet(BulletState {
                velocity: Vec3::X,
                damage: 1.0,
                lifetime: 0.05,
                age: 0.0,
            }),
        );
        let expired = r.animate(0.1, None);
        assert_eq!(expired, vec![bullet]);
        assert!(!r.is_active(bullet));
    }

    #[test]
    fn animate_feeds_player_position_to_enemies() {
        let mut r = Registry::new();
        r.add(
            Transform::at(Vec3::new(0.0, 0.0, -10.0)),
            BoundingVolume::cube(0.5),
            EntityState::Player(PlayerState::new(100.0, 5.0)),
        );
        let e = r.add(
            Transform::default(),
            BoundingVolume::cube(0.5),
            EntityState::Enemy(EnemyState {
                health: 10.0,
                contact_damage: 1.0,
                contact: ContactMode::Persist,
                speed: 1.0,
            }),
        );
        r.animate(1.0, None);
        let z = r.get(e).unwrap().transform.position.z;
        assert!((z + 1.0).abs() < 1e-5);
    }

    #[test]
    fn count_by_kind() {
        let mut r = Registry::new();
        enemy(&mut r, 0.0);
        let b = enemy(&mut r, 1.0);
        r.add(Transform::default(), BoundingVolume::cube(1.0), EntityState::Wall);
        r.deactivate(b);
        assert_eq!(r.count_active(EntityKind::Enemy), 1);
        assert_eq!(r.count_active(EntityKind::Wall), 1);
        assert_eq!(r.active_ids(EntityKind::Enemy).len(), 1);
    }

    #[test]
    fn drain_events_clears_log() {
        let mut r = Registry::new();
        enemy(&mut r, 0.0);
        let events = r.drain_events();
        assert_eq!(events.len(), 1);
        assert!(r.events().is_empty());
    }
}
