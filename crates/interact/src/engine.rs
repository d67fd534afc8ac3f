use serde::{Deserialize, Serialize};
use skirmish_common::EntityId;
use skirmish_kernel::{HeightField, Registry};

use crate::checks;

/// Tuning for interaction outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Extra push, in units per second, given to a surviving enemy after it
    /// has been moved out of the player.
    pub knockback_speed: f32,
    /// Seconds an exploded-enemy billboard stays up.
    pub explosion_lifetime: f32,
    /// Half-size of the exploded-enemy billboard's volume.
    pub explosion_size: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            knockback_speed: 20.0,
            explosion_lifetime: 1.5,
            explosion_size: 1.0,
        }
    }
}

/// What one frame of interaction checks did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionReport {
    /// Enemies that touched the player.
    pub player_contacts: usize,
    pub player_damage: f32,
    pub player_killed: bool,
    /// Enemy pairs separated, lower handle first.
    pub resolved_pairs: Vec<(EntityId, EntityId)>,
    /// Bullets consumed by an enemy.
    pub bullet_hits: usize,
    /// Enemies killed by bullets.
    pub kills: Vec<EntityId>,
    /// Exploded-enemy billboards spawned for those kills.
    pub spawned: Vec<EntityId>,
    /// Bullets removed for leaving the terrain or hitting the ground.
    pub bullets_grounded: usize,
    /// Entities dropped from storage after the checks.
    pub compacted: usize,
}

/// Runs the four interaction checks against a registry once per frame.
#[derive(Debug, Default)]
pub struct InteractionEngine {
    pub config: InteractionConfig,
    last: InteractionReport,
}

impl InteractionEngine {
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            config,
            last: InteractionReport::default(),
        }
    }

    /// Run every check in order, then compact the registry.
    ///
    /// `ground` is the height field when solid terrain is enabled; bullets at
    /// or below it are removed. The terrain entity's volume bounds the
    /// playfield either way.
    pub fn run(&mut self, registry: &mut Registry, ground: Option<&HeightField>, dt: f32) -> &InteractionReport {
        let _span = tracing::info_span!("interactions").entered();
        let mut report = InteractionReport::default();

        checks::player_enemy(registry, &self.config, dt, &mut report);
        checks::enemy_enemy(registry, &mut report);
        checks::bullet_enemy(registry, &self.config, &mut report);
        checks::bullet_terrain(registry, ground, &mut report);

        report.compacted = registry.remove_inactive();

        tracing::trace!(
            contacts = report.player_contacts,
            pairs = report.resolved_pairs.len(),
            hits = report.bullet_hits,
            kills = report.kills.len(),
            grounded = report.bullets_grounded,
            compacted = report.compacted,
            "interactions resolved"
        );
        self.last = report;
        &self.last
    }

    /// Report from the most recent `run`.
    pub fn last_report(&self) -> &InteractionReport {
        &self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use skirmish_common::{BoundingVolume, Transform};
    use skirmish_kernel::{
        BillboardKind, BulletState, ContactMode, EnemyState, EntityKind, EntityState, PlayerState,
    };

    fn player(r: &mut Registry, at: Vec3) -> EntityId {
        r.add(
            Transform::at(at),
            BoundingVolume::cube(0.5),
            EntityState::Player(PlayerState::new(100.0, 5.0)),
        )
    }

    fn enemy(r: &mut Registry, at: Vec3, health: f32, contact: ContactMode) -> EntityId {
        r.add(
            Transform::at(at),
            BoundingVolume::cube(0.5),
            EntityState::Enemy(EnemyState {
                health,
                contact_damage: 15.0,
                contact,
                speed: 0.0,
            }),
        )
    }

    fn bullet(r: &mut Registry, at: Vec3, damage: f32) -> EntityId {
        r.add(
            Transform::at(at),
            BoundingVolume::sphere(0.1),
            EntityState::Bullet(BulletState {
                velocity: Vec3::ZERO,
                damage,
                lifetime: 5.0,
                age: 0.0,
            }),
        )
    }

    fn terrain(r: &mut Registry, field: &HeightField) -> EntityId {
        r.add(Transform::default(), field.bounding_volume(20.0), EntityState::Terrain)
    }

    fn health(r: &Registry, id: EntityId) -> f32 {
        r.get(id).and_then(|e| e.health()).unwrap()
    }

    #[test]
    fn empty_registry_is_a_quiet_frame() {
        let mut r = Registry::new();
        let mut engine = InteractionEngine::default();
        assert_eq!(*engine.run(&mut r, None, 0.016), InteractionReport::default());
    }

    #[test]
    fn persistent_enemy_damages_and_is_knocked_back() {
        let mut r = Registry::new();
        let p = player(&mut r, Vec3::ZERO);
        let e = enemy(&mut r, Vec3::new(0.8, 0.0, 0.0), 10.0, ContactMode::Persist);
        let mut engine = InteractionEngine::default();
        let report = engine.run(&mut r, None, 0.016).clone();

        assert_eq!(health(&r, p), 85.0);
        assert_eq!(report.player_contacts, 1);
        assert!(r.is_active(e));
        let player_box = r.get(p).unwrap().world_bounds();
        assert!(!r.get(e).unwrap().world_bounds().intersects(&player_box));
        assert!(r.get(e).unwrap().transform.position.x > 1.0);
    }

    #[test]
    fn consuming_enemy_is_removed_on_contact() {
        let mut r = Registry::new();
        let p = player(&mut r, Vec3::ZERO);
        let e = enemy(&mut r, Vec3::new(0.5, 0.0, 0.0), 10.0, ContactMode::Consume);
        InteractionEngine::default().run(&mut r, None, 0.016);
        assert_eq!(health(&r, p), 85.0);
        assert!(!r.is_active(e));
        assert!(r.get(e).is_none());
    }

    #[test]
    fn all_contacts_land_before_the_death_check() {
        let mut r = Registry::new();
        let p = player(&mut r, Vec3::ZERO);
        r.get_mut(p).unwrap().as_player_mut().unwrap().health = 20.0;
        let a = enemy(&mut r, Vec3::new(0.5, 0.0, 0.0), 10.0, ContactMode::Consume);
        let b = enemy(&mut r, Vec3::new(-0.5, 0.0, 0.0), 10.0, ContactMode::Consume);
        let mut engine = InteractionEngine::default();
        let report = engine.run(&mut r, None, 0.016).clone();

        assert_eq!(report.player_contacts, 2);
        assert_eq!(report.player_damage, 30.0);
        assert!(report.player_killed);
        assert!(!r.is_active(p));
        assert!(!r.is_active(a) && !r.is_active(b));
    }

    #[test]
    fn enemy_pairs_resolve_once_and_separate() {
        let mut r = Registry::new();
        let ids: Vec<EntityId> = (0..4)
            .map(|i| enemy(&mut r, Vec3::new(i as f32 * 0.3, 0.0, 0.0), 10.0, ContactMode::Persist))
            .collect();
        let mut engine = InteractionEngine::default();
        let report = engine.run(&mut r, None, 0.016).clone();

        let mut pairs = report.resolved_pairs.clone();
        pairs.sort();
        pairs.dedup();
        assert_eq!(pairs.len(), report.resolved_pairs.len());
        assert!(report.resolved_pairs.iter().all(|(a, b)| a < b));
        assert!(report.resolved_pairs.contains(&(ids[0], ids[1])));
    }

    #[test]
    fn separated_pair_no_longer_overlaps() {
        let mut r = Registry::new();
        let a = enemy(&mut r, Vec3::ZERO, 10.0, ContactMode::Persist);
        let b = enemy(&mut r, Vec3::new(0.4, 0.0, 0.0), 10.0, ContactMode::Persist);
        InteractionEngine::default().run(&mut r, None, 0.016);
        let pa = r.get(a).unwrap().transform.position;
        let pb = r.get(b).unwrap().transform.position;
        assert!((pa.x + 0.3).abs() < 1e-5);
        assert!((pb.x - 0.7).abs() < 1e-5);
        assert!(pb.x - pa.x >= 1.0 - 1e-5);
    }

    #[test]
    fn bullet_at_enemy_centre_kills_and_spawns_explosion() {
        let mut r = Registry::new();
        let at = Vec3::new(5.0, 1.0, -3.0);
        let e = enemy(&mut r, at, 10.0, ContactMode::Persist);
        let b = bullet(&mut r, at, 10.0);
        let mut engine = InteractionEngine::default();
        let report = engine.run(&mut r, None, 0.016).clone();

        assert!(!r.is_active(b));
        assert!(!r.is_active(e));
        assert_eq!(report.kills, vec![e]);
        assert_eq!(report.spawned.len(), 1);
        let explosion = r.get(report.spawned[0]).unwrap();
        assert_eq!(explosion.kind(), EntityKind::Billboard(BillboardKind::ExplodedEnemy));
        assert_eq!(explosion.transform.position, at);
        assert_eq!(r.count_active(EntityKind::Billboard(BillboardKind::ExplodedEnemy)), 1);
    }

    #[test]
    fn kills_equal_spawns() {
        let mut r = Registry::new();
        for i in 0..5 {
            let at = Vec3::new(i as f32 * 3.0, 0.0, 0.0);
            enemy(&mut r, at, if i % 2 == 0 { 5.0 } else { 50.0 }, ContactMode::Persist);
            bullet(&mut r, at, 10.0);
        }
        let mut engine = InteractionEngine::default();
        let report = engine.run(&mut r, None, 0.016).clone();
        assert_eq!(report.bullet_hits, 5);
        assert_eq!(report.kills.len(), 3);
        assert_eq!(report.kills.len(), report.spawned.len());
    }

    #[test]
    fn bullet_damages_only_the_first_overlapping_enemy() {
        let mut r = Registry::new();
        // Apart from each other, both within reach of the bullet.
        let first = enemy(&mut r, Vec3::new(-0.55, 0.0, 0.0), 30.0, ContactMode::Persist);
        let second = enemy(&mut r, Vec3::new(0.55, 0.0, 0.0), 30.0, ContactMode::Persist);
        bullet(&mut r, Vec3::ZERO, 10.0);
        let mut engine = InteractionEngine::default();
        let report = engine.run(&mut r, None, 0.016).clone();
        assert!(report.resolved_pairs.is_empty());
        assert_eq!(report.bullet_hits, 1);
        assert_eq!(health(&r, first), 20.0);
        assert_eq!(health(&r, second), 30.0);
    }

    #[test]
    fn dead_enemy_does_not_absorb_a_second_bullet() {
        let mut r = Registry::new();
        let e = enemy(&mut r, Vec3::ZERO, 10.0, ContactMode::Persist);
        bullet(&mut r, Vec3::ZERO, 10.0);
        let late = bullet(&mut r, Vec3::ZERO, 10.0);
        let mut engine = InteractionEngine::default();
        let report = engine.run(&mut r, None, 0.016).clone();
        assert!(!r.is_active(e));
        assert_eq!(report.bullet_hits, 1);
        assert!(r.is_active(late));
    }

    #[test]
    fn enemy_consumed_by_the_player_is_gone_for_later_checks() {
        let mut r = Registry::new();
        let p = player(&mut r, Vec3::ZERO);
        let consumed = enemy(&mut r, Vec3::new(0.6, 0.0, 0.0), 10.0, ContactMode::Consume);
        // Overlaps only the consumed enemy, not the player.
        let neighbour = enemy(&mut r, Vec3::new(1.4, 0.0, 0.0), 10.0, ContactMode::Persist);
        // Inside the consumed enemy, clear of the neighbour.
        let b = bullet(&mut r, Vec3::new(0.6, 0.0, 0.4), 10.0);

        let mut engine = InteractionEngine::default();
        let report = engine.run(&mut r, None, 0.016).clone();

        assert_eq!(report.player_contacts, 1);
        assert_eq!(health(&r, p), 85.0);
        assert!(r.get(consumed).is_none());
        assert!(report.resolved_pairs.iter().all(|&(x, y)| x != consumed && y != consumed));
        assert_eq!(r.get(neighbour).unwrap().transform.position, Vec3::new(1.4, 0.0, 0.0));
        assert!(r.is_active(b));
        assert_eq!(report.bullet_hits, 0);
        assert!(report.kills.is_empty());
        assert!(report.spawned.is_empty());
        assert_eq!(r.count_active(EntityKind::Billboard(BillboardKind::ExplodedEnemy)), 0);
    }

    #[test]
    fn bullet_leaving_terrain_box_is_removed() {
        let field = HeightField::flat(11, 11, 1.0, 0.0);
        let mut r = Registry::new();
        terrain(&mut r, &field);
        let inside = bullet(&mut r, Vec3::new(5.0, 2.0, 5.0), 1.0);
        let outside = bullet(&mut r, Vec3::new(-3.0, 2.0, 5.0), 1.0);
        let mut engine = InteractionEngine::default();
        let report = engine.run(&mut r, None, 0.016).clone();
        assert!(r.is_active(inside));
        assert!(!r.is_active(outside));
        assert_eq!(report.bullets_grounded, 1);
    }

    #[test]
    fn solid_terrain_stops_low_bullets() {
        let field = HeightField::flat(11, 11, 1.0, 2.0);
        let mut r = Registry::new();
        terrain(&mut r, &field);
        let low = bullet(&mut r, Vec3::new(5.0, 1.5, 5.0), 1.0);
        let high = bullet(&mut r, Vec3::new(5.0, 3.0, 5.0), 1.0);

        let mut engine = InteractionEngine::default();
        engine.run(&mut r, None, 0.016);
        assert!(r.is_active(low), "ground ignored when terrain is not solid");

        engine.run(&mut r, Some(&field), 0.016);
        assert!(!r.is_active(low));
        assert!(r.is_active(high));
    }

    #[test]
    fn compaction_runs_after_the_checks() {
        let mut r = Registry::new();
        let e = enemy(&mut r, Vec3::ZERO, 1.0, ContactMode::Persist);
        bullet(&mut r, Vec3::ZERO, 10.0);
        let mut engine = InteractionEngine::default();
        let compacted = engine.run(&mut r, None, 0.016).compacted;
        assert_eq!(compacted, 2);
        assert!(r.get(e).is_none());
        assert_eq!(r.len(), 1);
        assert_eq!(engine.last_report().compacted, 2);
    }
}
