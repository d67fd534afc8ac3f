use skirmish_common::{BoundingVolume, EntityId, Transform};
use skirmish_kernel::{
    BillboardKind, BillboardState, ContactMode, EntityKind, EntityState, HeightField, Registry,
};

use crate::engine::{InteractionConfig, InteractionReport};

/// Contact damage from every overlapping enemy, then the death check.
pub(crate) fn player_enemy(
    registry: &mut Registry,
    config: &InteractionConfig,
    dt: f32,
    report: &mut InteractionReport,
) {
    let Some(player) = registry.first_active(EntityKind::Player) else {
        return;
    };
    let player_id = player.id();
    let player_box = player.world_bounds();

    let mut damage = 0.0;
    for enemy_id in registry.active_ids(EntityKind::Enemy) {
        let Some(enemy) = registry.get_active_mut(enemy_id) else {
            continue;
        };
        let Some(push) = enemy.world_bounds().penetration(&player_box) else {
            continue;
        };
        let Some(state) = enemy.as_enemy() else {
            continue;
        };
        let (contact_damage, contact) = (state.contact_damage, state.contact);
        damage += contact_damage;
        report.player_contacts += 1;
        match contact {
            ContactMode::Consume => {
                registry.deactivate(enemy_id);
            }
            ContactMode::Persist => {
                let knock = push.normalize_or_zero() * config.knockback_speed * dt;
                enemy.transform.position += push + knock;
            }
        }
    }
    if report.player_contacts == 0 {
        return;
    }

    report.player_damage = damage;
    let Some(state) = registry.get_active_mut(player_id).and_then(|p| p.as_player_mut()) else {
        return;
    };
    state.health -= damage;
    let remaining = state.health;
    tracing::debug!(damage, remaining, "player hit");
    if remaining <= 0.0 {
        registry.deactivate(player_id);
        report.player_killed = true;
    }
}

/// Push every overlapping enemy pair apart, half each.
pub(crate) fn enemy_enemy(registry: &mut Registry, report: &mut InteractionReport) {
    let enemies = registry.active_ids(EntityKind::Enemy);
    for (i, &a) in enemies.iter().enumerate() {
        for &b in &enemies[i + 1..] {
            let (Some(ea), Some(eb)) = (registry.get_active(a), registry.get_active(b)) else {
                continue;
            };
            let Some(push) = ea.world_bounds().penetration(&eb.world_bounds()) else {
                continue;
            };
            let half = push * 0.5;
            if let Some(ea) = registry.get_active_mut(a) {
                ea.transform.position += half;
            }
            if let Some(eb) = registry.get_active_mut(b) {
                eb.transform.position -= half;
            }
            report.resolved_pairs.push((a, b));
        }
    }
}

/// Each bullet hits at most one enemy: the first overlapping one.
pub(crate) fn bullet_enemy(
    registry: &mut Registry,
    config: &InteractionConfig,
    report: &mut InteractionReport,
) {
    for bullet_id in registry.active_ids(EntityKind::Bullet) {
        let Some(bullet) = registry.get_active(bullet_id) else {
            continue;
        };
        let Some(damage) = bullet.as_bullet().map(|b| b.damage) else {
            continue;
        };
        let bullet_bounds = bullet.world_bounds();
        let target = registry
            .iter_active()
            .find(|e| e.kind() == EntityKind::Enemy && e.world_bounds().intersects(&bullet_bounds))
            .map(|e| e.id());
        let Some(enemy_id) = target else {
            continue;
        };

        registry.deactivate(bullet_id);
        report.bullet_hits += 1;

        let Some(enemy) = registry.get_active_mut(enemy_id) else {
            continue;
        };
        let position = enemy.transform.position;
        let Some(state) = enemy.as_enemy_mut() else {
            continue;
        };
        state.health -= damage;
        if state.health > 0.0 {
            continue;
        }

        registry.deactivate(enemy_id);
        let explosion = spawn_explosion(registry, config, position);
        tracing::debug!(enemy = %enemy_id, %explosion, "enemy destroyed");
        report.kills.push(enemy_id);
        report.spawned.push(explosion);
    }
}

fn spawn_explosion(registry: &mut Registry, config: &InteractionConfig, position: glam::Vec3) -> EntityId {
    registry.add(
        Transform::at(position),
        BoundingVolume::cube(config.explosion_size),
        EntityState::Billboard(BillboardState::timed(
            BillboardKind::ExplodedEnemy,
            config.explosion_lifetime,
        )),
    )
}

/// Remove bullets outside the terrain volume, or under the ground when solid.
pub(crate) fn bullet_terrain(
    registry: &mut Registry,
    ground: Option<&HeightField>,
    report: &mut InteractionReport,
) {
    let playfield = registry
        .first_active(EntityKind::Terrain)
        .map(|t| t.world_bounds());

    for bullet_id in registry.active_ids(EntityKind::Bullet) {
        let Some(bullet) = registry.get_active(bullet_id) else {
            continue;
        };
        let p = bullet.transform.position;
        let outside = playfield.is_some_and(|volume| !volume.contains_point(p));
        let buried = ground
            .and_then(|field| field.height_at(p.x, p.z))
            .is_some_and(|h| p.y <= h);
        if outside || buried {
            registry.deactivate(bullet_id);
            report.bullets_grounded += 1;
        }
    }
}
