use skirmish_common::{EntityId, Ray};
use skirmish_kernel::Registry;
use skirmish_render::Camera;

/// Hit distances closer than this are treated as equal; the earlier
/// registry entry wins.
pub const PICK_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub id: EntityId,
    pub distance: f32,
}

/// Nearest active, pickable entity along `ray`.
pub fn nearest_hit(registry: &Registry, ray: &Ray) -> Option<PickHit> {
    let mut best: Option<PickHit> = None;
    for entity in registry.iter_active().filter(|e| e.kind().is_pickable()) {
        let Some(distance) = entity.world_bounds().ray_intersection(ray) else {
            continue;
        };
        let closer = best.is_none_or(|b| distance < b.distance - PICK_EPSILON);
        if closer {
            best = Some(PickHit {
                id: entity.id(),
                distance,
            });
        }
    }
    best
}

/// Turns a cursor position into a selection.
#[derive(Debug, Default)]
pub struct PickingResolver {
    last_hit: Option<PickHit>,
}

impl PickingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unproject the cursor, select the nearest hit, or clear the selection
    /// on a miss.
    pub fn pick_at(&mut self, camera: &Camera, registry: &mut Registry, screen_x: f32, screen_y: f32) -> Option<EntityId> {
        let hit = camera
            .screen_ray(screen_x, screen_y)
            .and_then(|ray| nearest_hit(registry, &ray));
        self.last_hit = hit;
        match hit {
            Some(hit) => {
                registry.select(hit.id);
                tracing::debug!(id = %hit.id, distance = hit.distance, "picked");
                Some(hit.id)
            }
            None => {
                registry.clear_selection();
                tracing::debug!(screen_x, screen_y, "pick missed");
                None
            }
        }
    }

    pub fn last_hit(&self) -> Option<PickHit> {
        self.last_hit
    }
}
