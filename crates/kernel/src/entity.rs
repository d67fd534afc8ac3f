use glam::Vec3;
use serde::{Deserialize, Serialize};
use skirmish_common::{BoundingVolume, EntityId, Transform};

use crate::terrain::HeightField;

/// Decorative billboard variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BillboardKind {
    Tree,
    Smoke,
    SkyBox,
    ExplodedEnemy,
}

/// Category tag. Derived from the entity's state, so it never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Enemy,
    Bullet,
    Terrain,
    Wall,
    Mirror,
    Billboard(BillboardKind),
}

impl EntityKind {
    /// Terrain and skybox enclose the playfield and the camera; a cursor ray
    /// would always hit them.
    pub fn is_pickable(self) -> bool {
        !matches!(
            self,
            Self::Terrain | Self::Billboard(BillboardKind::SkyBox)
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Enemy => "enemy",
            Self::Bullet => "bullet",
            Self::Terrain => "terrain",
            Self::Wall => "wall",
            Self::Mirror => "mirror",
            Self::Billboard(BillboardKind::Tree) => "tree",
            Self::Billboard(BillboardKind::Smoke) => "smoke",
            Self::Billboard(BillboardKind::SkyBox) => "skybox",
            Self::Billboard(BillboardKind::ExplodedEnemy) => "exploded-enemy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub health: f32,
    pub max_health: f32,
    /// Movement speed in units per second.
    pub speed: f32,
    /// Seconds until the next shot is allowed.
    pub fire_cooldown: f32,
}

impl PlayerState {
    pub fn new(health: f32, speed: f32) -> Self {
        Self {
            health,
            max_health: health,
            speed,
            fire_cooldown: 0.0,
        }
    }
}

/// What happens to an enemy after it touches the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactMode {
    /// The enemy is spent by the contact and removed.
    Consume,
    /// The enemy survives and is knocked back out of the player.
    Persist,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnemyState {
    pub health: f32,
    /// Damage dealt to the player per frame of contact.
    pub contact_damage: f32,
    pub contact: ContactMode,
    pub speed: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BulletState {
    pub velocity: Vec3,
    pub damage: f32,
    /// Seconds the bullet lives before expiring.
    pub lifetime: f32,
    pub age: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BillboardState {
    pub kind: BillboardKind,
    /// `None` for permanent decoration.
    pub lifetime: Option<f32>,
    pub age: f32,
}

impl BillboardState {
    pub fn permanent(kind: BillboardKind) -> Self {
        Self {
            kind,
            lifetime: None,
            age: 0.0,
        }
    }

    pub fn timed(kind: BillboardKind, lifetime: f32) -> Self {
        Self {
            kind,
            lifetime: Some(lifetime),
            age: 0.0,
        }
    }
}

/// Category-specific state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityState {
    Player(PlayerState),
    Enemy(EnemyState),
    Bullet(BulletState),
    Terrain,
    Wall,
    Mirror,
    Billboard(BillboardState),
}

impl EntityState {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Player(_) => EntityKind::Player,
            Self::Enemy(_) => EntityKind::Enemy,
            Self::Bullet(_) => EntityKind::Bullet,
            Self::Terrain => EntityKind::Terrain,
            Self::Wall => EntityKind::Wall,
            Self::Mirror => EntityKind::Mirror,
            Self::Billboard(b) => EntityKind::Billboard(b.kind),
        }
    }
}

/// Result of advancing an entity by one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Alive,
    Expired,
}

/// Per-frame inputs shared by every entity's animation step.
#[derive(Debug, Clone, Copy)]
pub struct AnimateContext<'a> {
    pub dt: f32,
    /// Position of the active player, if any. Enemies chase it.
    pub player_position: Option<Vec3>,
    /// Present when solid terrain is on; grounded entities stay on it.
    pub ground: Option<&'a HeightField>,
}

/// A scene object stored in the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: EntityId,
    pub transform: Transform,
    /// Local-space proxy used for collision and picking.
    pub bounds: BoundingVolume,
    pub state: EntityState,
    active: bool,
}

impl Entity {
    pub(crate) fn new(
        id: EntityId,
        transform: Transform,
        bounds: BoundingVolume,
        state: EntityState,
    ) -> Self {
        Self {
            id,
            transform,
            bounds,
            state,
            active: true,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.state.kind()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn set_inactive(&mut self) -> bool {
        std::mem::replace(&mut self.active, false)
    }

    pub fn world_bounds(&self) -> BoundingVolume {
        self.bounds.to_world(&self.transform)
    }

    pub fn health(&self) -> Option<f32> {
        match &self.state {
            EntityState::Player(p) => Some(p.health),
            EntityState::Enemy(e) => Some(e.health),
            _ => None,
        }
    }

    pub fn as_player(&self) -> Option<&PlayerState> {
        match &self.state {
            EntityState::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.state {
            EntityState::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_enemy(&self) -> Option<&EnemyState> {
        match &self.state {
            EntityState::Enemy(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_enemy_mut(&mut self) -> Option<&mut EnemyState> {
        match &mut self.state {
            EntityState::Enemy(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_bullet(&self) -> Option<&BulletState> {
        match &self.state {
            EntityState::Bullet(b) => Some(b),
            _ => None,
        }
    }

    /// Distance from the entity origin down to the bottom of its volume.
    pub fn ground_offset(&self) -> f32 {
        let (min, _) = self.bounds.bounds();
        (-min.y * self.transform.scale.y).max(0.0)
    }

    /// Advance one frame. Static geometry is untouched.
    pub fn animate(&mut self, ctx: &AnimateContext<'_>) -> Lifecycle {
        let offset = self.ground_offset();
        let position = &mut self.transform.position;
        match &mut self.state {
            EntityState::Player(player) => {
                player.fire_cooldown = (player.fire_cooldown - ctx.dt).max(0.0);
                if let Some(ground) = ctx.ground {
                    if let Some(h) = ground.height_at(position.x, position.z) {
                        position.y = position.y.max(h + offset);
                    }
                }
                Lifecycle::Alive
            }
            EntityState::Enemy(enemy) => {
                if let Some(target) = ctx.player_position {
                    let mut to_target = target - *position;
                    to_target.y = 0.0;
                    if let Some(dir) = to_target.try_normalize() {
                        let step = (enemy.speed * ctx.dt).min(to_target.length());
                        *position += dir * step;
                        self.transform.rotation.y = (-dir.x).atan2(-dir.z);
                    }
                }
                if let Some(ground) = ctx.ground {
                    if let Some(h) = ground.height_at(position.x, position.z) {
                        position.y = h + offset;
                    }
                }
                Lifecycle::Alive
            }
            EntityState::Bullet(bullet) => {
                *position += bullet.velocity * ctx.dt;
                bullet.age += ctx.dt;
                if bullet.age >= bullet.lifetime {
                    Lifecycle::Expired
                } else {
                    Lifecycle::Alive
                }
            }
            EntityState::Billboard(billboard) => {
                billboard.age += ctx.dt;
                match billboard.lifetime {
                    Some(lifetime) if billboard.age >= lifetime => Lifecycle::Expired,
                    _ => Lifecycle::Alive,
                }
            }
            EntityState::Terrain | EntityState::Wall | EntityState::Mirror => Lifecycle::Alive,
        }
    }
}
