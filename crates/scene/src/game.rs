use glam::Vec3;
use skirmish_common::{BoundingVolume, EntityId, SceneRng, Transform};
use skirmish_input::{Action, InputState, KeyEvent, MouseEvent, PickingResolver};
use skirmish_interact::{InteractionEngine, InteractionReport};
use skirmish_kernel::{
    BillboardKind, BillboardState, BulletState, EnemyState, Entity, EntityKind, EntityState,
    HeightField, PlayerState, Registry, RegistryEvent,
};
use skirmish_render::{
    Allocation, BufferDesc, BufferUsage, Camera, FrameSubmission, Light, LightAttachment,
    LightBuffer, Residency, ResourceHandle, ResourceUploader, TextureDesc, UiQuad, UploadError,
    UploadTracker,
};

use crate::config::{SceneConfig, SceneFlags};
use crate::error::SceneError;
use crate::lifecycle::LifecycleState;
use crate::scene::{SceneCapability, SceneKind};

const SKYBOX_HALF_SIZE: f32 = 500.0;
const PLACEMENT_ATTEMPTS: usize = 32;
const HP_BAR_WIDTH: f32 = 40.0;
const HP_BAR_LIFT: f32 = 0.5;

/// The playable scene: terrain, walls, a mirror, the player, enemies and
/// decoration, one player-mounted spot light.
///
/// Frame order is fixed: input, animation, interactions, light rebuild,
/// render submission.
#[derive(Debug)]
pub struct GameScene {
    config: SceneConfig,
    flags: SceneFlags,
    state: LifecycleState,
    registry: Registry,
    lights: LightBuffer,
    camera: Camera,
    terrain: Option<HeightField>,
    player: Option<EntityId>,
    interactions: InteractionEngine,
    /// Registry events of the last frame, including input between frames.
    frame_events: Vec<RegistryEvent>,
    input: InputState,
    picker: PickingResolver,
    /// Object resources in creation order.
    resources: Vec<ResourceHandle>,
    uploads: UploadTracker,
}

impl GameScene {
    pub fn new(config: SceneConfig) -> Self {
        let camera = Camera {
            speed: config.camera.fly_speed,
            sensitivity: config.camera.sensitivity,
            ..Camera::default()
        };
        Self {
            flags: config.flags,
            interactions: InteractionEngine::new(config.interaction),
            frame_events: Vec::new(),
            config,
            state: LifecycleState::Uninitialized,
            registry: Registry::new(),
            lights: LightBuffer::new(),
            camera,
            terrain: None,
            player: None,
            input: InputState::new(),
            picker: PickingResolver::new(),
            resources: Vec::new(),
            uploads: UploadTracker::new(),
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn flags(&self) -> SceneFlags {
        self.flags
    }

    pub fn flags_mut(&mut self) -> &mut SceneFlags {
        &mut self.flags
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn lights(&self) -> &LightBuffer {
        &self.lights
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn terrain(&self) -> Option<&HeightField> {
        self.terrain.as_ref()
    }

    pub fn player_id(&self) -> Option<EntityId> {
        self.player
    }

    pub fn player(&self) -> Option<&Entity> {
        self.player.and_then(|id| self.registry.get_active(id))
    }

    /// The selected entity, if it is still active.
    pub fn get_selected(&self) -> Option<&Entity> {
        self.registry.selected()
    }

    pub fn last_events(&self) -> &[RegistryEvent] {
        &self.frame_events
    }

    pub fn last_interactions(&self) -> &InteractionReport {
        self.interactions.last_report()
    }

    pub fn pending_uploads(&self) -> usize {
        self.uploads.pending_count()
    }

    /// Select whatever is under the cursor; a miss clears the selection.
    pub fn pick_at(&mut self, screen_x: f32, screen_y: f32) -> Option<EntityId> {
        self.picker.pick_at(&self.camera, &mut self.registry, screen_x, screen_y)
    }

    /// Spawn a bullet along the player's facing if the cooldown allows.
    pub fn fire(&mut self) -> Option<EntityId> {
        let player = self.registry.get_active_mut(self.player?)?;
        let forward = player.transform.forward();
        let origin = player.transform.position + forward * self.config.player.size;
        let state = player.as_player_mut()?;
        if state.fire_cooldown > 0.0 {
            return None;
        }
        state.fire_cooldown = self.config.player.fire_cooldown;

        let bullets = self.config.bullets;
        let id = self.registry.add(
            Transform::at(origin),
            BoundingVolume::sphere(bullets.radius),
            EntityState::Bullet(BulletState {
                velocity: forward * bullets.speed,
                damage: bullets.damage,
                lifetime: bullets.lifetime,
                age: 0.0,
            }),
        );
        tracing::trace!(%id, "bullet fired");
        Some(id)
    }

    fn handle(&mut self, action: Action) -> Option<SceneKind> {
        match action {
            Action::ToggleFreeCamera => {
                self.flags.free_camera = !self.flags.free_camera;
                tracing::info!(free_camera = self.flags.free_camera, "camera mode");
            }
            Action::ToggleSolidTerrain => {
                self.flags.solid_terrain = !self.flags.solid_terrain;
                tracing::info!(solid_terrain = self.flags.solid_terrain, "terrain mode");
            }
            Action::ToggleCursor => {
                self.flags.cursor_active = !self.flags.cursor_active;
                tracing::info!(cursor_active = self.flags.cursor_active, "cursor mode");
            }
            Action::ReturnToTitle => return Some(SceneKind::Title),
            Action::Fire => {
                self.fire();
            }
            Action::Pick { x, y } => {
                self.pick_at(x, y);
            }
            Action::Look { dx, dy } => {
                if self.flags.free_camera {
                    self.camera.rotate(dx, dy);
                } else if let Some(player) = self.player.and_then(|id| self.registry.get_active_mut(id)) {
                    player.transform.rotation.y -= dx * self.config.camera.sensitivity;
                }
            }
            Action::Confirm | Action::Noop => {}
        }
        None
    }

    fn track(&mut self, fence: u64, allocation: Allocation) {
        self.resources.push(allocation.resource);
        self.uploads.track(fence, &allocation);
    }

    fn create_resources(&mut self, uploader: &mut dyn ResourceUploader, fence: u64) -> Result<(), UploadError> {
        self.lights.create(uploader)?;

        if let Some(field) = &self.terrain {
            let heights: &[u8] = bytemuck::cast_slice(field.heights());
            let allocation = uploader.create_buffer(
                &BufferDesc {
                    label: "terrain.heights",
                    size: heights.len() as u64,
                    residency: Residency::DeviceLocal,
                    usage: BufferUsage::Storage,
                },
                Some(heights),
            )?;
            self.track(fence, allocation);
        }

        let cube: [f32; 24] = [
            -0.5, -0.5, -0.5, 0.5, -0.5, -0.5, 0.5, 0.5, -0.5, -0.5, 0.5, -0.5, //
            -0.5, -0.5, 0.5, 0.5, -0.5, 0.5, 0.5, 0.5, 0.5, -0.5, 0.5, 0.5,
        ];
        let quad: [f32; 20] = [
            -0.5, -0.5, 0.0, 0.0, 1.0, 0.5, -0.5, 0.0, 1.0, 1.0, //
            0.5, 0.5, 0.0, 1.0, 0.0, -0.5, 0.5, 0.0, 0.0, 0.0,
        ];
        for (label, vertices) in [("mesh.cube", &cube[..]), ("mesh.billboard", &quad[..])] {
            let bytes: &[u8] = bytemuck::cast_slice(vertices);
            let allocation = uploader.create_buffer(
                &BufferDesc {
                    label,
                    size: bytes.len() as u64,
                    residency: Residency::DeviceLocal,
                    usage: BufferUsage::Vertex,
                },
                Some(bytes),
            )?;
            self.track(fence, allocation);
        }

        let textures = [
            ("texture.tree", [40u8, 120, 40, 255]),
            ("texture.smoke", [160, 160, 160, 128]),
            ("texture.skybox", [90, 140, 220, 255]),
            ("texture.explosion", [240, 120, 20, 255]),
        ];
        for (label, rgba) in textures {
            let pixels = rgba.repeat(16);
            let allocation = uploader.create_texture(
                &TextureDesc {
                    label,
                    width: 4,
                    height: 4,
                },
                &pixels,
            )?;
            self.track(fence, allocation);
        }
        Ok(())
    }

    fn free_resources(&mut self, uploader: &mut dyn ResourceUploader) {
        self.lights.release(uploader);
        for handle in self.resources.drain(..) {
            uploader.release(handle);
        }
        self.uploads.release_all(uploader);
    }

    fn ground_height(&self, x: f32, z: f32) -> f32 {
        self.terrain
            .as_ref()
            .and_then(|field| field.height_at(x, z))
            .unwrap_or(0.0)
    }

    /// Random ground position inside the walls, at least `min_distance`
    /// from `avoid` when a spot is found within a few attempts.
    fn random_spot(&self, rng: &mut SceneRng, avoid: Vec3, min_distance: f32) -> Vec3 {
        let (min, max) = match &self.terrain {
            Some(field) => field.extent(),
            None => (Vec3::splat(-50.0), Vec3::splat(50.0)),
        };
        let margin = 4.0;
        let mut spot = avoid;
        for _ in 0..PLACEMENT_ATTEMPTS {
            let x = rng.range(min.x + margin, max.x - margin);
            let z = rng.range(min.z + margin, max.z - margin);
            spot = Vec3::new(x, self.ground_height(x, z), z);
            let mut flat = spot - avoid;
            flat.y = 0.0;
            if flat.length() >= min_distance {
                break;
            }
        }
        spot
    }

    fn build_static_geometry(&mut self) {
        let Some(field) = &self.terrain else {
            return;
        };
        let volume = field.bounding_volume(self.config.terrain.headroom);
        let (min, max) = field.extent();
        let center = field.center();
        self.registry.add(Transform::default(), volume, EntityState::Terrain);

        let h = self.config.decor.wall_height;
        let span = max - min;
        let walls = [
            (Vec3::new(center.x, 0.0, min.z), Vec3::new(span.x * 0.5, h * 0.5, 0.5)),
            (Vec3::new(center.x, 0.0, max.z), Vec3::new(span.x * 0.5, h * 0.5, 0.5)),
            (Vec3::new(min.x, 0.0, center.z), Vec3::new(0.5, h * 0.5, span.z * 0.5)),
            (Vec3::new(max.x, 0.0, center.z), Vec3::new(0.5, h * 0.5, span.z * 0.5)),
        ];
        for (mut position, extents) in walls {
            position.y = self.ground_height(position.x, position.z) + extents.y;
            self.registry.add(
                Transform::at(position),
                BoundingVolume::Box {
                    center: Vec3::ZERO,
                    extents,
                },
                EntityState::Wall,
            );
        }

        let mirror_at = Vec3::new(center.x, 0.0, min.z + 2.0);
        let mirror_extents = Vec3::new(6.0, 3.0, 0.1);
        self.registry.add(
            Transform::at(mirror_at + Vec3::Y * (self.ground_height(mirror_at.x, mirror_at.z) + mirror_extents.y)),
            BoundingVolume::Box {
                center: Vec3::ZERO,
                extents: mirror_extents,
            },
            EntityState::Mirror,
        );
    }

    fn build_actors(&mut self, rng: &mut SceneRng) {
        let start = self
            .terrain
            .as_ref()
            .map(HeightField::center)
            .unwrap_or(Vec3::ZERO);
        let half = self.config.player.size * 0.5;
        let player = self.registry.add(
            Transform::at(Vec3::new(start.x, self.ground_height(start.x, start.z) + half, start.z)),
            BoundingVolume::cube(half),
            EntityState::Player(PlayerState::new(self.config.player.health, self.config.player.speed)),
        );
        self.player = Some(player);

        let enemies = self.config.enemies;
        let start = Vec3::new(start.x, 0.0, start.z);
        for _ in 0..enemies.count {
            let spot = self.random_spot(rng, start, enemies.min_spawn_distance);
            let half = enemies.size * 0.5;
            self.registry.add(
                Transform::at(spot + Vec3::Y * half),
                BoundingVolume::cube(half),
                EntityState::Enemy(EnemyState {
                    health: enemies.health,
                    contact_damage: enemies.contact_damage,
                    contact: enemies.contact,
                    speed: enemies.speed,
                }),
            );
        }
    }

    fn build_decoration(&mut self, rng: &mut SceneRng) {
        let center = self
            .terrain
            .as_ref()
            .map(HeightField::center)
            .unwrap_or(Vec3::ZERO);
        for _ in 0..self.config.decor.trees {
            let spot = self.random_spot(rng, center, 8.0);
            self.registry.add(
                Transform::at(spot),
                BoundingVolume::Box {
                    center: Vec3::new(0.0, 3.0, 0.0),
                    extents: Vec3::new(1.0, 3.0, 1.0),
                },
                EntityState::Billboard(BillboardState::permanent(BillboardKind::Tree)),
            );
        }
        for _ in 0..self.config.decor.smoke {
            let spot = self.random_spot(rng, center, 0.0);
            self.registry.add(
                Transform::at(spot + Vec3::Y * rng.range(8.0, 16.0)),
                BoundingVolume::sphere(2.0),
                EntityState::Billboard(BillboardState::permanent(BillboardKind::Smoke)),
            );
        }
        self.registry.add(
            Transform::at(center),
            BoundingVolume::cube(SKYBOX_HALF_SIZE),
            EntityState::Billboard(BillboardState::permanent(BillboardKind::SkyBox)),
        );
    }

    fn build_lights(&mut self) {
        let lighting = self.config.lighting;
        self.lights.set_global_ambient(lighting.global_ambient);
        if let Some(player) = self.player {
            let light = Light {
                attachment: Some(LightAttachment {
                    entity: player,
                    offset: lighting.spot_offset,
                }),
                ..Light::spot(
                    Vec3::ZERO,
                    Vec3::NEG_Z,
                    lighting.spot_range,
                    lighting.spot_inner_degrees.to_radians(),
                    lighting.spot_outer_degrees.to_radians(),
                )
            };
            self.lights.set_light(0, light);
        }
    }

    fn follow_player(&mut self) {
        if self.flags.free_camera {
            return;
        }
        let Some(player) = self.player.and_then(|id| self.registry.get_active(id)) else {
            return;
        };
        let (position, facing) = (player.transform.position, player.transform.forward());
        let camera = self.config.camera;
        self.camera
            .follow(position, facing, camera.follow_distance, camera.follow_height);
    }

    /// One bar floating above each visible enemy, scaled by remaining health.
    fn health_bars(&self) -> Vec<UiQuad> {
        let max_health = self.config.enemies.health.max(f32::EPSILON);
        let mut bars = Vec::new();
        self.registry.for_each_active(|e| {
            let Some(enemy) = e.as_enemy() else {
                return;
            };
            let top = e.world_bounds().bounds().1;
            let anchor = Vec3::new(e.transform.position.x, top.y + HP_BAR_LIFT, e.transform.position.z);
            let Some(pixel) = self.camera.world_to_screen(anchor) else {
                return;
            };
            let fraction = (enemy.health / max_health).clamp(0.0, 1.0);
            bars.push(UiQuad {
                label: format!("hp {}", e.id()),
                rect: [pixel.x - HP_BAR_WIDTH * 0.5, pixel.y, HP_BAR_WIDTH * fraction, 4.0],
                highlighted: fraction < 0.25,
            });
        });
        bars
    }

    fn hud(&self) -> Vec<UiQuad> {
        let mut ui = Vec::new();
        if let Some(state) = self.player().and_then(Entity::as_player) {
            let fraction = (state.health / state.max_health).clamp(0.0, 1.0);
            ui.push(UiQuad {
                label: format!("health {:.0}", state.health.max(0.0)),
                rect: [16.0, 16.0, 200.0 * fraction, 12.0],
                highlighted: fraction < 0.25,
            });
        }
        ui.extend(self.health_bars());
        if self.flags.cursor_active {
            let c = self.input.cursor();
            ui.push(UiQuad {
                label: "cursor".into(),
                rect: [c.x - 4.0, c.y - 4.0, 8.0, 8.0],
                highlighted: self.registry.selection().is_some(),
            });
        }
        ui
    }
}

impl SceneCapability for GameScene {
    fn kind(&self) -> SceneKind {
        SceneKind::Game
    }

    fn state(&self) -> LifecycleState {
        self.state
    }

    fn on_create(&mut self, uploader: &mut dyn ResourceUploader, fence: u64) -> Result<(), SceneError> {
        self.state.require("on_create", LifecycleState::Uninitialized)?;
        let t = self.config.terrain;
        self.terrain = Some(HeightField::generate(
            t.width,
            t.depth,
            t.cell_size,
            t.amplitude,
            self.config.seed,
        ));
        if let Err(err) = self.create_resources(uploader, fence) {
            tracing::warn!(%err, "game scene resource creation failed");
            self.free_resources(uploader);
            return Err(err.into());
        }
        tracing::debug!(resources = self.resources.len(), fence, "game scene resources created");
        self.state.advance(LifecycleState::Built)
    }

    fn build_objects(&mut self, uploader: &mut dyn ResourceUploader) -> Result<(), SceneError> {
        self.state.require("build_objects", LifecycleState::Built)?;
        let _span = tracing::info_span!("build_objects", seed = self.config.seed).entered();
        let mut rng = SceneRng::new(self.config.seed);

        self.build_static_geometry();
        self.build_actors(&mut rng);
        self.build_decoration(&mut rng);
        self.build_lights();
        self.follow_player();
        self.lights.rebuild(&self.registry, uploader)?;
        self.registry.drain_events();

        tracing::info!(
            entities = self.registry.len(),
            enemies = self.registry.count_active(EntityKind::Enemy),
            "game scene built"
        );
        Ok(())
    }

    fn activate(&mut self) -> Result<(), SceneError> {
        self.state.advance(LifecycleState::Active)
    }

    fn process_mouse(&mut self, event: MouseEvent) -> Option<SceneKind> {
        if self.state != LifecycleState::Active {
            return None;
        }
        let action = self.input.mouse(event, self.flags.cursor_active);
        self.handle(action)
    }

    fn process_keyboard(&mut self, event: KeyEvent) -> Option<SceneKind> {
        if self.state != LifecycleState::Active {
            return None;
        }
        let action = self.input.key(event);
        self.handle(action)
    }

    fn process_input(&mut self, dt: f32) {
        if self.state != LifecycleState::Active {
            return;
        }
        let movement = self.input.movement();
        if movement == Vec3::ZERO {
            return;
        }
        if self.flags.free_camera {
            self.camera.fly(movement, dt);
            return;
        }
        let Some(player) = self.player.and_then(|id| self.registry.get_active_mut(id)) else {
            return;
        };
        let Some(speed) = player.as_player().map(|p| p.speed) else {
            return;
        };
        let mut forward = player.transform.forward();
        forward.y = 0.0;
        let forward = forward.normalize_or_zero();
        let right = forward.cross(Vec3::Y);
        let step = (right * movement.x + forward * movement.z).normalize_or_zero();
        player.transform.position += step * speed * dt;
    }

    fn update(
        &mut self,
        frame: u64,
        dt: f32,
        uploader: &mut dyn ResourceUploader,
    ) -> Result<FrameSubmission, SceneError> {
        self.state.require("update", LifecycleState::Active)?;
        let _span = tracing::info_span!("frame", frame).entered();

        let ground = if self.flags.solid_terrain {
            self.terrain.as_ref()
        } else {
            None
        };
        let expired = self.registry.animate(dt, ground);
        let report = self.interactions.run(&mut self.registry, ground, dt);
        if report.player_killed {
            tracing::info!(frame, "player destroyed");
        }
        self.frame_events = self.registry.drain_events();
        tracing::trace!(
            expired = expired.len(),
            events = self.frame_events.len(),
            active = self.registry.active_count(),
            "frame simulated"
        );

        self.follow_player();
        self.lights.rebuild(&self.registry, uploader)?;

        let mut submission = FrameSubmission::from_registry(frame, &self.camera, &self.registry, &self.lights);
        submission.ui = self.hud();
        Ok(submission)
    }

    fn release_upload_buffers(&mut self, completed_fence: u64, uploader: &mut dyn ResourceUploader) -> usize {
        self.uploads.retire(completed_fence, uploader)
    }

    fn release_objects(&mut self, retired: &mut UploadTracker, fence: u64) -> Result<(), SceneError> {
        self.state.advance(LifecycleState::Releasing)?;
        // Shader variables first, then object resources, upload buffers last.
        if let Some(handle) = self.lights.take_mapped() {
            retired.defer(fence, handle);
        }
        for handle in self.resources.drain(..) {
            retired.defer(fence, handle);
        }
        self.uploads.hand_over(fence, retired);
        self.registry = Registry::new();
        self.frame_events.clear();
        self.player = None;
        self.input.clear();
        tracing::debug!("game scene released");
        Ok(())
    }

    fn on_destroy(&mut self) -> Result<(), SceneError> {
        self.state.advance(LifecycleState::Destroyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_input::{Key, MouseButton};
    use skirmish_kernel::ContactMode;
    use skirmish_render::HostUploader;

    fn flat_config() -> SceneConfig {
        let mut config = SceneConfig::default();
        config.terrain.amplitude = 0.0;
        config.flags.solid_terrain = false;
        config
    }

    fn active_game(config: SceneConfig, uploader: &mut HostUploader) -> GameScene {
        let mut game = GameScene::new(config);
        game.on_create(uploader, 1).unwrap();
        game.build_objects(uploader).unwrap();
        game.activate().unwrap();
        game
    }

    #[test]
    fn build_populates_every_category() {
        let mut up = HostUploader::new();
        let game = active_game(SceneConfig::default(), &mut up);
        let r = game.registry();
        assert_eq!(r.count_active(EntityKind::Player), 1);
        assert_eq!(r.count_active(EntityKind::Enemy), 8);
        assert_eq!(r.count_active(EntityKind::Terrain), 1);
        assert_eq!(r.count_active(EntityKind::Wall), 4);
        assert_eq!(r.count_active(EntityKind::Mirror), 1);
        assert_eq!(r.count_active(EntityKind::Billboard(BillboardKind::Tree)), 12);
        assert_eq!(r.count_active(EntityKind::Billboard(BillboardKind::Smoke)), 3);
        assert_eq!(r.count_active(EntityKind::Billboard(BillboardKind::SkyBox)), 1);
        assert!(r.events().is_empty());
    }

    #[test]
    fn same_seed_builds_the_same_scene() {
        let mut up = HostUploader::new();
        let a = active_game(SceneConfig::default(), &mut up);
        let b = active_game(SceneConfig::default(), &mut up);
        let positions = |g: &GameScene| -> Vec<Vec3> {
            g.registry().iter().map(|e| e.transform.position).collect()
        };
        assert_eq!(positions(&a), positions(&b));
    }

    #[test]
    fn enemies_spawn_away_from_the_player() {
        let mut up = HostUploader::new();
        let game = active_game(SceneConfig::default(), &mut up);
        let player = game.player().unwrap().transform.position;
        let player_box = game.player().unwrap().world_bounds();
        for enemy in game.registry().iter_active().filter(|e| e.kind() == EntityKind::Enemy) {
            assert!(!enemy.world_bounds().intersects(&player_box));
            let mut flat = enemy.transform.position - player;
            flat.y = 0.0;
            assert!(flat.length() > 1.0);
        }
    }

    #[test]
    fn spot_light_follows_the_player() {
        let mut up = HostUploader::new();
        let mut game = active_game(flat_config(), &mut up);
        let offset = game.config().lighting.spot_offset;
        game.process_keyboard(KeyEvent::press(Key::D));
        for frame in 1..=10 {
            game.process_input(1.0 / 60.0);
            game.update(frame, 1.0 / 60.0, &mut up).unwrap();
        }
        let player = game.player().unwrap().transform.position;
        let light = game.lights().mirror().lights[0];
        assert_eq!(light.is_active, 1);
        assert!((Vec3::from_array(light.position) - (player + offset)).length() < 1e-4);
        let mapped = up.contents(game.lights().mapped().unwrap()).unwrap();
        assert_eq!(mapped, bytemuck::bytes_of(game.lights().mirror()));
    }

    #[test]
    fn fire_respects_cooldown() {
        let mut up = HostUploader::new();
        let mut game = active_game(flat_config(), &mut up);
        assert!(game.fire().is_some());
        assert!(game.fire().is_none());
        // Cooldown 0.25s elapses over 16 frames.
        for frame in 1..=16 {
            game.update(frame, 1.0 / 60.0, &mut up).unwrap();
        }
        assert!(game.fire().is_some());
    }

    #[test]
    fn bullet_kills_enemy_and_leaves_explosion() {
        let mut config = flat_config();
        config.enemies.count = 0;
        let mut up = HostUploader::new();
        let mut game = active_game(config, &mut up);
        let player = game.player().unwrap().transform.position;
        let enemy = game.registry_mut().add(
            Transform::at(player + Vec3::new(0.0, 0.0, -6.0)),
            BoundingVolume::cube(0.5),
            EntityState::Enemy(EnemyState {
                health: 10.0,
                contact_damage: 15.0,
                contact: ContactMode::Consume,
                speed: 1.0,
            }),
        );

        assert_eq!(game.process_keyboard(KeyEvent::press(Key::Space)), None);
        let mut kills = 0;
        let mut explosions = 0;
        for frame in 1..=20 {
            game.update(frame, 1.0 / 60.0, &mut up).unwrap();
            kills += game.last_interactions().kills.len();
            explosions += game.last_interactions().spawned.len();
        }
        assert!(!game.registry().is_active(enemy));
        assert_eq!(kills, 1);
        assert_eq!(explosions, 1);
        assert_eq!(
            game.registry()
                .count_active(EntityKind::Billboard(BillboardKind::ExplodedEnemy)),
            1
        );
        assert_eq!(game.player().and_then(Entity::health), Some(100.0));
    }

    #[test]
    fn visible_enemies_get_health_bars() {
        let mut config = flat_config();
        config.enemies.count = 0;
        let mut up = HostUploader::new();
        let mut game = active_game(config, &mut up);
        let player = game.player().unwrap().transform.position;
        let forward = game.player().unwrap().transform.forward();
        let enemy = game.registry_mut().add(
            Transform::at(player + forward * 6.0),
            BoundingVolume::cube(0.5),
            EntityState::Enemy(EnemyState {
                health: 15.0,
                contact_damage: 15.0,
                contact: ContactMode::Consume,
                speed: 0.0,
            }),
        );

        let frame = game.update(1, 1.0 / 60.0, &mut up).unwrap();
        let label = format!("hp {enemy}");
        let bar = frame.ui.iter().find(|q| q.label == label).unwrap();
        // Half of the configured 30 health.
        assert!((bar.rect[2] - HP_BAR_WIDTH * 0.5).abs() < 1e-4);
        assert!(!bar.highlighted);
        assert_eq!(frame.ui.iter().filter(|q| q.label.starts_with("hp ")).count(), 1);
    }

    #[test]
    fn event_log_holds_only_the_last_frame() {
        let mut config = flat_config();
        config.enemies.count = 0;
        config.player.fire_cooldown = 0.0;
        let mut up = HostUploader::new();
        let mut game = active_game(config, &mut up);

        for frame in 1..=2_000 {
            game.fire();
            game.update(frame, 0.5, &mut up).unwrap();
            assert!(game.registry().events().is_empty());
            assert!(game.last_events().len() <= 8);
        }
        assert!(
            game.last_events()
                .iter()
                .any(|e| matches!(e, RegistryEvent::Added { kind: EntityKind::Bullet, .. }))
        );
    }

    #[test]
    fn function_keys_toggle_flags_and_escape_requests_title() {
        let mut up = HostUploader::new();
        let mut game = active_game(SceneConfig::default(), &mut up);
        let before = game.flags();
        game.process_keyboard(KeyEvent::press(Key::F1));
        game.process_keyboard(KeyEvent::press(Key::F2));
        game.process_keyboard(KeyEvent::press(Key::F3));
        assert_eq!(game.flags().free_camera, !before.free_camera);
        assert_eq!(game.flags().solid_terrain, !before.solid_terrain);
        assert_eq!(game.flags().cursor_active, !before.cursor_active);
        assert_eq!(game.process_keyboard(KeyEvent::press(Key::Escape)), Some(SceneKind::Title));
    }

    #[test]
    fn click_picks_with_cursor_and_fires_without() {
        let mut config = flat_config();
        config.enemies.count = 0;
        config.decor.trees = 0;
        config.decor.smoke = 0;
        let mut up = HostUploader::new();
        let mut game = active_game(config, &mut up);
        let bullets = |g: &GameScene| g.registry().count_active(EntityKind::Bullet);

        let click = |x, y| MouseEvent::Pressed {
            button: MouseButton::Left,
            x,
            y,
        };
        game.process_mouse(click(640.0, 360.0));
        assert_eq!(bullets(&game), 1);
        assert_eq!(game.registry().selection(), None);

        game.flags_mut().cursor_active = true;
        let target = game.player().unwrap().transform.position;
        let camera = game.camera_mut();
        camera.position = target + Vec3::new(0.0, 0.0, 10.0);
        camera.look_at(target);
        game.process_mouse(click(640.0, 360.0));
        assert_eq!(bullets(&game), 1);
        let selected = game.get_selected().map(Entity::id);
        assert!(selected.is_some());

        // Up at the sky: nothing pickable there.
        game.camera_mut().look_at(target + Vec3::new(0.0, 1000.0, 9.0));
        game.process_mouse(click(640.0, 360.0));
        assert!(game.get_selected().is_none());
    }

    #[test]
    fn release_order_lights_then_objects_then_uploads() {
        let mut up = HostUploader::new();
        let mut game = active_game(SceneConfig::default(), &mut up);
        let light = game.lights().mapped().unwrap();
        let objects = game.resources.clone();
        let pending = game.pending_uploads();
        assert!(pending > 0);

        let mut retired = UploadTracker::new();
        game.release_objects(&mut retired, 4).unwrap();
        game.on_destroy().unwrap();
        assert_eq!(retired.pending_count(), 1 + objects.len() + pending);
        assert!(up.released().is_empty());

        // Staging was tagged with fence 1; nothing goes before fence 4.
        assert_eq!(retired.retire(3, &mut up), 0);
        retired.retire(4, &mut up);
        let released = up.released();
        assert_eq!(released[0], light);
        assert_eq!(&released[1..=objects.len()], objects.as_slice());
        assert_eq!(released.len(), 1 + objects.len() + pending);
        assert_eq!(up.live_count(), 0);
        assert!(game.registry().is_empty());
    }

    #[test]
    fn staging_waits_for_the_fence() {
        let mut up = HostUploader::new();
        let mut game = GameScene::new(SceneConfig::default());
        game.on_create(&mut up, 3).unwrap();
        let pending = game.pending_uploads();
        assert_eq!(game.release_upload_buffers(2, &mut up), 0);
        assert_eq!(game.release_upload_buffers(3, &mut up), pending);
        assert_eq!(game.pending_uploads(), 0);
    }

    #[test]
    fn allocation_failure_is_fatal_and_leaks_nothing() {
        let mut up = HostUploader::with_allocation_limit(3);
        let mut game = GameScene::new(SceneConfig::default());
        let err = game.on_create(&mut up, 1).unwrap_err();
        assert!(matches!(err, SceneError::Resource(_)));
        assert_eq!(up.live_count(), 0);
        assert_eq!(game.state(), LifecycleState::Uninitialized);
    }

    #[test]
    fn update_requires_an_active_scene() {
        let mut up = HostUploader::new();
        let mut game = GameScene::new(SceneConfig::default());
        assert!(game.update(1, 0.016, &mut up).is_err());
        game.on_create(&mut up, 1).unwrap();
        game.build_objects(&mut up).unwrap();
        let err = game.update(1, 0.016, &mut up).unwrap_err();
        assert!(matches!(err, SceneError::WrongState { .. }));
    }
}
