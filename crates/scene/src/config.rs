use std::path::Path;

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};
use skirmish_interact::InteractionConfig;
use skirmish_kernel::ContactMode;

/// Toggles flipped at runtime by the function keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneFlags {
    /// Camera flies freely instead of following the player.
    pub free_camera: bool,
    /// Grounded entities stay on the height field and bullets stop at it.
    pub solid_terrain: bool,
    /// Left click picks instead of firing.
    pub cursor_active: bool,
}

impl Default for SceneFlags {
    fn default() -> Self {
        Self {
            free_camera: false,
            solid_terrain: true,
            cursor_active: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub health: f32,
    pub speed: f32,
    /// Seconds between shots.
    pub fire_cooldown: f32,
    pub size: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            health: 100.0,
            speed: 12.0,
            fire_cooldown: 0.25,
            size: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyConfig {
    pub count: usize,
    pub health: f32,
    pub contact_damage: f32,
    pub contact: ContactMode,
    pub speed: f32,
    pub size: f32,
    /// Enemies spawn no closer than this to the player.
    pub min_spawn_distance: f32,
}

impl Default for EnemyConfig {
    fn default() -> Self {
        Self {
            count: 8,
            health: 30.0,
            contact_damage: 15.0,
            contact: ContactMode::Consume,
            speed: 4.0,
            size: 1.0,
            min_spawn_distance: 20.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulletConfig {
    pub speed: f32,
    pub damage: f32,
    pub lifetime: f32,
    pub radius: f32,
}

impl Default for BulletConfig {
    fn default() -> Self {
        Self {
            speed: 60.0,
            damage: 10.0,
            lifetime: 2.0,
            radius: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Samples along X.
    pub width: usize,
    /// Samples along Z.
    pub depth: usize,
    pub cell_size: f32,
    pub amplitude: f32,
    /// Playfield height above the highest sample.
    pub headroom: f32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            width: 65,
            depth: 65,
            cell_size: 2.0,
            amplitude: 6.0,
            headroom: 60.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecorConfig {
    pub trees: usize,
    pub smoke: usize,
    pub wall_height: f32,
}

impl Default for DecorConfig {
    fn default() -> Self {
        Self {
            trees: 12,
            smoke: 3,
            wall_height: 4.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub global_ambient: Vec4,
    /// Player-mounted spot light.
    pub spot_offset: Vec3,
    pub spot_range: f32,
    /// Inner half-angle, degrees.
    pub spot_inner_degrees: f32,
    /// Outer half-angle, degrees.
    pub spot_outer_degrees: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            global_ambient: Vec4::new(0.15, 0.15, 0.2, 1.0),
            spot_offset: Vec3::new(0.0, 1.5, 0.0),
            spot_range: 80.0,
            spot_inner_degrees: 15.0,
            spot_outer_degrees: 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub follow_distance: f32,
    pub follow_height: f32,
    pub fly_speed: f32,
    pub sensitivity: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            follow_distance: 14.0,
            follow_height: 7.0,
            fly_speed: 30.0,
            sensitivity: 0.003,
        }
    }
}

/// Everything tunable about a game scene. Missing JSON fields take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Seeds terrain and placement.
    pub seed: u64,
    pub flags: SceneFlags,
    pub player: PlayerConfig,
    pub enemies: EnemyConfig,
    pub bullets: BulletConfig,
    pub terrain: TerrainConfig,
    pub decor: DecorConfig,
    pub lighting: LightingConfig,
    pub camera: CameraConfig,
    pub interaction: InteractionConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            flags: SceneFlags::default(),
            player: PlayerConfig::default(),
            enemies: EnemyConfig::default(),
            bullets: BulletConfig::default(),
            terrain: TerrainConfig::default(),
            decor: DecorConfig::default(),
            lighting: LightingConfig::default(),
            camera: CameraConfig::default(),
            interaction: InteractionConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl SceneConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json_str(&json)?;
        tracing::info!(path = %path.display(), seed = config.seed, "scene config loaded");
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.terrain.width < 2 || self.terrain.depth < 2 {
            return Err(ConfigError::Invalid("terrain needs at least 2x2 samples".into()));
        }
        if self.terrain.cell_size <= 0.0 {
            return Err(ConfigError::Invalid("terrain cell_size must be positive".into()));
        }
        if self.bullets.lifetime <= 0.0 {
            return Err(ConfigError::Invalid("bullet lifetime must be positive".into()));
        }
        if self.lighting.spot_inner_degrees > self.lighting.spot_outer_degrees {
            return Err(ConfigError::Invalid("spot inner angle exceeds outer angle".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_is_all_defaults() {
        let config = SceneConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SceneConfig::default());
    }

    #[test]
    fn partial_json_overrides_fields() {
        let json = r#"{
            "seed": 7,
            "flags": { "free_camera": true },
            "enemies": { "count": 2, "contact": "persist" },
            "interaction": { "knockback_speed": 5.0 }
        }"#;
        let config = SceneConfig::from_json_str(json).unwrap();
        assert_eq!(config.seed, 7);
        assert!(config.flags.free_camera);
        assert!(config.flags.solid_terrain);
        assert_eq!(config.enemies.count, 2);
        assert_eq!(config.enemies.contact, ContactMode::Persist);
        assert_eq!(config.enemies.health, EnemyConfig::default().health);
        assert_eq!(config.interaction.knockback_speed, 5.0);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = SceneConfig::from_json_str(r#"{ "terrain": { "width": 1 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = SceneConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn pretty_json_reloads() {
        let config = SceneConfig {
            seed: 99,
            ..SceneConfig::default()
        };
        let json = config.to_json_pretty().unwrap();
        assert_eq!(SceneConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = SceneConfig::load("/nonexistent/skirmish.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/skirmish.json"));
    }
}
