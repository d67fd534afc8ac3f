use std::collections::BTreeMap;
use std::fmt;

use glam::Vec3;
use skirmish_common::EntityId;
use skirmish_kernel::{EntityKind, Registry};
use skirmish_render::LightKind;
use skirmish_scene::{GameScene, SceneCapability, SceneDirector};

/// Read-only queries against a running scene for debugging and the CLI.
pub struct SceneInspector;

impl SceneInspector {
    /// Snapshot of the game scene's registry, player and light.
    pub fn summary(scene: &GameScene) -> SceneSummary {
        let registry = scene.registry();
        let light = scene.lights().light(0).filter(|l| l.active).map(|l| LightInfo {
            kind: l.kind,
            position: l.position,
            range: l.range,
        });
        SceneSummary {
            state: format!("{:?}", scene.state()),
            entities: registry.len(),
            active: registry.active_count(),
            by_kind: Self::count_by_kind(registry),
            player_health: scene.player().and_then(|p| p.health()),
            selected: registry.selection(),
            light,
            pending_uploads: scene.pending_uploads(),
            frame_events: scene.last_events().len(),
        }
    }

    /// Summary of whatever the director is currently running.
    pub fn director_summary(director: &SceneDirector) -> String {
        let header = format!(
            "Director: frame={} scene={:?} pending={}",
            director.frame(),
            director.current().kind(),
            director.pending_count()
        );
        match director.current().as_game() {
            Some(game) => format!("{header}\n{}", Self::summary(game)),
            None => header,
        }
    }

    /// Active entity counts keyed by label, in label order.
    pub fn count_by_kind(registry: &Registry) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        registry.for_each_active(|e| *counts.entry(e.kind().label()).or_insert(0) += 1);
        counts
    }

    pub fn inspect_entity(registry: &Registry, id: EntityId) -> Option<EntityInfo> {
        registry.get(id).map(|e| EntityInfo {
            id,
            kind: e.kind(),
            active: e.is_active(),
            position: e.transform.position,
            scale: e.transform.scale,
            health: e.health(),
        })
    }

    /// Active entities in registry order.
    pub fn list_active(registry: &Registry) -> Vec<EntityId> {
        registry.iter_active().map(|e| e.id()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightInfo {
    pub kind: LightKind,
    pub position: Vec3,
    pub range: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneSummary {
    pub state: String,
    pub entities: usize,
    pub active: usize,
    pub by_kind: BTreeMap<&'static str, usize>,
    pub player_health: Option<f32>,
    pub selected: Option<EntityId>,
    pub light: Option<LightInfo>,
    pub pending_uploads: usize,
    /// Registry mutations during the last frame.
    pub frame_events: usize,
}

impl fmt::Display for SceneSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Scene: state={} entities={} active={} pending_uploads={} frame_events={}",
            self.state, self.entities, self.active, self.pending_uploads, self.frame_events
        )?;
        let kinds: Vec<String> = self.by_kind.iter().map(|(k, n)| format!("{k}={n}")).collect();
        writeln!(f, "Kinds: {}", kinds.join(" "))?;
        match self.player_health {
            Some(hp) => writeln!(f, "Player: health={hp:.1}")?,
            None => writeln!(f, "Player: none")?,
        }
        match self.selected {
            Some(id) => writeln!(f, "Selected: {id}")?,
            None => writeln!(f, "Selected: none")?,
        }
        match &self.light {
            Some(l) => write!(
                f,
                "Light: {:?} pos=({:.2}, {:.2}, {:.2}) range={:.1}",
                l.kind, l.position.x, l.position.y, l.position.z, l.range
            ),
            None => write!(f, "Light: off"),
        }
    }
}

/// One entity's identity and placement.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInfo {
    pub id: EntityId,
    pub kind: EntityKind,
    pub active: bool,
    pub position: Vec3,
    pub scale: Vec3,
    pub health: Option<f32>,
}

impl fmt::Display for EntityInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Entity [{}] {} pos=({:.2}, {:.2}, {:.2}) scale=({:.2}, {:.2}, {:.2})",
            self.id,
            self.kind.label(),
            self.position.x,
            self.position.y,
            self.position.z,
            self.scale.x,
            self.scale.y,
            self.scale.z,
        )?;
        if let Some(hp) = self.health {
            write!(f, " hp={hp:.1}")?;
        }
        if !self.active {
            write!(f, " (inactive)")?;
        }
        Ok(())
    }
}
