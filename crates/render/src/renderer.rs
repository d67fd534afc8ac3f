use std::fmt::Write as _;

use glam::{Mat4, Vec3};
use skirmish_common::{EntityId, Transform};
use skirmish_kernel::{EntityKind, Registry};

use crate::camera::Camera;
use crate::light::{LightBuffer, LightBufferData};
use crate::upload::ResourceHandle;

/// One drawable entity as the renderer sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderItem {
    pub id: EntityId,
    pub kind: EntityKind,
    pub transform: Transform,
    pub selected: bool,
}

/// Screen-space 2D element. `rect` is `[x, y, width, height]` in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct UiQuad {
    pub label: String,
    pub rect: [f32; 4],
    pub highlighted: bool,
}

/// Everything the renderer needs for one frame, captured after simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSubmission {
    pub frame: u64,
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
    pub items: Vec<RenderItem>,
    pub lights: LightBufferData,
    pub light_buffer: Option<ResourceHandle>,
    pub ui: Vec<UiQuad>,
}

impl FrameSubmission {
    /// Snapshot the active entities in registry order.
    pub fn from_registry(frame: u64, camera: &Camera, registry: &Registry, lights: &LightBuffer) -> Self {
        let selection = registry.selection();
        let items = registry
            .iter_active()
            .map(|e| RenderItem {
                id: e.id(),
                kind: e.kind(),
                transform: e.transform,
                selected: selection == Some(e.id()),
            })
            .collect();
        Self {
            frame,
            view: camera.view_matrix(),
            projection: camera.projection_matrix(),
            camera_position: camera.position,
            items,
            lights: *lights.mirror(),
            light_buffer: lights.mapped(),
            ui: Vec::new(),
        }
    }

    /// Screen-only frame, used by scenes without a world.
    pub fn ui_only(frame: u64, ui: Vec<UiQuad>) -> Self {
        Self {
            frame,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            camera_position: Vec3::ZERO,
            items: Vec::new(),
            lights: LightBufferData::default(),
            light_buffer: None,
            ui,
        }
    }
}

/// Renderer-agnostic interface.
///
/// The renderer reads a finished submission and produces output. It never
/// sees the registry.
pub trait Renderer {
    type Output;

    fn render(&self, frame: &FrameSubmission) -> Self::Output;
}

/// Produces a human-readable dump of a frame. Used by the CLI and tests.
#[derive(Debug, Default)]
pub struct DebugTextRenderer;

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&self, frame: &FrameSubmission) -> String {
        let mut out = String::new();
        let c = frame.camera_position;
        let _ = writeln!(out, "=== Frame {} ===", frame.frame);
        let _ = writeln!(out, "Items: {}", frame.items.len());
        let _ = writeln!(out, "Camera: ({:.1}, {:.1}, {:.1})", c.x, c.y, c.z);

        for item in &frame.items {
            let p = item.transform.position;
            let marker = if item.selected { "*" } else { " " };
            let _ = writeln!(
                out,
                " {marker}[{}] {:<14} pos=({:.2}, {:.2}, {:.2})",
                item.id,
                item.kind.label(),
                p.x,
                p.y,
                p.z
            );
        }

        for (slot, light) in frame.lights.lights.iter().enumerate() {
            if light.is_active == 0 {
                let _ = writeln!(out, "Light {slot}: off");
                continue;
            }
            let [x, y, z] = light.position;
            let _ = writeln!(
                out,
                "Light {slot}: type={} pos=({x:.2}, {y:.2}, {z:.2}) range={:.1}",
                light.kind, light.range
            );
        }

        for quad in &frame.ui {
            let marker = if quad.highlighted { ">" } else { " " };
            let _ = writeln!(out, "{marker} [{}]", quad.label);
        }

        out
    }
}
