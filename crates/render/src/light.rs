use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};
use skirmish_common::EntityId;
use skirmish_kernel::Registry;

use crate::upload::{BufferDesc, BufferUsage, Residency, ResourceHandle, ResourceUploader, UploadError};

/// Number of light slots in the constant buffer.
pub const MAX_LIGHTS: usize = 1;

/// Fallback range when attenuation never drops below the cutoff.
const UNBOUNDED_RANGE: f32 = 1000.0;
/// Attenuation denominator at which a light is considered out of range.
const RANGE_CUTOFF: f32 = 256.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightKind {
    Point,
    Spot,
    Directional,
}

impl LightKind {
    /// Shader-side discriminant.
    pub fn code(self) -> i32 {
        match self {
            Self::Point => 1,
            Self::Spot => 2,
            Self::Directional => 3,
        }
    }
}

/// Ties a light to an entity. The light takes the entity's position (plus
/// `offset`) and facing each rebuild, and goes dark once the entity is gone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightAttachment {
    pub entity: EntityId,
    pub offset: Vec3,
}

/// Authored light description.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Light {
    pub active: bool,
    pub kind: LightKind,
    pub position: Vec3,
    pub direction: Vec3,
    pub diffuse: Vec4,
    pub ambient: Vec4,
    pub specular: Vec4,
    /// Constant, linear and quadratic attenuation factors.
    pub attenuation: Vec3,
    pub falloff: f32,
    /// Zero or negative means "derive from attenuation".
    pub range: f32,
    /// Spot inner half-angle, radians.
    pub theta: f32,
    /// Spot outer half-angle, radians.
    pub phi: f32,
    #[serde(skip)]
    pub attachment: Option<LightAttachment>,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            active: false,
            kind: LightKind::Point,
            position: Vec3::ZERO,
            direction: Vec3::NEG_Y,
            diffuse: Vec4::ONE,
            ambient: Vec4::new(0.1, 0.1, 0.1, 1.0),
            specular: Vec4::new(0.5, 0.5, 0.5, 0.0),
            attenuation: Vec3::new(1.0, 0.01, 0.0001),
            falloff: 1.0,
            range: 0.0,
            theta: 0.0,
            phi: 0.0,
            attachment: None,
        }
    }
}

impl Light {
    pub fn spot(position: Vec3, direction: Vec3, range: f32, theta: f32, phi: f32) -> Self {
        Self {
            active: true,
            kind: LightKind::Spot,
            position,
            direction,
            range,
            theta,
            phi,
            falloff: 8.0,
            ..Self::default()
        }
    }

    pub fn directional(direction: Vec3) -> Self {
        Self {
            active: true,
            kind: LightKind::Directional,
            direction,
            ..Self::default()
        }
    }

    /// Distance at which attenuation reaches the cutoff.
    fn effective_range(&self) -> f32 {
        if self.range > 0.0 {
            return self.range;
        }
        let [c, l, q] = self.attenuation.to_array();
        let target = RANGE_CUTOFF - c;
        if target <= 0.0 {
            return 0.0;
        }
        if q > 0.0 {
            (-l + (l * l + 4.0 * q * target).sqrt()) / (2.0 * q)
        } else if l > 0.0 {
            target / l
        } else {
            UNBOUNDED_RANGE
        }
    }
}

/// One light as laid out in the shader constant buffer.
///
/// Matches HLSL packing: every `float3` shares its 16-byte register with the
/// following scalar, and the trailing pad rounds the struct to 112 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    pub is_active: u32,
    pub position: [f32; 3],
    pub direction: [f32; 3],
    pub kind: i32,
    pub diffuse: [f32; 4],
    pub ambient: [f32; 4],
    pub specular: [f32; 4],
    pub attenuation: [f32; 3],
    pub falloff: f32,
    pub range: f32,
    /// Cosine of the inner half-angle.
    pub theta: f32,
    /// Cosine of the outer half-angle.
    pub phi: f32,
    pub padding: f32,
}

/// Full constant-buffer contents.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightBufferData {
    pub lights: [GpuLight; MAX_LIGHTS],
    pub global_ambient: [f32; 4],
}

const _: () = assert!(std::mem::size_of::<GpuLight>() == 112);
const _: () = assert!(std::mem::size_of::<LightBufferData>() == 112 * MAX_LIGHTS + 16);

impl Default for LightBufferData {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Fixed-capacity light set with a CPU mirror and a GPU-mapped copy.
///
/// The mirror is the source of truth for what the renderer sees; it changes
/// only in [`LightBuffer::rebuild`], which copies it to the mapped region in
/// the same call.
#[derive(Debug)]
pub struct LightBuffer {
    lights: [Light; MAX_LIGHTS],
    global_ambient: Vec4,
    mirror: LightBufferData,
    mapped: Option<ResourceHandle>,
    revision: u64,
}

impl Default for LightBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LightBuffer {
    pub fn new() -> Self {
        Self {
            lights: [Light::default(); MAX_LIGHTS],
            global_ambient: Vec4::new(0.1, 0.1, 0.1, 1.0),
            mirror: LightBufferData::default(),
            mapped: None,
            revision: 0,
        }
    }

    /// Allocate the mapped constant buffer. Replaces nothing if already created.
    pub fn create(&mut self, uploader: &mut dyn ResourceUploader) -> Result<ResourceHandle, UploadError> {
        if let Some(handle) = self.mapped {
            return Ok(handle);
        }
        let desc = BufferDesc {
            label: "lights",
            size: std::mem::size_of::<LightBufferData>() as u64,
            residency: Residency::Upload,
            usage: BufferUsage::Uniform,
        };
        let allocation = uploader.create_buffer(&desc, Some(bytemuck::bytes_of(&self.mirror)))?;
        self.mapped = Some(allocation.resource);
        Ok(allocation.resource)
    }

    pub fn release(&mut self, uploader: &mut dyn ResourceUploader) {
        if let Some(handle) = self.mapped.take() {
            uploader.release(handle);
        }
    }

    /// Detach the mapped region without freeing it; the caller owns it now.
    pub fn take_mapped(&mut self) -> Option<ResourceHandle> {
        self.mapped.take()
    }

    pub fn mapped(&self) -> Option<ResourceHandle> {
        self.mapped
    }

    pub fn light(&self, slot: usize) -> Option<&Light> {
        self.lights.get(slot)
    }

    pub fn light_mut(&mut self, slot: usize) -> Option<&mut Light> {
        self.lights.get_mut(slot)
    }

    /// Store a light in a slot. Returns `false` when the slot does not exist.
    pub fn set_light(&mut self, slot: usize, light: Light) -> bool {
        match self.lights.get_mut(slot) {
            Some(existing) => {
                *existing = light;
                true
            }
            None => false,
        }
    }

    pub fn global_ambient(&self) -> Vec4 {
        self.global_ambient
    }

    pub fn set_global_ambient(&mut self, ambient: Vec4) {
        self.global_ambient = ambient;
    }

    pub fn active_count(&self) -> usize {
        self.mirror.lights.iter().filter(|l| l.is_active != 0).count()
    }

    /// Number of completed rebuilds.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn mirror(&self) -> &LightBufferData {
        &self.mirror
    }

    /// Recompute derived fields, refresh the mirror, copy it to the mapped region.
    pub fn rebuild(
        &mut self,
        registry: &Registry,
        uploader: &mut dyn ResourceUploader,
    ) -> Result<(), UploadError> {
        let mut next = LightBufferData {
            global_ambient: self.global_ambient.to_array(),
            ..LightBufferData::default()
        };
        for (slot, light) in next.lights.iter_mut().zip(&self.lights) {
            *slot = derive(light, registry);
        }
        self.mirror = next;
        if let Some(handle) = self.mapped {
            uploader.write_mapped(handle, 0, bytemuck::bytes_of(&self.mirror))?;
        }
        self.revision += 1;
        tracing::trace!(
            revision = self.revision,
            active = self.active_count(),
            "light buffer rebuilt"
        );
        Ok(())
    }
}

fn derive(light: &Light, registry: &Registry) -> GpuLight {
    if !light.active {
        return GpuLight::zeroed();
    }
    let (position, direction) = match light.attachment {
        Some(attachment) => match registry.get_active(attachment.entity) {
            Some(entity) => (
                entity.transform.position + entity.transform.orientation() * attachment.offset,
                entity.transform.forward(),
            ),
            None => return GpuLight::zeroed(),
        },
        None => (light.position, light.direction),
    };
    let direction = direction.try_normalize().unwrap_or(Vec3::NEG_Y);
    let (theta, phi) = match light.kind {
        LightKind::Spot => (light.theta.cos(), light.phi.cos()),
        LightKind::Point | LightKind::Directional => (0.0, 0.0),
    };
    let range = match light.kind {
        LightKind::Directional => 0.0,
        LightKind::Point | LightKind::Spot => light.effective_range(),
    };
    GpuLight {
        is_active: 1,
        position: position.to_array(),
        direction: direction.to_array(),
        kind: light.kind.code(),
        diffuse: light.diffuse.to_array(),
        ambient: light.ambient.to_array(),
        specular: light.specular.to_array(),
        attenuation: light.attenuation.to_array(),
        falloff: light.falloff,
        range,
        theta,
        phi,
        padding: 0.0,
    }
}
