//! Rendering Adapter: everything the scene hands to the GPU side.
//!
//! # Invariants
//! - The renderer reads a finished `FrameSubmission`; it never touches the
//!   registry.
//! - The light mirror is written only inside `LightBuffer::rebuild`, which
//!   copies it to the mapped region before returning.
//! - Staging buffers are released only after the frame fence that consumed
//!   them has been signalled.

mod camera;
mod light;
mod renderer;
mod upload;

pub use camera::{Camera, Viewport};
pub use light::{
    GpuLight, Light, LightAttachment, LightBuffer, LightBufferData, LightKind, MAX_LIGHTS,
};
pub use renderer::{DebugTextRenderer, FrameSubmission, RenderItem, Renderer, UiQuad};
pub use upload::{
    Allocation, BufferDesc, BufferUsage, HostUploader, Residency, ResourceHandle,
    ResourceUploader, TextureDesc, UploadError, UploadTracker,
};
