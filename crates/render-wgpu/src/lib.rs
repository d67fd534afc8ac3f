//! wgpu backend for the resource-upload interface.
//!
//! # Invariants
//! - Upload-resident buffers are written with `Queue::write_buffer`; wgpu
//!   stages the copy itself, so allocations never report a staging handle.
//! - Released handles are destroyed immediately and never reissued.

use std::collections::BTreeMap;

use skirmish_render::{
    Allocation, BufferDesc, BufferUsage, Residency, ResourceHandle, ResourceUploader, TextureDesc,
    UploadError,
};
use wgpu::util::DeviceExt;

/// Failure to bring up a device.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("no compatible GPU adapter")]
    NoAdapter,
    #[error("device request failed: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}

enum GpuResource {
    Buffer {
        buffer: wgpu::Buffer,
        residency: Residency,
    },
    Texture(wgpu::Texture),
}

/// `ResourceUploader` on a wgpu device and queue.
pub struct WgpuUploader {
    device: wgpu::Device,
    queue: wgpu::Queue,
    resources: BTreeMap<ResourceHandle, GpuResource>,
    next: u64,
}

impl WgpuUploader {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            resources: BTreeMap::new(),
            next: 0,
        }
    }

    /// Windowless device on the default adapter.
    pub fn headless() -> Result<Self, BackendError> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(BackendError::NoAdapter)?;
        tracing::info!(adapter = %adapter.get_info().name, "gpu adapter selected");

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("skirmish_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: Default::default(),
            },
            None,
        ))?;
        Ok(Self::new(device, queue))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn live_count(&self) -> usize {
        self.resources.len()
    }

    fn insert(&mut self, resource: GpuResource) -> ResourceHandle {
        let handle = ResourceHandle(self.next);
        self.next += 1;
        self.resources.insert(handle, resource);
        handle
    }
}

/// wgpu usage flags for a buffer of the given residency and role.
pub fn usage_for(residency: Residency, usage: BufferUsage) -> wgpu::BufferUsages {
    // MAP_READ may only be combined with COPY_DST.
    if residency == Residency::Readback {
        return wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST;
    }
    let role = match usage {
        BufferUsage::Uniform => wgpu::BufferUsages::UNIFORM,
        BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
        BufferUsage::Storage => wgpu::BufferUsages::STORAGE,
    };
    role | wgpu::BufferUsages::COPY_DST
}

impl ResourceUploader for WgpuUploader {
    fn create_buffer(
        &mut self,
        desc: &BufferDesc<'_>,
        contents: Option<&[u8]>,
    ) -> Result<Allocation, UploadError> {
        let usage = usage_for(desc.residency, desc.usage);
        let buffer = match contents {
            Some(data) if desc.residency != Residency::Readback => {
                if data.len() as u64 > desc.size {
                    return Err(UploadError::ContentsTooLarge {
                        label: desc.label.to_string(),
                        size: desc.size,
                        actual: data.len(),
                    });
                }
                let mut padded = data.to_vec();
                padded.resize(desc.size as usize, 0);
                self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(desc.label),
                    contents: &padded,
                    usage,
                })
            }
            _ => self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(desc.label),
                size: desc.size,
                usage,
                mapped_at_creation: false,
            }),
        };
        let resource = self.insert(GpuResource::Buffer {
            buffer,
            residency: desc.residency,
        });
        tracing::debug!(label = desc.label, size = desc.size, ?resource, "gpu buffer created");
        Ok(Allocation {
            resource,
            staging: None,
        })
    }

    fn create_texture(&mut self, desc: &TextureDesc<'_>, pixels: &[u8]) -> Result<Allocation, UploadError> {
        if pixels.len() != desc.byte_len() {
            return Err(UploadError::TextureSize {
                label: desc.label.to_string(),
                expected: desc.byte_len(),
                actual: pixels.len(),
            });
        }
        let texture = self.device.create_texture_with_data(
            &self.queue,
            &wgpu::TextureDescriptor {
                label: Some(desc.label),
                size: wgpu::Extent3d {
                    width: desc.width.max(1),
                    height: desc.height.max(1),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            pixels,
        );
        let resource = self.insert(GpuResource::Texture(texture));
        Ok(Allocation {
            resource,
            staging: None,
        })
    }

    fn write_mapped(&mut self, handle: ResourceHandle, offset: u64, bytes: &[u8]) -> Result<(), UploadError> {
        let buffer = match self.resources.get(&handle) {
            Some(GpuResource::Buffer {
                buffer,
                residency: Residency::Upload,
            }) => buffer,
            Some(_) => return Err(UploadError::NotMapped(handle)),
            None => return Err(UploadError::UnknownHandle(handle)),
        };
        if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 || bytes.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(UploadError::Misaligned {
                handle,
                offset,
                len: bytes.len(),
            });
        }
        if offset + bytes.len() as u64 > buffer.size() {
            return Err(UploadError::OutOfBounds {
                handle,
                offset,
                len: bytes.len(),
                size: buffer.size(),
            });
        }
        self.queue.write_buffer(buffer, offset, bytes);
        Ok(())
    }

    fn release(&mut self, handle: ResourceHandle) {
        match self.resources.remove(&handle) {
            Some(GpuResource::Buffer { buffer, .. }) => buffer.destroy(),
            Some(GpuResource::Texture(texture)) => texture.destroy(),
            None => {}
        }
    }
}
