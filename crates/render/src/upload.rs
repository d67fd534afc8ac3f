//! Resource-upload collaborator interface.
//!
//! The scene supplies byte payloads and receives opaque handles. Heap
//! selection, barriers and copy commands belong to the implementation.

use std::collections::BTreeMap;

/// Opaque GPU resource handle issued by an uploader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle(pub u64);

/// Where a resource lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residency {
    /// GPU-only memory; initial contents go through a staging buffer.
    DeviceLocal,
    /// CPU-writable, GPU-readable memory that stays mapped.
    Upload,
    /// GPU-writable, CPU-readable memory.
    Readback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    Uniform,
    Vertex,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc<'a> {
    pub label: &'a str,
    pub size: u64,
    pub residency: Residency,
    pub usage: BufferUsage,
}

/// RGBA8 2D texture description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
}

impl TextureDesc<'_> {
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// A created resource and, for device-local uploads, the staging buffer
/// that must outlive the command list performing the copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub resource: ResourceHandle,
    pub staging: Option<ResourceHandle>,
}

/// Errors reported by an uploader.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("failed to allocate {label}: {reason}")]
    Allocation { label: String, reason: String },
    #[error("texture {label} has {actual} bytes, expected {expected}")]
    TextureSize {
        label: String,
        expected: usize,
        actual: usize,
    },
    #[error("initial contents for {label} are {actual} bytes, buffer holds {size}")]
    ContentsTooLarge {
        label: String,
        size: u64,
        actual: usize,
    },
    #[error("unknown resource handle {0:?}")]
    UnknownHandle(ResourceHandle),
    #[error("resource {0:?} is not CPU-mapped")]
    NotMapped(ResourceHandle),
    #[error("write of {len} bytes at offset {offset} into {handle:?} is not 4-byte aligned")]
    Misaligned {
        handle: ResourceHandle,
        offset: u64,
        len: usize,
    },
    #[error("write of {len} bytes at offset {offset} exceeds {size}-byte resource {handle:?}")]
    OutOfBounds {
        handle: ResourceHandle,
        offset: u64,
        len: usize,
        size: u64,
    },
}

/// GPU resource creation and upload, as seen from the scene.
pub trait ResourceUploader {
    /// Create a buffer, optionally with initial contents.
    fn create_buffer(
        &mut self,
        desc: &BufferDesc<'_>,
        contents: Option<&[u8]>,
    ) -> Result<Allocation, UploadError>;

    /// Create a device-local texture from tightly packed RGBA8 pixels.
    fn create_texture(&mut self, desc: &TextureDesc<'_>, pixels: &[u8]) -> Result<Allocation, UploadError>;

    /// Write into a persistently mapped (`Residency::Upload`) buffer.
    fn write_mapped(&mut self, handle: ResourceHandle, offset: u64, bytes: &[u8]) -> Result<(), UploadError>;

    /// Release a resource. Unknown handles are ignored.
    fn release(&mut self, handle: ResourceHandle);
}

#[derive(Debug, Clone)]
struct HostResource {
    label: String,
    residency: Residency,
    bytes: Vec<u8>,
}

/// In-memory uploader: every resource is a byte vector.
///
/// Used headless and in tests. Keeps a log of releases so teardown order can
/// be checked, and can be told to fail after a number of allocations.
#[derive(Debug, Default)]
pub struct HostUploader {
    resources: BTreeMap<ResourceHandle, HostResource>,
    next: u64,
    allocation_limit: Option<usize>,
    allocations: usize,
    released: Vec<ResourceHandle>,
}

impl HostUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every allocation after the first `limit`.
    pub fn with_allocation_limit(limit: usize) -> Self {
        Self {
            allocation_limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn contents(&self, handle: ResourceHandle) -> Option<&[u8]> {
        self.resources.get(&handle).map(|r| r.bytes.as_slice())
    }

    pub fn label(&self, handle: ResourceHandle) -> Option<&str> {
        self.resources.get(&handle).map(|r| r.label.as_str())
    }

    pub fn live_count(&self) -> usize {
        self.resources.len()
    }

    /// Handles in the order they were released.
    pub fn released(&self) -> &[ResourceHandle] {
        &self.released
    }

    fn allocate(&mut self, label: &str, residency: Residency, bytes: Vec<u8>) -> Result<ResourceHandle, UploadError> {
        if self.allocation_limit.is_some_and(|limit| self.allocations >= limit) {
            tracing::warn!(label, "host allocation refused");
            return Err(UploadError::Allocation {
                label: label.to_string(),
                reason: "allocation limit reached".to_string(),
            });
        }
        self.allocations += 1;
        let handle = ResourceHandle(self.next);
        self.next += 1;
        self.resources.insert(
            handle,
            HostResource {
                label: label.to_string(),
                residency,
                bytes,
            },
        );
        Ok(handle)
    }
}

impl ResourceUploader for HostUploader {
    fn create_buffer(
        &mut self,
        desc: &BufferDesc<'_>,
        contents: Option<&[u8]>,
    ) -> Result<Allocation, UploadError> {
        let mut bytes = vec![0u8; desc.size as usize];
        if let Some(data) = contents {
            if data.len() as u64 > desc.size {
                return Err(UploadError::ContentsTooLarge {
                    label: desc.label.to_string(),
                    size: desc.size,
                    actual: data.len(),
                });
            }
            bytes[..data.len()].copy_from_slice(data);
        }
        let staging = match (desc.residency, contents) {
            (Residency::DeviceLocal, Some(data)) => {
                let label = format!("{}.staging", desc.label);
                Some(self.allocate(&label, Residency::Upload, data.to_vec())?)
            }
            _ => None,
        };
        let resource = match self.allocate(desc.label, desc.residency, bytes) {
            Ok(resource) => resource,
            Err(err) => {
                if let Some(staging) = staging {
                    self.resources.remove(&staging);
                }
                return Err(err);
            }
        };
        Ok(Allocation { resource, staging })
    }

    fn create_texture(&mut self, desc: &TextureDesc<'_>, pixels: &[u8]) -> Result<Allocation, UploadError> {
        if pixels.len() != desc.byte_len() {
            return Err(UploadError::TextureSize {
                label: desc.label.to_string(),
                expected: desc.byte_len(),
                actual: pixels.len(),
            });
        }
        let label = format!("{}.staging", desc.label);
        let staging = self.allocate(&label, Residency::Upload, pixels.to_vec())?;
        let resource = match self.allocate(desc.label, Residency::DeviceLocal, pixels.to_vec()) {
            Ok(resource) => resource,
            Err(err) => {
                self.resources.remove(&staging);
                return Err(err);
            }
        };
        Ok(Allocation {
            resource,
            staging: Some(staging),
        })
    }

    fn write_mapped(&mut self, handle: ResourceHandle, offset: u64, bytes: &[u8]) -> Result<(), UploadError> {
        let resource = self
            .resources
            .get_mut(&handle)
            .ok_or(UploadError::UnknownHandle(handle))?;
        if resource.residency != Residency::Upload {
            return Err(UploadError::NotMapped(handle));
        }
        let size = resource.bytes.len() as u64;
        let end = offset + bytes.len() as u64;
        if end > size {
            return Err(UploadError::OutOfBounds {
                handle,
                offset,
                len: bytes.len(),
                size,
            });
        }
        resource.bytes[offset as usize..end as usize].copy_from_slice(bytes);
        Ok(())
    }

    fn release(&mut self, handle: ResourceHandle) {
        if self.resources.remove(&handle).is_some() {
            self.released.push(handle);
        }
    }
}

/// Staging buffers waiting for the GPU to finish the copy that reads them.
///
/// Each entry carries the fence value of the frame that recorded the copy;
/// it may be released once the externally signalled fence reaches it.
#[derive(Debug, Default)]
pub struct UploadTracker {
    pending: Vec<(u64, ResourceHandle)>,
}

impl UploadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, fence: u64, allocation: &Allocation) {
        if let Some(staging) = allocation.staging {
            self.pending.push((fence, staging));
        }
    }

    /// Hold an arbitrary resource until `fence` completes.
    pub fn defer(&mut self, fence: u64, handle: ResourceHandle) {
        self.pending.push((fence, handle));
    }

    /// Move every pending entry into `other`, held at least until `fence`.
    /// Entries keep their order, so release order is preserved.
    pub fn hand_over(&mut self, fence: u64, other: &mut UploadTracker) {
        other
            .pending
            .extend(self.pending.drain(..).map(|(tag, handle)| (tag.max(fence), handle)));
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Release every staging buffer whose fence has completed.
    pub fn retire(&mut self, completed_fence: u64, uploader: &mut dyn ResourceUploader) -> usize {
        let before = self.pending.len();
        self.pending.retain(|&(fence, handle)| {
            if fence <= completed_fence {
                uploader.release(handle);
                false
            } else {
                true
            }
        });
        let retired = before - self.pending.len();
        if retired > 0 {
            tracing::debug!(retired, completed_fence, "staging buffers released");
        }
        retired
    }

    /// Release everything. Only valid once the GPU is idle.
    pub fn release_all(&mut self, uploader: &mut dyn ResourceUploader) {
        for (_, handle) in self.pending.drain(..) {
            uploader.release(handle);
        }
    }
}
