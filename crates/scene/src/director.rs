use std::collections::VecDeque;

use skirmish_input::{KeyEvent, MouseEvent};
use skirmish_render::{FrameSubmission, ResourceUploader, UploadTracker};

use crate::config::SceneConfig;
use crate::error::SceneError;
use crate::scene::{Scene, SceneCapability, SceneKind};

/// Owns the active scene and the queue of scenes waiting to replace it.
///
/// A requested scene is created and built immediately, while the current
/// one keeps running. The swap happens after a frame completes, never
/// inside one. A retired scene's resources stay alive until the fence of
/// the last frame that could use them completes.
pub struct SceneDirector {
    config: SceneConfig,
    current: Scene,
    pending: VecDeque<Scene>,
    retired: UploadTracker,
    frame: u64,
    completed_fence: u64,
}

impl SceneDirector {
    /// Create, build and activate the first scene.
    pub fn new(config: SceneConfig, initial: SceneKind, uploader: &mut dyn ResourceUploader) -> Result<Self, SceneError> {
        let mut retired = UploadTracker::new();
        let mut current = Scene::new(initial, &config);
        if let Err(err) = prepare(&mut current, uploader, &mut retired, 0, 1) {
            retired.release_all(uploader);
            return Err(err);
        }
        current.activate()?;
        tracing::info!(scene = ?initial, "scene director started");
        Ok(Self {
            config,
            current,
            pending: VecDeque::new(),
            retired,
            frame: 0,
            completed_fence: 0,
        })
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn current(&self) -> &Scene {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut Scene {
        &mut self.current
    }

    /// Frames completed so far. Also the fence value of the last frame.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn completed_fence(&self) -> u64 {
        self.completed_fence
    }

    /// Resources of retired scenes still waiting for their fence.
    pub fn retired_count(&self) -> usize {
        self.retired.pending_count()
    }

    /// Build the next scene now; it becomes current after the next frame.
    pub fn request(&mut self, kind: SceneKind, uploader: &mut dyn ResourceUploader) -> Result<(), SceneError> {
        let mut next = Scene::new(kind, &self.config);
        prepare(&mut next, uploader, &mut self.retired, self.frame, self.frame + 1)?;
        tracing::info!(scene = ?kind, "scene queued");
        self.pending.push_back(next);
        Ok(())
    }

    pub fn process_mouse(&mut self, event: MouseEvent, uploader: &mut dyn ResourceUploader) -> Result<(), SceneError> {
        match self.current.process_mouse(event) {
            Some(kind) => self.request(kind, uploader),
            None => Ok(()),
        }
    }

    pub fn process_keyboard(&mut self, event: KeyEvent, uploader: &mut dyn ResourceUploader) -> Result<(), SceneError> {
        match self.current.process_keyboard(event) {
            Some(kind) => self.request(kind, uploader),
            None => Ok(()),
        }
    }

    /// Run one frame on the current scene, then swap in a queued scene.
    pub fn frame_tick(&mut self, dt: f32, uploader: &mut dyn ResourceUploader) -> Result<FrameSubmission, SceneError> {
        self.frame += 1;
        self.current.process_input(dt);
        let submission = self.current.update(self.frame, dt, uploader)?;
        self.swap_pending()?;
        Ok(submission)
    }

    /// The GPU finished every frame up to `fence`.
    pub fn fence_signaled(&mut self, fence: u64, uploader: &mut dyn ResourceUploader) -> usize {
        self.completed_fence = self.completed_fence.max(fence);
        let mut released = self.retired.retire(self.completed_fence, uploader);
        released += self.current.release_upload_buffers(self.completed_fence, uploader);
        for scene in &mut self.pending {
            released += scene.release_upload_buffers(self.completed_fence, uploader);
        }
        released
    }

    /// Tear down every scene, current and queued. The GPU must be idle.
    pub fn shutdown(mut self, uploader: &mut dyn ResourceUploader) -> Result<(), SceneError> {
        retire(&mut self.current, &mut self.retired, self.frame)?;
        for mut scene in self.pending.drain(..) {
            retire(&mut scene, &mut self.retired, self.frame)?;
        }
        self.retired.release_all(uploader);
        tracing::info!(frames = self.frame, "scene director stopped");
        Ok(())
    }

    fn swap_pending(&mut self) -> Result<(), SceneError> {
        let Some(mut next) = self.pending.pop_front() else {
            return Ok(());
        };
        // The frame just submitted may still read the old scene's buffers.
        retire(&mut self.current, &mut self.retired, self.frame)?;
        next.activate()?;
        let old = std::mem::replace(&mut self.current, next);
        tracing::info!(from = ?old.kind(), to = ?self.current.kind(), frame = self.frame, "scene switched");
        Ok(())
    }
}

/// Create and build `scene`, tagging its uploads with `upload_fence`. On a
/// failed build its resources go to `retired`, held until `last_fence`.
fn prepare(
    scene: &mut Scene,
    uploader: &mut dyn ResourceUploader,
    retired: &mut UploadTracker,
    last_fence: u64,
    upload_fence: u64,
) -> Result<(), SceneError> {
    scene.on_create(uploader, upload_fence)?;
    if let Err(err) = scene.build_objects(uploader) {
        retire(scene, retired, last_fence)?;
        return Err(err);
    }
    Ok(())
}

fn retire(scene: &mut Scene, retired: &mut UploadTracker, fence: u64) -> Result<(), SceneError> {
    scene.release_objects(retired, fence)?;
    scene.on_destroy()
}
