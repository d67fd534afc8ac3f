use skirmish_input::{KeyEvent, MouseEvent};
use skirmish_render::{FrameSubmission, ResourceUploader, UploadTracker};

use crate::config::SceneConfig;
use crate::error::SceneError;
use crate::game::GameScene;
use crate::lifecycle::LifecycleState;
use crate::title::TitleScene;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneKind {
    Title,
    Game,
}

/// What every scene can do. The director drives scenes only through this.
pub trait SceneCapability {
    fn kind(&self) -> SceneKind;

    fn state(&self) -> LifecycleState;

    /// Allocate GPU-backed resources. Uninitialized -> Built.
    ///
    /// Staging buffers are tagged with `fence`, the first frame fence that
    /// may consume them.
    fn on_create(&mut self, uploader: &mut dyn ResourceUploader, fence: u64) -> Result<(), SceneError>;

    /// Populate the scene's objects and lights. Stays Built.
    fn build_objects(&mut self, uploader: &mut dyn ResourceUploader) -> Result<(), SceneError>;

    /// Built -> Active.
    fn activate(&mut self) -> Result<(), SceneError>;

    /// Returns the scene to switch to, if the event asks for one.
    fn process_mouse(&mut self, event: MouseEvent) -> Option<SceneKind>;

    fn process_keyboard(&mut self, event: KeyEvent) -> Option<SceneKind>;

    /// Apply held input for this frame.
    fn process_input(&mut self, dt: f32);

    /// Run one frame and capture what the renderer should draw.
    fn update(
        &mut self,
        frame: u64,
        dt: f32,
        uploader: &mut dyn ResourceUploader,
    ) -> Result<FrameSubmission, SceneError>;

    /// Release staging buffers whose fence has completed.
    fn release_upload_buffers(&mut self, completed_fence: u64, uploader: &mut dyn ResourceUploader) -> usize;

    /// Give up everything the scene allocated. -> Releasing.
    ///
    /// Handles move into `retired`, held until `fence` completes: shader
    /// variables first, then object resources, staging buffers last.
    fn release_objects(&mut self, retired: &mut UploadTracker, fence: u64) -> Result<(), SceneError>;

    /// Releasing -> Destroyed.
    fn on_destroy(&mut self) -> Result<(), SceneError>;
}

/// The scene variants, dispatched by `match`.
pub enum Scene {
    Title(TitleScene),
    Game(Box<GameScene>),
}

impl Scene {
    pub fn new(kind: SceneKind, config: &SceneConfig) -> Self {
        match kind {
            SceneKind::Title => Self::Title(TitleScene::new()),
            SceneKind::Game => Self::Game(Box::new(GameScene::new(config.clone()))),
        }
    }

    pub fn as_game(&self) -> Option<&GameScene> {
        match self {
            Self::Game(game) => Some(&**game),
            Self::Title(_) => None,
        }
    }

    pub fn as_game_mut(&mut self) -> Option<&mut GameScene> {
        match self {
            Self::Game(game) => Some(&mut **game),
            Self::Title(_) => None,
        }
    }

    pub fn as_title(&self) -> Option<&TitleScene> {
        match self {
            Self::Title(title) => Some(title),
            Self::Game(_) => None,
        }
    }
}

impl SceneCapability for Scene {
    fn kind(&self) -> SceneKind {
        match self {
            Self::Title(s) => s.kind(),
            Self::Game(s) => s.kind(),
        }
    }

    fn state(&self) -> LifecycleState {
        match self {
            Self::Title(s) => s.state(),
            Self::Game(s) => s.state(),
        }
    }

    fn on_create(&mut self, uploader: &mut dyn ResourceUploader, fence: u64) -> Result<(), SceneError> {
        match self {
            Self::Title(s) => s.on_create(uploader, fence),
            Self::Game(s) => s.on_create(uploader, fence),
        }
    }

    fn build_objects(&mut self, uploader: &mut dyn ResourceUploader) -> Result<(), SceneError> {
        match self {
            Self::Title(s) => s.build_objects(uploader),
            Self::Game(s) => s.build_objects(uploader),
        }
    }

    fn activate(&mut self) -> Result<(), SceneError> {
        match self {
            Self::Title(s) => s.activate(),
            Self::Game(s) => s.activate(),
        }
    }

    fn process_mouse(&mut self, event: MouseEvent) -> Option<SceneKind> {
        match self {
            Self::Title(s) => s.process_mouse(event),
            Self::Game(s) => s.process_mouse(event),
        }
    }

    fn process_keyboard(&mut self, event: KeyEvent) -> Option<SceneKind> {
        match self {
            Self::Title(s) => s.process_keyboard(event),
            Self::Game(s) => s.process_keyboard(event),
        }
    }

    fn process_input(&mut self, dt: f32) {
        match self {
            Self::Title(s) => s.process_input(dt),
            Self::Game(s) => s.process_input(dt),
        }
    }

    fn update(
        &mut self,
        frame: u64,
        dt: f32,
        uploader: &mut dyn ResourceUploader,
    ) -> Result<FrameSubmission, SceneError> {
        match self {
            Self::Title(s) => s.update(frame, dt, uploader),
            Self::Game(s) => s.update(frame, dt, uploader),
        }
    }

    fn release_upload_buffers(&mut self, completed_fence: u64, uploader: &mut dyn ResourceUploader) -> usize {
        match self {
            Self::Title(s) => s.release_upload_buffers(completed_fence, uploader),
            Self::Game(s) => s.release_upload_buffers(completed_fence, uploader),
        }
    }

    fn release_objects(&mut self, retired: &mut UploadTracker, fence: u64) -> Result<(), SceneError> {
        match self {
            Self::Title(s) => s.release_objects(retired, fence),
            Self::Game(s) => s.release_objects(retired, fence),
        }
    }

    fn on_destroy(&mut self) -> Result<(), SceneError> {
        match self {
            Self::Title(s) => s.on_destroy(),
            Self::Game(s) => s.on_destroy(),
        }
    }
}
