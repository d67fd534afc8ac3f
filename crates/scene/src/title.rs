use skirmish_input::{Action, InputState, KeyEvent, MouseEvent};
use skirmish_render::{
    FrameSubmission, ResourceHandle, ResourceUploader, TextureDesc, UiQuad, UploadTracker, Viewport,
};

use crate::error::SceneError;
use crate::lifecycle::LifecycleState;
use crate::scene::{SceneCapability, SceneKind};

const BUTTON_SIZE: (f32, f32) = (240.0, 64.0);

/// Menu screen: a background and a start button. No simulation.
#[derive(Debug, Default)]
pub struct TitleScene {
    state: LifecycleState,
    viewport: Viewport,
    input: InputState,
    start_button: [f32; 4],
    hovered: bool,
    resources: Vec<ResourceHandle>,
    uploads: UploadTracker,
}

impl TitleScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_button(&self) -> [f32; 4] {
        self.start_button
    }

    fn over_button(&self, x: f32, y: f32) -> bool {
        let [bx, by, w, h] = self.start_button;
        (bx..=bx + w).contains(&x) && (by..=by + h).contains(&y)
    }
}

fn solid_rgba(rgba: [u8; 4], width: u32, height: u32) -> Vec<u8> {
    rgba.repeat((width * height) as usize)
}

impl SceneCapability for TitleScene {
    fn kind(&self) -> SceneKind {
        SceneKind::Title
    }

    fn state(&self) -> LifecycleState {
        self.state
    }

    fn on_create(&mut self, uploader: &mut dyn ResourceUploader, fence: u64) -> Result<(), SceneError> {
        self.state.require("on_create", LifecycleState::Uninitialized)?;
        let textures = [
            ("title.background", [20u8, 24, 40, 255]),
            ("title.start_button", [200u8, 160, 40, 255]),
        ];
        for (label, rgba) in textures {
            let desc = TextureDesc {
                label,
                width: 4,
                height: 4,
            };
            match uploader.create_texture(&desc, &solid_rgba(rgba, 4, 4)) {
                Ok(allocation) => {
                    self.resources.push(allocation.resource);
                    self.uploads.track(fence, &allocation);
                }
                Err(err) => {
                    tracing::warn!(label, %err, "title resource creation failed");
                    for handle in self.resources.drain(..) {
                        uploader.release(handle);
                    }
                    self.uploads.release_all(uploader);
                    return Err(err.into());
                }
            }
        }
        self.state.advance(LifecycleState::Built)
    }

    fn build_objects(&mut self, _uploader: &mut dyn ResourceUploader) -> Result<(), SceneError> {
        self.state.require("build_objects", LifecycleState::Built)?;
        let (w, h) = BUTTON_SIZE;
        self.start_button = [
            (self.viewport.width as f32 - w) * 0.5,
            (self.viewport.height as f32 - h) * 0.5,
            w,
            h,
        ];
        Ok(())
    }

    fn activate(&mut self) -> Result<(), SceneError> {
        self.state.advance(LifecycleState::Active)
    }

    fn process_mouse(&mut self, event: MouseEvent) -> Option<SceneKind> {
        if self.state != LifecycleState::Active {
            return None;
        }
        if let MouseEvent::Moved { x, y } = event {
            self.hovered = self.over_button(x, y);
        }
        match self.input.mouse(event, true) {
            Action::Pick { x, y } if self.over_button(x, y) => Some(SceneKind::Game),
            _ => None,
        }
    }

    fn process_keyboard(&mut self, event: KeyEvent) -> Option<SceneKind> {
        if self.state != LifecycleState::Active {
            return None;
        }
        match self.input.key(event) {
            Action::Confirm => Some(SceneKind::Game),
            _ => None,
        }
    }

    fn process_input(&mut self, _dt: f32) {}

    fn update(
        &mut self,
        frame: u64,
        _dt: f32,
        _uploader: &mut dyn ResourceUploader,
    ) -> Result<FrameSubmission, SceneError> {
        self.state.require("update", LifecycleState::Active)?;
        let ui = vec![
            UiQuad {
                label: "background".into(),
                rect: [0.0, 0.0, self.viewport.width as f32, self.viewport.height as f32],
                highlighted: false,
            },
            UiQuad {
                label: "start".into(),
                rect: self.start_button,
                highlighted: self.hovered,
            },
        ];
        Ok(FrameSubmission::ui_only(frame, ui))
    }

    fn release_upload_buffers(&mut self, completed_fence: u64, uploader: &mut dyn ResourceUploader) -> usize {
        self.uploads.retire(completed_fence, uploader)
    }

    fn release_objects(&mut self, retired: &mut UploadTracker, fence: u64) -> Result<(), SceneError> {
        self.state.advance(LifecycleState::Releasing)?;
        for handle in self.resources.drain(..) {
            retired.defer(fence, handle);
        }
        self.uploads.hand_over(fence, retired);
        self.input.clear();
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
    use skirmish_render::HostUploader;

    fn active_title(uploader: &mut HostUploader) -> TitleScene {
        let mut title = TitleScene::new();
        title.on_create(uploader, 1).unwrap();
        title.build_objects(uploader).unwrap();
        title.activate().unwrap();
        title
    }

    #[test]
    fn enter_starts_the_game() {
        let mut up = HostUploader::new();
        let mut title = active_title(&mut up);
        assert_eq!(title.process_keyboard(KeyEvent::press(Key::Enter)), Some(SceneKind::Game));
        assert_eq!(title.process_keyboard(KeyEvent::press(Key::Escape)), None);
    }

    #[test]
    fn clicking_the_button_starts_the_game() {
        let mut up = HostUploader::new();
        let mut title = active_title(&mut up);
        let [x, y, w, h] = title.start_button();
        let click = |x, y| MouseEvent::Pressed {
            button: MouseButton::Left,
            x,
            y,
        };
        assert_eq!(title.process_mouse(click(1.0, 1.0)), None);
        assert_eq!(title.process_mouse(click(x + w * 0.5, y + h * 0.5)), Some(SceneKind::Game));
    }

    #[test]
    fn hover_highlights_the_button() {
        let mut up = HostUploader::new();
        let mut title = active_title(&mut up);
        let [x, y, ..] = title.start_button();
        title.process_mouse(MouseEvent::Moved { x: x + 1.0, y: y + 1.0 });
        let frame = title.update(1, 0.016, &mut up).unwrap();
        assert!(frame.items.is_empty());
        assert!(frame.ui.iter().any(|q| q.label == "start" && q.highlighted));
    }

    #[test]
    fn release_hands_every_resource_to_the_fence() {
        let mut up = HostUploader::new();
        let mut title = active_title(&mut up);
        assert_eq!(up.live_count(), 4);
        let mut retired = UploadTracker::new();
        title.release_objects(&mut retired, 2).unwrap();
        title.on_destroy().unwrap();
        assert_eq!(title.state(), LifecycleState::Destroyed);
        assert_eq!(up.live_count(), 4);

        assert_eq!(retired.retire(1, &mut up), 0);
        assert_eq!(retired.retire(2, &mut up), 4);
        assert_eq!(up.live_count(), 0);
    }

    #[test]
    fn inactive_title_ignores_input() {
        let mut title = TitleScene::new();
        assert_eq!(title.process_keyboard(KeyEvent::press(Key::Enter)), None);
    }
}
