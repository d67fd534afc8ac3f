use glam::{Mat4, Vec2, Vec3};
use skirmish_common::Ray;

/// Render target size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Perspective camera with position, yaw and pitch.
///
/// Used both as a free fly camera and as a third-person follow camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub speed: f32,
    pub sensitivity: f32,
    pub viewport: Viewport,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 10.0, 15.0),
            yaw: -90.0_f32.to_radians(),
            pitch: -30.0_f32.to_radians(),
            fov: 60.0_f32.to_radians(),
            near: 0.1,
            far: 1000.0,
            speed: 20.0,
            sensitivity: 0.003,
            viewport: Viewport::default(),
        }
    }
}

impl Camera {
    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
        .normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    pub fn aspect(&self) -> f32 {
        self.viewport.width.max(1) as f32 / self.viewport.height.max(1) as f32
    }

    /// Translate in camera space: x = right, y = world up, z = forward.
    pub fn fly(&mut self, local: Vec3, dt: f32) {
        let delta = self.right() * local.x + Vec3::Y * local.y + self.forward() * local.z;
        self.position += delta * self.speed * dt;
    }

    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.sensitivity;
        self.pitch -= dy * self.sensitivity;
        self.pitch = self.pitch.clamp(-89.0_f32.to_radians(), 89.0_f32.to_radians());
    }

    /// Aim at `target`. No-op when the target is the camera position.
    pub fn look_at(&mut self, target: Vec3) {
        if let Some(dir) = (target - self.position).try_normalize() {
            self.pitch = dir.y.clamp(-1.0, 1.0).asin();
            self.yaw = dir.z.atan2(dir.x);
        }
    }

    /// Third-person placement behind `target` along `facing`.
    pub fn follow(&mut self, target: Vec3, facing: Vec3, distance: f32, height: f32) {
        let mut back = -facing;
        back.y = 0.0;
        let back = back.try_normalize().unwrap_or(Vec3::Z);
        self.position = target + back * distance + Vec3::Y * height;
        self.look_at(target);
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect(), self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Pixel coordinates (origin top-left) to normalized device coordinates.
    pub fn screen_to_ndc(&self, screen_x: f32, screen_y: f32) -> (f32, f32) {
        let w = self.viewport.width.max(1) as f32;
        let h = self.viewport.height.max(1) as f32;
        (2.0 * screen_x / w - 1.0, 1.0 - 2.0 * screen_y / h)
    }

    /// Pixel position of a world point, or `None` when it is behind the
    /// camera or outside the depth range.
    pub fn world_to_screen(&self, point: Vec3) -> Option<Vec2> {
        let clip = self.view_projection() * point.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        if !(0.0..=1.0).contains(&ndc.z) {
            return None;
        }
        let w = self.viewport.width.max(1) as f32;
        let h = self.viewport.height.max(1) as f32;
        Some(Vec2::new((ndc.x + 1.0) * 0.5 * w, (1.0 - ndc.y) * 0.5 * h))
    }

    /// World-space ray through a pixel, starting on the near plane.
    pub fn screen_ray(&self, screen_x: f32, screen_y: f32) -> Option<Ray> {
        let (ndc_x, ndc_y) = self.screen_to_ndc(screen_x, screen_y);
        let inverse = self.view_projection().inverse();
        let near = inverse.project_point3(Vec3::new(ndc_x, ndc_y, 0.0));
        let far = inverse.project_point3(Vec3::new(ndc_x, ndc_y, 1.0));
        if !near.is_finite() || !far.is_finite() {
            return None;
        }
        Ray::new(near, far - near)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn looking_down_negative_z() -> Camera {
        let mut cam = Camera {
            position: Vec3::new(0.0, 0.0, 10.0),
            ..Camera::default()
        };
        cam.look_at(Vec3::ZERO);
        cam
    }

    #[test]
    fn default_camera() {
        let cam = Camera::default();
        assert!(cam.position.y > 0.0);
        let vp = cam.view_projection();
        assert!(!vp.col(0).x.is_nan());
    }

    #[test]
    fn camera_movement() {
        let mut cam = Camera::default();
        let start = cam.position;
        cam.fly(Vec3::Z, 1.0);
        assert_ne!(cam.position, start);
    }

    #[test]
    fn look_at_points_forward_at_target() {
        let cam = looking_down_negative_z();
        assert!((cam.forward() - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn centre_pixel_ray_follows_forward() {
        let cam = looking_down_negative_z();
        let ray = cam.screen_ray(640.0, 360.0).unwrap();
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-3);
        assert!((ray.origin.z - (10.0 - cam.near)).abs() < 1e-3);
    }

    #[test]
    fn left_pixel_ray_bends_left() {
        let cam = looking_down_negative_z();
        let ray = cam.screen_ray(0.0, 360.0).unwrap();
        assert!(ray.direction.x < 0.0);
        let ray = cam.screen_ray(640.0, 0.0).unwrap();
        assert!(ray.direction.y > 0.0);
    }

    #[test]
    fn world_to_screen_inverts_screen_ray() {
        let cam = looking_down_negative_z();
        let centre = cam.world_to_screen(Vec3::ZERO).unwrap();
        assert!((centre - Vec2::new(640.0, 360.0)).length() < 1e-3);

        let ray = cam.screen_ray(200.0, 100.0).unwrap();
        let pixel = cam.world_to_screen(ray.at(5.0)).unwrap();
        assert!((pixel - Vec2::new(200.0, 100.0)).length() < 1e-2);

        assert!(cam.world_to_screen(Vec3::new(0.0, 0.0, 20.0)).is_none());
    }

    #[test]
    fn follow_sits_behind_and_above() {
        let mut cam = Camera::default();
        cam.follow(Vec3::ZERO, Vec3::NEG_Z, 10.0, 5.0);
        assert!((cam.position - Vec3::new(0.0, 5.0, 10.0)).length() < 1e-5);
        assert!(cam.forward().z < 0.0 && cam.forward().y < 0.0);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut cam = Camera::default();
        cam.rotate(0.0, -1.0e6);
        assert!(cam.pitch <= 89.0_f32.to_radians());
    }
}
