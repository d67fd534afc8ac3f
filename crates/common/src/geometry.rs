use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::types::Transform;

const EPSILON: f32 = 1e-6;

/// A half-line used for picking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Always unit length.
    pub direction: Vec3,
}

impl Ray {
    /// Build a ray, normalizing `direction`. Returns `None` for a zero direction.
    pub fn new(origin: Vec3, direction: Vec3) -> Option<Self> {
        let direction = direction.try_normalize()?;
        Some(Self { origin, direction })
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Simplified proxy geometry used for overlap and ray tests.
///
/// Boxes are axis-aligned in world space; a rotated transform yields the
/// enclosing axis-aligned box of the rotated extents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BoundingVolume {
    Box { center: Vec3, extents: Vec3 },
    Sphere { center: Vec3, radius: f32 },
}

impl BoundingVolume {
    pub fn cube(half: f32) -> Self {
        Self::Box {
            center: Vec3::ZERO,
            extents: Vec3::splat(half),
        }
    }

    pub fn sphere(radius: f32) -> Self {
        Self::Sphere {
            center: Vec3::ZERO,
            radius,
        }
    }

    pub fn center(&self) -> Vec3 {
        match *self {
            Self::Box { center, .. } | Self::Sphere { center, .. } => center,
        }
    }

    /// Axis-aligned min/max corners enclosing the volume.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        match *self {
            Self::Box { center, extents } => (center - extents, center + extents),
            Self::Sphere { center, radius } => {
                (center - Vec3::splat(radius), center + Vec3::splat(radius))
            }
        }
    }

    /// Convert a local-space volume to world space.
    pub fn to_world(&self, transform: &Transform) -> Self {
        let orientation = transform.orientation();
        match *self {
            Self::Box { center, extents } => {
                let scaled = extents * transform.scale.abs();
                // Enclosing AABB of the rotated box: |R| * e.
                let m = glam::Mat3::from_quat(orientation);
                let extents = Vec3::new(
                    m.row(0).abs().dot(scaled),
                    m.row(1).abs().dot(scaled),
                    m.row(2).abs().dot(scaled),
                );
                Self::Box {
                    center: transform.position + orientation * (center * transform.scale),
                    extents,
                }
            }
            Self::Sphere { center, radius } => Self::Sphere {
                center: transform.position + orientation * (center * transform.scale),
                radius: radius * transform.scale.abs().max_element(),
            },
        }
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        match *self {
            Self::Box { center, extents } => {
                let d = (point - center).abs();
                d.x <= extents.x && d.y <= extents.y && d.z <= extents.z
            }
            Self::Sphere { center, radius } => point.distance_squared(center) <= radius * radius,
        }
    }

    /// True when the two volumes interpenetrate. Touching surfaces do not count.
    pub fn intersects(&self, other: &Self) -> bool {
        self.penetration(other).is_some()
    }

    /// Minimum translation that moves `self` out of `other`, if they overlap.
    pub fn penetration(&self, other: &Self) -> Option<Vec3> {
        match (*self, *other) {
            (
                Self::Sphere { center: c1, radius: r1 },
                Self::Sphere { center: c2, radius: r2 },
            ) => {
                let delta = c1 - c2;
                let dist = delta.length();
                let reach = r1 + r2;
                if dist >= reach {
                    return None;
                }
                let dir = if dist > EPSILON { delta / dist } else { Vec3::X };
                Some(dir * (reach - dist))
            }
            (
                Self::Box { center: c1, extents: e1 },
                Self::Box { center: c2, extents: e2 },
            ) => box_overlap(c1 - c2, e1 + e2),
            (Self::Sphere { center, radius }, Self::Box { center: bc, extents }) => {
                sphere_box(center, radius, bc, extents)
            }
            (Self::Box { center: bc, extents }, Self::Sphere { center, radius }) => {
                sphere_box(center, radius, bc, extents).map(|v| -v)
            }
        }
    }

    /// Smallest non-negative distance along `ray` at which it meets the volume.
    ///
    /// A ray starting inside the volume reports its exit distance.
    pub fn ray_intersection(&self, ray: &Ray) -> Option<f32> {
        let (near, far) = match *self {
            Self::Box { center, extents } => ray_slab(ray, center - extents, center + extents)?,
            Self::Sphere { center, radius } => {
                let oc = ray.origin - center;
                let b = oc.dot(ray.direction);
                let c = oc.length_squared() - radius * radius;
                let disc = b * b - c;
                if disc < 0.0 {
                    return None;
                }
                let root = disc.sqrt();
                (-b - root, -b + root)
            }
        };
        if near >= 0.0 {
            Some(near)
        } else if far >= 0.0 {
            Some(far)
        } else {
            None
        }
    }
}

fn box_overlap(delta: Vec3, reach: Vec3) -> Option<Vec3> {
    let overlap = reach - delta.abs();
    if overlap.min_element() <= 0.0 {
        return None;
    }
    let sign = |v: f32| if v < 0.0 { -1.0 } else { 1.0 };
    let push = if overlap.x <= overlap.y && overlap.x <= overlap.z {
        Vec3::new(overlap.x * sign(delta.x), 0.0, 0.0)
    } else if overlap.y <= overlap.z {
        Vec3::new(0.0, overlap.y * sign(delta.y), 0.0)
    } else {
        Vec3::new(0.0, 0.0, overlap.z * sign(delta.z))
    };
    Some(push)
}

/// Push-out vector for a sphere against a box.
fn sphere_box(center: Vec3, radius: f32, box_center: Vec3, extents: Vec3) -> Option<Vec3> {
    let closest = center.clamp(box_center - extents, box_center + extents);
    let delta = center - closest;
    let dist = delta.length();
    if dist > EPSILON {
        if dist >= radius {
            return None;
        }
        return Some(delta / dist * (radius - dist));
    }
    // Centre inside the box: leave through the nearest face.
    box_overlap(center - box_center, extents + Vec3::splat(radius))
}

fn ray_slab(ray: &Ray, min: Vec3, max: Vec3) -> Option<(f32, f32)> {
    let mut near = f32::NEG_INFINITY;
    let mut far = f32::INFINITY;
    for axis in 0..3 {
        let origin = ray.origin[axis];
        let dir = ray.direction[axis];
        if dir.abs() < EPSILON {
            if origin < min[axis] || origin > max[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / dir;
        let mut t0 = (min[axis] - origin) * inv;
        let mut t1 = (max[axis] - origin) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        near = near.max(t0);
        far = far.min(t1);
        if near > far {
            return None;
        }
    }
    Some((near, far))
}
