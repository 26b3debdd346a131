use glam::Vec3;

const MAX_ELEVATION: f32 = 89.0;
const MIN_DOLLY: f32 = 0.05;
const MAX_DOLLY: f32 = 20.0;

/// Slices stack along +z with image rows running along +y, so the camera's
/// up is -y to keep row 0 at the top of the frame.
const WORLD_UP: Vec3 = Vec3::new(0.0, -1.0, 0.0);

/// Axis-aligned box in world coordinates (mm).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn radius(&self) -> f32 {
        (self.max - self.min).length() * 0.5
    }

    /// Entry and exit distances of `ray`, if it hits the box.
    pub fn intersect(&self, ray: &Ray) -> Option<(f32, f32)> {
        let inv = ray.direction.recip();
        let t0 = (self.min - ray.origin) * inv;
        let t1 = (self.max - ray.origin) * inv;
        let near = t0.min(t1).max_element().max(0.0);
        let far = t0.max(t1).min_element();
        (far > near).then_some((near, far))
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Perspective camera orbiting a focal point. Angles are in degrees.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub focal_point: Vec3,
    pub azimuth: f32,
    pub elevation: f32,
    pub distance: f32,
    pub view_angle: f32,
    home_distance: f32,
    home_azimuth: f32,
    home_elevation: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            focal_point: Vec3::ZERO,
            azimuth: 0.0,
            elevation: 0.0,
            distance: 1.0,
            view_angle: 30.0,
            home_distance: 1.0,
            home_azimuth: 0.0,
            home_elevation: 0.0,
        }
    }
}

impl Camera {
    pub fn new(azimuth: f32, elevation: f32) -> Self {
        Self {
            azimuth,
            elevation: elevation.clamp(-MAX_ELEVATION, MAX_ELEVATION),
            home_azimuth: azimuth,
            home_elevation: elevation.clamp(-MAX_ELEVATION, MAX_ELEVATION),
            ..Default::default()
        }
    }

    /// Aim at the centre of `bounds` from a distance that fits the whole box
    /// in the view angle.
    pub fn reset(&mut self, bounds: &Bounds) {
        let half_angle = (self.view_angle * 0.5).to_radians();
        self.focal_point = bounds.center();
        self.home_distance = (bounds.radius() / half_angle.sin()).max(f32::EPSILON);
        self.distance = self.home_distance;
        self.azimuth = self.home_azimuth;
        self.elevation = self.home_elevation;
    }

    pub fn orbit(&mut self, delta_azimuth: f32, delta_elevation: f32) {
        self.azimuth = (self.azimuth + delta_azimuth).rem_euclid(360.0);
        self.elevation = (self.elevation + delta_elevation).clamp(-MAX_ELEVATION, MAX_ELEVATION);
    }

    /// Move towards the focal point by `factor` (> 1 moves closer).
    pub fn dolly(&mut self, factor: f32) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        self.distance = (self.distance / factor)
            .clamp(self.home_distance * MIN_DOLLY, self.home_distance * MAX_DOLLY);
    }

    pub fn position(&self) -> Vec3 {
        let (az, el) = (self.azimuth.to_radians(), self.elevation.to_radians());
        let offset = Vec3::new(el.cos() * az.sin(), -el.sin(), -el.cos() * az.cos());
        self.focal_point + offset * self.distance
    }

    /// Orthonormal (forward, right, up) frame.
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let forward = (self.focal_point - self.position()).normalize();
        let right = forward.cross(WORLD_UP).normalize();
        let up = right.cross(forward);
        (forward, right, up)
    }

    /// Ray through the centre of pixel (`px`, `py`), with `py` counted from
    /// the top of the frame.
    pub fn ray(&self, px: u32, py: u32, width: u32, height: u32) -> Ray {
        let (forward, right, up) = self.basis();
        let tan_half = (self.view_angle * 0.5).to_radians().tan();
        let aspect = width as f32 / height.max(1) as f32;
        let ndc_x = 2.0 * (px as f32 + 0.5) / width.max(1) as f32 - 1.0;
        let ndc_y = 1.0 - 2.0 * (py as f32 + 0.5) / height.max(1) as f32;
        let direction =
            (forward + right * (ndc_x * aspect * tan_half) + up * (ndc_y * tan_half)).normalize();
        Ray {
            origin: self.position(),
            direction,
        }
    }
}
