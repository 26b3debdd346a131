use std::sync::Arc;

use glam::Vec3;
use image::RgbaImage;
use thiserror::Error;

use crate::{
    camera::{Bounds, Camera},
    intensity::NormalizedVolume,
    transfer_function::VolumeProperty,
};

/// World distance over which a sample's LUT opacity applies unchanged.
pub const OPACITY_UNIT_DISTANCE: f32 = 1.0;

/// Front-to-back compositing stops once a ray is this opaque.
pub const EARLY_TERMINATION_ALPHA: f32 = 0.99;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render target has no pixels")]
    EmptyTarget,

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("failed to read back the rendered frame")]
    BufferMap,
}

/// A normalized volume together with the property used to draw it.
#[derive(Clone, Debug)]
pub struct RenderableVolume {
    pub volume: Arc<NormalizedVolume>,
    pub property: VolumeProperty,
}

impl RenderableVolume {
    pub fn new(volume: NormalizedVolume, property: VolumeProperty) -> Self {
        Self {
            volume: Arc::new(volume),
            property,
        }
    }

    pub fn spacing(&self) -> Vec3 {
        let (x, y, z) = self.volume.spacing();
        Vec3::new(x, y, z)
    }

    /// Box enclosing every voxel, with voxel `i` centred at `i * spacing`.
    pub fn bounds(&self) -> Bounds {
        let (depth, height, width) = self.volume.dim();
        let spacing = self.spacing();
        let extent = Vec3::new(width as f32, height as f32, depth as f32);
        Bounds {
            min: spacing * -0.5,
            max: (extent - 0.5) * spacing,
        }
    }

    /// Distance between samples along a ray, in world units.
    pub fn sample_step(&self, sample_distance: f32) -> f32 {
        (self.spacing().min_element() * sample_distance).max(f32::EPSILON)
    }
}

pub trait Renderer {
    fn render(
        &mut self,
        scene: &RenderableVolume,
        camera: &Camera,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, RenderError>;
}

/// Opacity of one sample scaled to the step length.
#[inline]
pub(crate) fn corrected_opacity(alpha: f32, step: f32) -> f32 {
    if alpha >= 1.0 {
        return 1.0;
    }
    1.0 - (1.0 - alpha).powf(step / OPACITY_UNIT_DISTANCE)
}
