use glam::Vec3;
use image::RgbaImage;
use rayon::prelude::*;

use crate::{
    camera::{Bounds, Camera, Ray},
    interpolator::Interpolator,
    renderer::{
        EARLY_TERMINATION_ALPHA, RenderError, RenderableVolume, Renderer, corrected_opacity,
    },
    transfer_function::{Lighting, TransferLut},
};

/// Compositing ray caster on the CPU, one image row per rayon task.
pub struct CpuRaycaster {
    sample_distance: f32,
    background: Vec3,
}

impl Default for CpuRaycaster {
    fn default() -> Self {
        Self::new(0.5)
    }
}

struct RayContext<'a> {
    scene: &'a RenderableVolume,
    lut: &'a TransferLut,
    bounds: Bounds,
    spacing: Vec3,
    step: f32,
    shade: bool,
    lighting: Lighting,
}

impl CpuRaycaster {
    /// `sample_distance` is in units of the smallest voxel spacing.
    pub fn new(sample_distance: f32) -> Self {
        Self {
            sample_distance,
            background: Vec3::ZERO,
        }
    }

    fn cast(&self, ctx: &RayContext<'_>, ray: &Ray) -> Vec3 {
        let Some((near, far)) = ctx.bounds.intersect(ray) else {
            return self.background;
        };

        let mut color = Vec3::ZERO;
        let mut alpha = 0.0f32;
        let mut t = near + ctx.step * 0.5;
        while t < far {
            let voxel = ray.at(t) / ctx.spacing;
            let intensity = Interpolator::trilinear_interpolate(&ctx.scene.volume, voxel);
            let [r, g, b, a] = ctx.lut.sample(intensity);
            if a > 0.0 {
                let a = corrected_opacity(a, ctx.step);
                let mut sample = Vec3::new(r, g, b);
                if ctx.shade {
                    sample = shade(ctx, sample, voxel, ray.direction);
                }
                color += sample * ((1.0 - alpha) * a);
                alpha += (1.0 - alpha) * a;
                if alpha >= EARLY_TERMINATION_ALPHA {
                    break;
                }
            }
            t += ctx.step;
        }

        color + self.background * (1.0 - alpha)
    }
}

/// Two-sided Phong with the light at the camera.
fn shade(ctx: &RayContext<'_>, color: Vec3, voxel: Vec3, direction: Vec3) -> Vec3 {
    let lighting = ctx.lighting;
    let gradient = Interpolator::gradient(&ctx.scene.volume, voxel, ctx.spacing);
    let n_dot_l = match gradient.try_normalize() {
        Some(normal) => normal.dot(-direction).abs(),
        None => 1.0,
    };
    let specular = lighting.specular * n_dot_l.powf(lighting.specular_power);
    color * (lighting.ambient + lighting.diffuse * n_dot_l) + Vec3::splat(specular)
}

#[inline]
fn to_rgba8(color: Vec3) -> [u8; 4] {
    let c = (color.clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
    [c.x as u8, c.y as u8, c.z as u8, 255]
}

impl Renderer for CpuRaycaster {
    fn render(
        &mut self,
        scene: &RenderableVolume,
        camera: &Camera,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::EmptyTarget);
        }

        let this = &*self;
        let property = &scene.property;
        let lut = TransferLut::bake(&property.color, &property.opacity);
        let row_len = width as usize * 4;
        let mut pixels = vec![0u8; row_len * height as usize];

        if lut.is_transparent() {
            let background = to_rgba8(this.background);
            pixels
                .par_chunks_mut(4)
                .for_each(|px| px.copy_from_slice(&background));
        } else {
            let ctx = RayContext {
                scene,
                lut: &lut,
                bounds: scene.bounds(),
                spacing: scene.spacing(),
                step: scene.sample_step(this.sample_distance),
                shade: property.shade,
                lighting: property.lighting,
            };
            pixels
                .par_chunks_mut(row_len)
                .enumerate()
                .for_each(|(y, row)| {
                    for (x, px) in row.chunks_exact_mut(4).enumerate() {
                        let ray = camera.ray(x as u32, y as u32, width, height);
                        px.copy_from_slice(&to_rgba8(this.cast(&ctx, &ray)));
                    }
                });
        }

        RgbaImage::from_raw(width, height, pixels).ok_or(RenderError::EmptyTarget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intensity::NormalizedVolume;
    use crate::transfer_function::{OpacityTransferFunction, VolumeProperty};
    use ndarray::Array3;

    fn block_scene(property: VolumeProperty) -> RenderableVolume {
        let data = Array3::from_shape_fn((8, 8, 8), |(z, y, x)| {
            if (2..6).contains(&z) && (2..6).contains(&y) && (2..6).contains(&x) {
                255
            } else {
                0
            }
        });
        RenderableVolume::new(NormalizedVolume::new(data, (1.0, 1.0, 1.0)), property)
    }

    fn framed_camera(scene: &RenderableVolume) -> Camera {
        let mut camera = Camera::default();
        camera.reset(&scene.bounds());
        camera
    }

    #[test]
    fn opaque_block_is_visible_at_centre() {
        let scene = block_scene(VolumeProperty::default());
        let camera = framed_camera(&scene);

        let image = CpuRaycaster::default().render(&scene, &camera, 32, 32).unwrap();
        let centre = image.get_pixel(16, 16).0;
        assert!(centre[0] > 128, "centre pixel {centre:?}");
        assert!(centre[1] > 128, "centre pixel {centre:?}");
        assert_eq!(centre[3], 255);
    }

    #[test]
    fn corners_show_background() {
        let scene = block_scene(VolumeProperty::default());
        let camera = framed_camera(&scene);

        let image = CpuRaycaster::default().render(&scene, &camera, 32, 32).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn transparent_curve_renders_black() {
        let mut opacity = OpacityTransferFunction::new();
        opacity.add_point(0.0, 0.0).unwrap();
        opacity.add_point(255.0, 0.0).unwrap();
        let scene = block_scene(VolumeProperty {
            opacity,
            ..VolumeProperty::default()
        });
        let camera = framed_camera(&scene);

        let image = CpuRaycaster::default().render(&scene, &camera, 16, 16).unwrap();
        assert!(image.pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn empty_target_is_rejected() {
        let scene = block_scene(VolumeProperty::default());
        let camera = framed_camera(&scene);

        assert!(matches!(
            CpuRaycaster::default().render(&scene, &camera, 0, 16),
            Err(RenderError::EmptyTarget)
        ));
    }
}
