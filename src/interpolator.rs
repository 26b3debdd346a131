use glam::Vec3;

use crate::intensity::NormalizedVolume;

pub(crate) struct Interpolator;

impl Interpolator {
    /// Sample `volume` at continuous voxel coordinates (x, y, z). Coordinates
    /// outside the grid are clamped to the edge voxels.
    #[inline]
    pub(crate) fn trilinear_interpolate(volume: &NormalizedVolume, voxel: Vec3) -> f32 {
        let x0 = voxel.x.floor();
        let y0 = voxel.y.floor();
        let z0 = voxel.z.floor();

        let dx = voxel.x - x0;
        let dy = voxel.y - y0;
        let dz = voxel.z - z0;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;
        let one_minus_dz = 1.0 - dz;

        let (x0, y0, z0) = (x0 as isize, y0 as isize, z0 as isize);
        let v = |z: isize, y: isize, x: isize| volume.voxel(z, y, x) as f32;

        let c00 = v(z0, y0, x0).mul_add(one_minus_dx, v(z0, y0, x0 + 1) * dx);
        let c01 = v(z0, y0 + 1, x0).mul_add(one_minus_dx, v(z0, y0 + 1, x0 + 1) * dx);
        let c10 = v(z0 + 1, y0, x0).mul_add(one_minus_dx, v(z0 + 1, y0, x0 + 1) * dx);
        let c11 = v(z0 + 1, y0 + 1, x0).mul_add(one_minus_dx, v(z0 + 1, y0 + 1, x0 + 1) * dx);

        let c0 = c00.mul_add(one_minus_dy, c01 * dy);
        let c1 = c10.mul_add(one_minus_dy, c11 * dy);

        c0.mul_add(one_minus_dz, c1 * dz)
    }

    /// Central-difference gradient in world units.
    #[inline]
    pub(crate) fn gradient(volume: &NormalizedVolume, voxel: Vec3, spacing: Vec3) -> Vec3 {
        let sample = |offset: Vec3| Self::trilinear_interpolate(volume, voxel + offset);
        let diff = Vec3::new(
            sample(Vec3::X) - sample(-Vec3::X),
            sample(Vec3::Y) - sample(-Vec3::Y),
            sample(Vec3::Z) - sample(-Vec3::Z),
        );
        diff / (2.0 * spacing)
    }
}
