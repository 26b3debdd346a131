use ndarray::Array3;
use ndarray::Zip;

/// Native intensity range of a volume.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntensityRange {
    pub min: f32,
    pub max: f32,
}

impl IntensityRange {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn span(&self) -> f32 {
        self.max - self.min
    }

    /// A range with no contrast cannot be stretched to the display range.
    pub fn is_degenerate(&self) -> bool {
        !self.min.is_finite() || !self.max.is_finite() || self.span() <= 0.0
    }
}

/// Scalar volume as decoded from a series, in native intensity units.
#[derive(Clone, Debug)]
pub struct Volume {
    data: Array3<f32>,
    spacing: (f32, f32, f32),
    scalar_range: IntensityRange,
}

impl Volume {
    pub fn new(data: Array3<f32>, spacing: (f32, f32, f32)) -> Self {
        let scalar_range = Self::compute_scalar_range(&data);
        Self {
            data,
            spacing,
            scalar_range,
        }
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Voxel spacing in mm as (x, y, z)
    pub fn spacing(&self) -> (f32, f32, f32) {
        self.spacing
    }

    pub fn scalar_range(&self) -> IntensityRange {
        self.scalar_range
    }

    fn compute_scalar_range(data: &Array3<f32>) -> IntensityRange {
        if data.is_empty() {
            return IntensityRange::new(0.0, 0.0);
        }
        let (min, max) = Zip::from(data).par_fold(
            || (f32::INFINITY, f32::NEG_INFINITY),
            |(min, max), &v| (min.min(v), max.max(v)),
            |(a_min, a_max), (b_min, b_max)| (a_min.min(b_min), a_max.max(b_max)),
        );
        IntensityRange::new(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_range_covers_all_voxels() {
        let mut data = Array3::<f32>::zeros((2, 3, 4));
        data[[0, 1, 2]] = -1024.0;
        data[[1, 2, 3]] = 3071.0;
        let volume = Volume::new(data, (0.5, 0.5, 1.0));

        assert_eq!(volume.scalar_range(), IntensityRange::new(-1024.0, 3071.0));
        assert_eq!(volume.dim(), (2, 3, 4));
        assert_eq!(volume.spacing(), (0.5, 0.5, 1.0));
    }

    #[test]
    fn constant_volume_has_degenerate_range() {
        let data = Array3::<f32>::from_elem((2, 2, 2), 7.0);
        let volume = Volume::new(data, (1.0, 1.0, 1.0));

        assert!(volume.scalar_range().is_degenerate());
    }
}
