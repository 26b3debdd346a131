use ndarray::Array3;
use ndarray::Zip;
use thiserror::Error;

use crate::volume::{IntensityRange, Volume};

pub const DISPLAY_MAX: f32 = 255.0;

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("series has no intensity contrast (every voxel is {value})")]
    DegenerateRange { value: f32 },
}

/// Volume remapped to the 8-bit display range.
#[derive(Clone, Debug)]
pub struct NormalizedVolume {
    data: Array3<u8>,
    spacing: (f32, f32, f32),
}

impl NormalizedVolume {
    pub fn new(data: Array3<u8>, spacing: (f32, f32, f32)) -> Self {
        Self { data, spacing }
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn data(&self) -> &Array3<u8> {
        &self.data
    }

    pub fn spacing(&self) -> (f32, f32, f32) {
        self.spacing
    }

    /// Voxel value with indices clamped to the volume.
    #[inline]
    pub fn voxel(&self, z: isize, y: isize, x: isize) -> u8 {
        let (depth, height, width) = self.data.dim();
        let z = z.clamp(0, depth as isize - 1) as usize;
        let y = y.clamp(0, height as isize - 1) as usize;
        let x = x.clamp(0, width as isize - 1) as usize;
        self.data[[z, y, x]]
    }
}

/// Affine remap of `value` from `range` onto `[0, 255]`.
///
/// Rounds to the nearest integer so both ends of the range land exactly on
/// 0 and 255.
#[inline]
pub fn normalize_value(value: f32, range: IntensityRange) -> u8 {
    let scale = DISPLAY_MAX / range.span();
    ((value - range.min) * scale).round().clamp(0.0, DISPLAY_MAX) as u8
}

/// Stretch the full native range of `volume` onto the display range.
pub fn normalize(volume: &Volume) -> Result<NormalizedVolume, NormalizeError> {
    let range = volume.scalar_range();
    if range.is_degenerate() {
        return Err(NormalizeError::DegenerateRange { value: range.min });
    }

    let mut data = Array3::<u8>::zeros(volume.dim());
    Zip::from(&mut data)
        .and(volume.data())
        .par_for_each(|out, &v| *out = normalize_value(v, range));

    Ok(NormalizedVolume::new(data, volume.spacing()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_ends_map_exactly() {
        let ranges = [
            IntensityRange::new(0.0, 200.0),
            IntensityRange::new(-1024.0, 3071.0),
            IntensityRange::new(0.1, 0.3),
            IntensityRange::new(-7.0, 4095.0),
        ];
        for range in ranges {
            assert_eq!(normalize_value(range.min, range), 0, "{range:?}");
            assert_eq!(normalize_value(range.max, range), 255, "{range:?}");
        }
    }

    #[test]
    fn remap_is_monotonic() {
        let range = IntensityRange::new(-1024.0, 3071.0);
        let mut previous = 0;
        for step in 0..=4095 {
            let v = range.min + step as f32;
            let mapped = normalize_value(v, range);
            assert!(mapped >= previous, "not monotonic at {v}");
            previous = mapped;
        }
    }

    #[test]
    fn degenerate_range_is_reported() {
        let volume = Volume::new(Array3::from_elem((3, 3, 3), 42.0), (1.0, 1.0, 1.0));

        let err = normalize(&volume).unwrap_err();
        assert_eq!(err, NormalizeError::DegenerateRange { value: 42.0 });
    }

    #[test]
    fn normalize_keeps_shape_and_spacing() {
        let mut data = Array3::<f32>::zeros((2, 2, 2));
        data[[1, 1, 1]] = 200.0;
        let normalized = normalize(&Volume::new(data, (0.7, 0.7, 2.5))).unwrap();

        assert_eq!(normalized.dim(), (2, 2, 2));
        assert_eq!(normalized.spacing(), (0.7, 0.7, 2.5));
        assert_eq!(normalized.data()[[0, 0, 0]], 0);
        assert_eq!(normalized.data()[[1, 1, 1]], 255);
    }

    #[test]
    fn voxel_lookup_clamps_indices() {
        let mut data = Array3::<u8>::zeros((2, 2, 2));
        data[[1, 1, 1]] = 9;
        let volume = NormalizedVolume::new(data, (1.0, 1.0, 1.0));

        assert_eq!(volume.voxel(5, 5, 5), 9);
        assert_eq!(volume.voxel(-1, -1, -1), 0);
    }
}
