//! Piecewise-linear color and opacity transfer functions over the 8-bit
//! display range.

use thiserror::Error;

pub const LUT_SIZE: usize = 256;

/// Intensity at which the initial slider value is sampled.
pub const SLIDER_REFERENCE_INTENSITY: f32 = 50.0;

#[derive(Debug, Error, PartialEq)]
pub enum TransferFunctionError {
    #[error("opacity {0} is outside [0, 1]")]
    OpacityOutOfRange(f32),

    #[error("control point intensity must be finite")]
    NonFiniteIntensity,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorPoint {
    pub intensity: f32,
    pub rgb: [f32; 3],
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OpacityPoint {
    pub intensity: f32,
    pub opacity: f32,
}

/// Insert keeping intensities strictly increasing; an existing point at the
/// same intensity is replaced.
fn insert_sorted<T>(points: &mut Vec<T>, point: T, intensity: impl Fn(&T) -> f32) {
    let x = intensity(&point);
    match points.binary_search_by(|p| intensity(p).total_cmp(&x)) {
        Ok(index) => points[index] = point,
        Err(index) => points.insert(index, point),
    }
}

/// Locate the segment containing `x` and the interpolation weight within it.
/// Outside the point range the nearest end point is used.
fn segment<T>(points: &[T], x: f32, intensity: impl Fn(&T) -> f32) -> Option<(usize, usize, f32)> {
    let last = points.len().checked_sub(1)?;
    if x <= intensity(&points[0]) {
        return Some((0, 0, 0.0));
    }
    if x >= intensity(&points[last]) {
        return Some((last, last, 0.0));
    }
    let upper = points.partition_point(|p| intensity(p) <= x);
    let lower = upper - 1;
    let (x0, x1) = (intensity(&points[lower]), intensity(&points[upper]));
    Some((lower, upper, (x - x0) / (x1 - x0)))
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColorTransferFunction {
    points: Vec<ColorPoint>,
}

impl ColorTransferFunction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Black at 0, red at 30, yellow at 255.
    pub fn ct_default() -> Self {
        let mut color = Self::new();
        color.add_rgb_point(0.0, [0.0, 0.0, 0.0]);
        color.add_rgb_point(30.0, [1.0, 0.0, 0.0]);
        color.add_rgb_point(255.0, [1.0, 1.0, 0.0]);
        color
    }

    pub fn add_rgb_point(&mut self, intensity: f32, rgb: [f32; 3]) {
        let rgb = rgb.map(|c| c.clamp(0.0, 1.0));
        insert_sorted(&mut self.points, ColorPoint { intensity, rgb }, |p| p.intensity);
    }

    pub fn points(&self) -> &[ColorPoint] {
        &self.points
    }

    /// Color at `x`; black when the function has no points.
    pub fn color(&self, x: f32) -> [f32; 3] {
        let Some((lower, upper, t)) = segment(&self.points, x, |p| p.intensity) else {
            return [0.0; 3];
        };
        let (a, b) = (self.points[lower].rgb, self.points[upper].rgb);
        [
            a[0] + (b[0] - a[0]) * t,
            a[1] + (b[1] - a[1]) * t,
            a[2] + (b[2] - a[2]) * t,
        ]
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OpacityTransferFunction {
    points: Vec<OpacityPoint>,
}

impl OpacityTransferFunction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transparent up to 100, half opaque at 150, fully opaque at 255.
    pub fn initial() -> Self {
        Self::from_fixed_points(&[(0.0, 0.0), (100.0, 0.0), (150.0, 0.5), (255.0, 1.0)])
    }

    // Only for curves whose values are known to be in range.
    fn from_fixed_points(points: &[(f32, f32)]) -> Self {
        Self {
            points: points
                .iter()
                .map(|&(intensity, opacity)| OpacityPoint { intensity, opacity })
                .collect(),
        }
    }

    pub fn add_point(&mut self, intensity: f32, opacity: f32) -> Result<(), TransferFunctionError> {
        if !intensity.is_finite() {
            return Err(TransferFunctionError::NonFiniteIntensity);
        }
        if !(0.0..=1.0).contains(&opacity) {
            return Err(TransferFunctionError::OpacityOutOfRange(opacity));
        }
        insert_sorted(&mut self.points, OpacityPoint { intensity, opacity }, |p| p.intensity);
        Ok(())
    }

    pub fn remove_all_points(&mut self) {
        self.points.clear();
    }

    pub fn points(&self) -> &[OpacityPoint] {
        &self.points
    }

    /// Opacity at `x`; zero when the function has no points.
    pub fn value(&self, x: f32) -> f32 {
        let Some((lower, upper, t)) = segment(&self.points, x, |p| p.intensity) else {
            return 0.0;
        };
        let (a, b) = (self.points[lower].opacity, self.points[upper].opacity);
        a + (b - a) * t
    }
}

/// Opacity curve installed by the slider.
///
/// The knee sits at 200 rather than the 150 of [`OpacityTransferFunction::initial`],
/// so the first slider event changes the curve shape as well as the value at 100.
pub fn apply_opacity(value1: f32) -> OpacityTransferFunction {
    let value1 = if value1.is_finite() {
        value1.clamp(0.0, 1.0)
    } else {
        0.0
    };
    OpacityTransferFunction::from_fixed_points(&[
        (0.0, 0.0),
        (100.0, value1),
        (200.0, 0.5),
        (255.0, 1.0),
    ])
}

/// Lighting coefficients used when shading is enabled.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lighting {
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
    pub specular_power: f32,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient: 0.1,
            diffuse: 0.7,
            specular: 0.2,
            specular_power: 10.0,
        }
    }
}

/// Appearance of a rendered volume.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeProperty {
    pub color: ColorTransferFunction,
    pub opacity: OpacityTransferFunction,
    pub shade: bool,
    pub lighting: Lighting,
}

impl Default for VolumeProperty {
    fn default() -> Self {
        Self {
            color: ColorTransferFunction::ct_default(),
            opacity: OpacityTransferFunction::initial(),
            shade: true,
            lighting: Lighting::default(),
        }
    }
}

/// Both transfer functions evaluated at every display intensity.
#[derive(Clone, Debug)]
pub struct TransferLut {
    entries: Vec<[f32; 4]>,
}

impl TransferLut {
    pub fn bake(color: &ColorTransferFunction, opacity: &OpacityTransferFunction) -> Self {
        let entries = (0..LUT_SIZE)
            .map(|i| {
                let x = i as f32;
                let [r, g, b] = color.color(x);
                [r, g, b, opacity.value(x)]
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[[f32; 4]] {
        &self.entries
    }

    /// Linear lookup between neighbouring entries.
    #[inline]
    pub fn sample(&self, intensity: f32) -> [f32; 4] {
        let x = intensity.clamp(0.0, (LUT_SIZE - 1) as f32);
        let i0 = x.floor() as usize;
        let i1 = (i0 + 1).min(LUT_SIZE - 1);
        let t = x - i0 as f32;
        let (a, b) = (self.entries[i0], self.entries[i1]);
        [
            a[0] + (b[0] - a[0]) * t,
            a[1] + (b[1] - a[1]) * t,
            a[2] + (b[2] - a[2]) * t,
            a[3] + (b[3] - a[3]) * t,
        ]
    }

    /// True when no intensity contributes any opacity.
    pub fn is_transparent(&self) -> bool {
        self.entries.iter().all(|e| e[3] <= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(tf: &OpacityTransferFunction) -> Vec<(f32, f32)> {
        tf.points().iter().map(|p| (p.intensity, p.opacity)).collect()
    }

    #[test]
    fn slider_curve_has_fixed_knees() {
        let tf = apply_opacity(0.3);
        assert_eq!(
            curve(&tf),
            vec![(0.0, 0.0), (100.0, 0.3), (200.0, 0.5), (255.0, 1.0)]
        );
    }

    #[test]
    fn slider_curve_is_idempotent() {
        let first = apply_opacity(0.8);
        let second = apply_opacity(0.8);
        assert_eq!(first, second);
        assert_eq!(second.points().len(), 4);
    }

    #[test]
    fn slider_curve_clamps_value() {
        assert_eq!(apply_opacity(1.7).value(100.0), 1.0);
        assert_eq!(apply_opacity(-0.2).value(100.0), 0.0);
        assert_eq!(apply_opacity(f32::NAN).value(100.0), 0.0);
    }

    #[test]
    fn default_color_ramp() {
        let color = ColorTransferFunction::ct_default();
        let points: Vec<_> = color.points().iter().map(|p| (p.intensity, p.rgb)).collect();
        assert_eq!(
            points,
            vec![
                (0.0, [0.0, 0.0, 0.0]),
                (30.0, [1.0, 0.0, 0.0]),
                (255.0, [1.0, 1.0, 0.0]),
            ]
        );
        assert_eq!(color, ColorTransferFunction::ct_default());
    }

    #[test]
    fn color_interpolates_linearly() {
        let color = ColorTransferFunction::ct_default();
        assert_eq!(color.color(15.0), [0.5, 0.0, 0.0]);
        assert_eq!(color.color(-10.0), [0.0, 0.0, 0.0]);
        assert_eq!(color.color(300.0), [1.0, 1.0, 0.0]);
    }

    #[test]
    fn initial_opacity_values() {
        let tf = OpacityTransferFunction::initial();
        assert_eq!(tf.value(SLIDER_REFERENCE_INTENSITY), 0.0);
        assert_eq!(tf.value(100.0), 0.0);
        assert_eq!(tf.value(125.0), 0.25);
        assert_eq!(tf.value(150.0), 0.5);
        assert_eq!(tf.value(255.0), 1.0);
    }

    #[test]
    fn add_point_replaces_same_intensity() {
        let mut tf = OpacityTransferFunction::new();
        tf.add_point(100.0, 0.2).unwrap();
        tf.add_point(0.0, 0.0).unwrap();
        tf.add_point(100.0, 0.6).unwrap();

        assert_eq!(curve(&tf), vec![(0.0, 0.0), (100.0, 0.6)]);
    }

    #[test]
    fn add_point_rejects_invalid_values() {
        let mut tf = OpacityTransferFunction::new();
        assert_eq!(
            tf.add_point(10.0, 1.5),
            Err(TransferFunctionError::OpacityOutOfRange(1.5))
        );
        assert_eq!(
            tf.add_point(f32::INFINITY, 0.5),
            Err(TransferFunctionError::NonFiniteIntensity)
        );
        assert!(tf.points().is_empty());
    }

    #[test]
    fn remove_all_points_empties_function() {
        let mut tf = OpacityTransferFunction::initial();
        tf.remove_all_points();
        assert!(tf.points().is_empty());
        assert_eq!(tf.value(200.0), 0.0);
    }

    #[test]
    fn lut_matches_functions() {
        let property = VolumeProperty::default();
        let lut = TransferLut::bake(&property.color, &property.opacity);

        assert_eq!(lut.entries().len(), LUT_SIZE);
        assert_eq!(lut.sample(255.0), [1.0, 1.0, 0.0, 1.0]);
        assert_eq!(lut.sample(0.0), [0.0, 0.0, 0.0, 0.0]);
        assert!(!lut.is_transparent());
    }
}
