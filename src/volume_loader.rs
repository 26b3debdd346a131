use crate::{enums::SortBy, volume::Volume};

use dicom::{
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use ndarray::{Array2, Array3, s};
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

const DEFAULT_SPACING: f32 = 1.0;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

/// Turns a directory of slices into a [`Volume`].
pub trait VolumeDecoder {
    fn decode(&self, path: &Path) -> Result<Volume, VolumeLoaderError>;
}

struct DecodedSlice {
    order: Option<f32>,
    position: Option<[f32; 3]>,
    image: Array2<f32>,
}

#[derive(Default)]
pub struct VolumeLoader {
    sort_by: SortBy,
}

impl VolumeLoader {
    pub fn new(sort_by: SortBy) -> Self {
        Self { sort_by }
    }

    /// Load a volume from DICOM objects
    ///
    /// # Arguments
    ///
    /// * `dicom_objects` - Slice of DICOM file objects
    /// * `sort_by` - Method to sort the slices
    ///
    /// # Errors
    ///
    /// Returns error if no valid images found or dimensions are inconsistent
    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let mut slices: Vec<_> = dicom_objects
            .par_iter()
            .filter_map(|dicom_object| Self::extract_slice(dicom_object, &sort_by))
            .collect();

        if slices.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        Self::sort_slices(&mut slices, sort_by);
        Self::validate_dimensions(&slices)?;

        let spacing = Self::get_spacing(dicom_objects, &slices);
        let volume_array = Self::build_volume_array(&slices);
        log::info!(
            "assembled {} slices into a {:?} volume, spacing {:?}",
            slices.len(),
            volume_array.dim(),
            spacing
        );

        Ok(Volume::new(volume_array, spacing))
    }

    /// Load a volume from file paths
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path> + Sync],
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let objects: Result<Vec<_>, _> = paths
            .par_iter()
            .map(|path| open_file(path.as_ref()))
            .collect();

        Self::load_from_dicom_objects(&objects?, sort_by)
    }

    /// Load a volume from every DICOM file in a directory.
    ///
    /// Series are often stored without a file extension, so every regular
    /// file is tried and the ones that do not parse as DICOM are skipped.
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(VolumeLoaderError::NotADirectory(path.to_path_buf()));
        }

        let mut paths: Vec<_> = fs::read_dir(path)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        log::info!("reading {} files from {}", paths.len(), path.display());

        let objects: Vec<_> = paths
            .par_iter()
            .filter_map(|path| match open_file(path) {
                Ok(object) => Some(object),
                Err(e) => {
                    log::debug!("skipping {}: {}", path.display(), e);
                    None
                }
            })
            .collect();

        if objects.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        Self::load_from_dicom_objects(&objects, sort_by)
    }

    fn extract_slice(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<DecodedSlice> {
        let order = Self::get_sort_order(dicom_object, sort_by)?;
        let image = Self::decode_image(dicom_object)?;
        Some(DecodedSlice {
            order,
            position: Self::get_position(dicom_object),
            image,
        })
    }

    fn get_sort_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<Option<f32>> {
        match sort_by {
            SortBy::ImagePositionPatient => Some(Self::get_position(dicom_object)?.get(2).copied()),
            SortBy::TablePosition => {
                let pos = dicom_object
                    .element(tags::TABLE_POSITION)
                    .ok()?
                    .to_float32()
                    .ok();
                Some(pos)
            }
            SortBy::InstanceNumber => {
                let num = dicom_object
                    .element(tags::INSTANCE_NUMBER)
                    .ok()?
                    .to_int::<i32>()
                    .ok()
                    .map(|n| n as f32);
                Some(num)
            }
            SortBy::None => Some(Some(0.0)),
        }
    }

    fn get_position(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<[f32; 3]> {
        let pos = dicom_object
            .element(tags::IMAGE_POSITION_PATIENT)
            .ok()?
            .to_multi_float32()
            .ok()?;
        match pos.as_slice() {
            [x, y, z, ..] => Some([*x, *y, *z]),
            _ => None,
        }
    }

    // Modality LUT only; windowing is left to the normalization step.
    fn decode_image(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<Array2<f32>> {
        let pixel_data = dicom_object.decode_pixel_data().ok()?;
        let options = ConvertOptions::new().with_voi_lut(VoiLutOption::Identity);
        pixel_data
            .to_ndarray_with_options::<f32>(&options)
            .ok()
            .map(|arr| arr.slice_move(s![0, .., .., 0]))
    }

    fn sort_slices(slices: &mut [DecodedSlice], sort_by: SortBy) {
        if !matches!(sort_by, SortBy::None) {
            slices.sort_by(|a, b| {
                a.order
                    .partial_cmp(&b.order)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        if matches!(sort_by, SortBy::ImagePositionPatient) {
            slices.reverse();
        }
    }

    fn validate_dimensions(slices: &[DecodedSlice]) -> Result<(), VolumeLoaderError> {
        let first_dim = slices[0].image.dim();
        if slices.iter().any(|slice| slice.image.dim() != first_dim) {
            return Err(VolumeLoaderError::InconsistentDimensions);
        }
        Ok(())
    }

    fn build_volume_array(slices: &[DecodedSlice]) -> Array3<f32> {
        let (height, width) = slices[0].image.dim();
        let depth = slices.len();
        let mut volume = Array3::<f32>::zeros((depth, height, width));

        for (i, slice) in slices.iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(&slice.image);
        }

        volume
    }

    fn get_spacing(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        slices: &[DecodedSlice],
    ) -> (f32, f32, f32) {
        // PixelSpacing is (row spacing, column spacing), i.e. (y, x).
        let in_plane = dicom_objects.iter().find_map(|dicom_object| {
            let pixel_spacing = dicom_object
                .element(tags::PIXEL_SPACING)
                .ok()?
                .to_multi_float32()
                .ok()?;
            match pixel_spacing.as_slice() {
                [row, column, ..] => Some((*column, *row)),
                _ => None,
            }
        });

        let between_slices = dicom_objects
            .iter()
            .find_map(|dicom_object| Self::get_positive_float(dicom_object, tags::SPACING_BETWEEN_SLICES))
            .or_else(|| Self::position_distance(slices))
            .or_else(|| {
                dicom_objects
                    .iter()
                    .find_map(|dicom_object| Self::get_positive_float(dicom_object, tags::SLICE_THICKNESS))
            });

        let (x, y) = in_plane.unwrap_or_else(|| {
            log::warn!("no PixelSpacing in series, assuming {DEFAULT_SPACING} mm");
            (DEFAULT_SPACING, DEFAULT_SPACING)
        });
        let z = between_slices.unwrap_or_else(|| {
            log::warn!("no slice spacing in series, assuming {DEFAULT_SPACING} mm");
            DEFAULT_SPACING
        });

        (x, y, z)
    }

    fn get_positive_float(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        tag: dicom::core::Tag,
    ) -> Option<f32> {
        dicom_object
            .element(tag)
            .ok()?
            .to_float32()
            .ok()
            .filter(|v| v.is_finite() && *v > 0.0)
    }

    fn position_distance(slices: &[DecodedSlice]) -> Option<f32> {
        let [first, second, ..] = slices else {
            return None;
        };
        let (a, b) = (first.position?, second.position?);
        let distance = a
            .iter()
            .zip(b.iter())
            .map(|(p, q)| (p - q) * (p - q))
            .sum::<f32>()
            .sqrt();
        (distance > f32::EPSILON).then_some(distance)
    }
}

impl VolumeDecoder for VolumeLoader {
    fn decode(&self, path: &Path) -> Result<Volume, VolumeLoaderError> {
        Self::load_from_directory(path, self.sort_by)
    }
}
