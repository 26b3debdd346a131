use crate::enums::{Processor, SortBy};

pub const PROCESSOR_ENV: &str = "DICOM_VIEWER_PROCESSOR";
pub const SORT_BY_ENV: &str = "DICOM_VIEWER_SORT_BY";

/// Settings for one viewer run.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewerConfig {
    pub sort_by: SortBy,
    pub processor: Processor,
    /// Frame size in pixels (width, height).
    pub render_size: (u32, u32),
    /// Distance between ray samples, in units of the smallest voxel spacing.
    pub sample_distance: f32,
    pub window_title: String,
    pub camera_azimuth: f32,
    pub camera_elevation: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            sort_by: SortBy::default(),
            processor: Processor::default(),
            render_size: (600, 600),
            sample_distance: 0.5,
            window_title: "CT 3D Reconstruction".to_string(),
            camera_azimuth: 0.0,
            camera_elevation: 0.0,
        }
    }
}

impl ViewerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, overridden by `DICOM_VIEWER_PROCESSOR` (`cpu`, `gpu`) and
    /// `DICOM_VIEWER_SORT_BY` (`position`, `table`, `instance`, `none`).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(value) = lookup(PROCESSOR_ENV) {
            match parse_processor(&value) {
                Some(processor) => config.processor = processor,
                None => log::warn!("ignoring {PROCESSOR_ENV}={value:?}"),
            }
        }
        if let Some(value) = lookup(SORT_BY_ENV) {
            match parse_sort_by(&value) {
                Some(sort_by) => config.sort_by = sort_by,
                None => log::warn!("ignoring {SORT_BY_ENV}={value:?}"),
            }
        }
        config
    }

    pub fn with_sort_by(mut self, sort_by: SortBy) -> Self {
        self.sort_by = sort_by;
        self
    }

    pub fn with_processor(mut self, processor: Processor) -> Self {
        self.processor = processor;
        self
    }

    /// Zero dimensions are raised to one pixel.
    pub fn with_render_size(mut self, width: u32, height: u32) -> Self {
        self.render_size = (width.max(1), height.max(1));
        self
    }

    /// Non-positive or non-finite distances keep the previous value.
    pub fn with_sample_distance(mut self, sample_distance: f32) -> Self {
        if sample_distance.is_finite() && sample_distance > 0.0 {
            self.sample_distance = sample_distance;
        }
        self
    }

    pub fn with_window_title(mut self, title: impl Into<String>) -> Self {
        self.window_title = title.into();
        self
    }

    pub fn with_camera_angles(mut self, azimuth: f32, elevation: f32) -> Self {
        self.camera_azimuth = azimuth;
        self.camera_elevation = elevation;
        self
    }
}

fn parse_processor(value: &str) -> Option<Processor> {
    match value.trim().to_ascii_lowercase().as_str() {
        "cpu" => Some(Processor::CPU),
        "gpu" => Some(Processor::GPU),
        _ => None,
    }
}

fn parse_sort_by(value: &str) -> Option<SortBy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "position" | "image_position_patient" => Some(SortBy::ImagePositionPatient),
        "table" | "table_position" => Some(SortBy::TablePosition),
        "instance" | "instance_number" => Some(SortBy::InstanceNumber),
        "none" => Some(SortBy::None),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = ViewerConfig::new()
            .with_sort_by(SortBy::InstanceNumber)
            .with_processor(Processor::GPU)
            .with_render_size(0, 300)
            .with_sample_distance(-1.0)
            .with_camera_angles(30.0, 10.0);

        assert_eq!(config.sort_by, SortBy::InstanceNumber);
        assert_eq!(config.processor, Processor::GPU);
        assert_eq!(config.render_size, (1, 300));
        assert_eq!(config.sample_distance, 0.5);
        assert_eq!((config.camera_azimuth, config.camera_elevation), (30.0, 10.0));
    }

    #[test]
    fn environment_overrides() {
        let config = ViewerConfig::from_lookup(|key| match key {
            PROCESSOR_ENV => Some("GPU".to_string()),
            SORT_BY_ENV => Some("instance".to_string()),
            _ => None,
        });
        assert_eq!(config.processor, Processor::GPU);
        assert_eq!(config.sort_by, SortBy::InstanceNumber);
    }

    #[test]
    fn unknown_environment_values_keep_defaults() {
        let config = ViewerConfig::from_lookup(|key| match key {
            PROCESSOR_ENV => Some("tpu".to_string()),
            _ => None,
        });
        assert_eq!(config, ViewerConfig::default());
    }
}
