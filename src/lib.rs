//! # DICOM volume viewer
//!
//! This crate reconstructs a 3D volume from a directory of DICOM slices and
//! renders it with a color and opacity transfer function whose opacity can
//! be adjusted interactively.

//!
//! The pipeline is split along three seams so back ends can be swapped:
//!  - [`VolumeDecoder`] reads a directory into a [`Volume`]. The default
//!    [`VolumeLoader`] builds on dicom-rs and reads the files in parallel
//!    using rayon.
//!  - [`Renderer`] turns a [`RenderableVolume`] into an RGBA frame, either
//!    on the CPU ([`CpuRaycaster`]) or with a wgpu compute shader
//!    ([`GpuRaycaster`]).
//!  - [`InteractionLoop`] feeds [`ViewerEvent`]s to a [`ViewerSession`]
//!    until its window closes. The `gui` feature provides an FLTK window.
//!
//! Native intensities are always stretched onto `[0, 255]` before
//! rendering. Series with a constant intensity are rejected instead of
//! producing a division by zero.
//!
//! # Examples
//!
//! ## Reconstructing a series and adjusting the opacity
//!
//! ```no_run
//! # use dicom_volume_viewer::{
//! #     CpuRaycaster, Reconstructor, ScriptedLoop, ViewerConfig, ViewerEvent, VolumeLoader,
//! # };
//! let config = ViewerConfig::new();
//! let mut reconstructor = Reconstructor::new(VolumeLoader::new(config.sort_by), config, |config| {
//!     Ok(Box::new(CpuRaycaster::new(config.sample_distance)))
//! });
//! let mut session = reconstructor
//!     .prepare("dicom")
//!     .expect("should have reconstructed the series");
//! session
//!     .dispatch(ViewerEvent::SliderInteraction(0.3))
//!     .expect("should have redrawn");
//! let frame = session.frame().expect("should have rendered a frame");
//! frame.save("result.png").expect("should have written the frame");
//! ```

pub mod app;
pub mod camera;
pub mod config;
pub mod cpu_raycaster;
pub mod enums;
pub mod gpu_raycaster;
#[cfg(feature = "gui")]
pub mod gui;
pub mod intensity;
mod interpolator;
pub mod pipeline;
pub mod renderer;
pub mod session;
pub mod transfer_function;
pub mod volume;
pub mod volume_loader;
pub mod widgets;

pub use app::{DirectoryPicker, ErrorSurface, UiState, ViewerApp};
pub use camera::Camera;
pub use config::ViewerConfig;
pub use cpu_raycaster::CpuRaycaster;
pub use enums::{Processor, SortBy};
pub use gpu_raycaster::{GpuRaycaster, WGPU};
pub use intensity::{NormalizeError, NormalizedVolume, normalize};
pub use pipeline::{ReconstructError, Reconstructor};
pub use renderer::{RenderError, RenderableVolume, Renderer};
pub use session::{InteractionLoop, LoopControl, ScriptedLoop, SessionError, ViewerEvent, ViewerSession};
pub use transfer_function::{
    ColorTransferFunction, OpacityTransferFunction, VolumeProperty, apply_opacity,
};
pub use volume::{IntensityRange, Volume};
pub use volume_loader::{VolumeDecoder, VolumeLoader, VolumeLoaderError};
