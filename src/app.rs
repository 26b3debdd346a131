use std::path::PathBuf;

use crate::{
    pipeline::{ReconstructError, Reconstructor},
    session::InteractionLoop,
    volume_loader::VolumeDecoder,
};

pub const ERROR_TITLE: &str = "Error";

/// Source of a directory path, typically a folder dialog.
pub trait DirectoryPicker {
    /// `None` when the user cancels.
    fn pick(&mut self) -> Option<PathBuf>;
}

/// Where user-facing errors are shown.
pub trait ErrorSurface {
    fn show_error(&mut self, title: &str, message: &str);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UiState {
    #[default]
    Idle,
    Reconstructing,
}

/// Idle window state: the path entry and the reconstruct command.
pub struct ViewerApp<D: VolumeDecoder> {
    path_entry: String,
    state: UiState,
    reconstructor: Reconstructor<D>,
}

impl<D: VolumeDecoder> ViewerApp<D> {
    pub fn new(reconstructor: Reconstructor<D>) -> Self {
        Self {
            path_entry: String::new(),
            state: UiState::Idle,
            reconstructor,
        }
    }

    pub fn path_entry(&self) -> &str {
        &self.path_entry
    }

    /// Manual edit of the entry field.
    pub fn set_path_entry(&mut self, text: impl Into<String>) {
        self.path_entry = text.into();
    }

    pub fn state(&self) -> UiState {
        self.state
    }

    pub fn reconstructor(&self) -> &Reconstructor<D> {
        &self.reconstructor
    }

    /// Ask `picker` for a directory and show it in the entry field.
    /// Returns whether the field changed.
    pub fn browse(&mut self, picker: &mut dyn DirectoryPicker) -> bool {
        match picker.pick() {
            Some(path) if !path.as_os_str().is_empty() => {
                self.path_entry = path.display().to_string();
                true
            }
            _ => false,
        }
    }

    /// Reconstruct from the entry field and block until the render window
    /// closes. Failures are reported on `errors` and the app returns to
    /// [`UiState::Idle`] either way.
    pub fn reconstruct(
        &mut self,
        interaction: &mut dyn InteractionLoop,
        errors: &mut dyn ErrorSurface,
    ) -> Result<(), ReconstructError> {
        self.state = UiState::Reconstructing;
        let result = self.reconstructor.run(&self.path_entry, interaction);
        self.state = UiState::Idle;

        if let Err(err) = &result {
            match err {
                ReconstructError::NoFolderSelected => log::warn!("reconstruct requested without a folder"),
                other => log::error!("reconstruction of {:?} failed: {}", self.path_entry, other),
            }
            errors.show_error(ERROR_TITLE, &err.user_message());
        }
        result
    }
}
