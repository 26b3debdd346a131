use std::path::Path;

use thiserror::Error;
use web_time::Instant;

use crate::{
    config::ViewerConfig,
    intensity::{NormalizeError, normalize},
    renderer::{RenderError, RenderableVolume, Renderer},
    session::{InteractionLoop, SessionError, ViewerSession},
    transfer_function::VolumeProperty,
    volume_loader::{VolumeDecoder, VolumeLoaderError},
};

#[derive(Debug, Error)]
pub enum ReconstructError {
    #[error("please select a folder!")]
    NoFolderSelected,

    #[error("could not read the DICOM series: {0}")]
    Decode(#[from] VolumeLoaderError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ReconstructError {
    /// One line suitable for an error dialog.
    pub fn user_message(&self) -> String {
        let mut message = self.to_string();
        if let Some(first) = message.get(..1) {
            let upper = first.to_uppercase();
            message.replace_range(..1, &upper);
        }
        message
    }
}

type RendererFactory = Box<dyn FnMut(&ViewerConfig) -> Result<Box<dyn Renderer>, RenderError>>;

/// Turns a directory into a ready-to-show [`ViewerSession`].
pub struct Reconstructor<D: VolumeDecoder> {
    decoder: D,
    config: ViewerConfig,
    make_renderer: RendererFactory,
}

impl<D: VolumeDecoder> Reconstructor<D> {
    pub fn new(
        decoder: D,
        config: ViewerConfig,
        make_renderer: impl FnMut(&ViewerConfig) -> Result<Box<dyn Renderer>, RenderError> + 'static,
    ) -> Self {
        Self {
            decoder,
            config,
            make_renderer: Box::new(make_renderer),
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Decode, normalize and configure, then render the first frame.
    ///
    /// # Errors
    ///
    /// An empty or blank `path_text` fails with
    /// [`ReconstructError::NoFolderSelected`] before the decoder is touched.
    /// Otherwise the text is used as the path verbatim.
    pub fn prepare(&mut self, path_text: &str) -> Result<ViewerSession, ReconstructError> {
        if path_text.trim().is_empty() {
            return Err(ReconstructError::NoFolderSelected);
        }

        let start = Instant::now();
        let volume = self.decoder.decode(Path::new(path_text))?;
        let range = volume.scalar_range();
        log::info!(
            "decoded {:?} volume, intensity range [{}, {}]",
            volume.dim(),
            range.min,
            range.max
        );

        let normalized = normalize(&volume)?;
        drop(volume);

        let scene = RenderableVolume::new(normalized, VolumeProperty::default());
        let renderer = (self.make_renderer)(&self.config)?;
        let mut session = ViewerSession::new(scene, renderer, &self.config);
        session.redraw()?;
        log::info!("reconstruction ready in {:?}", start.elapsed());

        Ok(session)
    }

    /// Prepare a session and hand it to `interaction` until the window
    /// closes. The session is dropped before returning.
    pub fn run(
        &mut self,
        path_text: &str,
        interaction: &mut dyn InteractionLoop,
    ) -> Result<(), ReconstructError> {
        let mut session = self.prepare(path_text)?;
        interaction.run(&mut session)?;
        log::info!("render window closed after {} redraws", session.redraw_count());
        Ok(())
    }
}
