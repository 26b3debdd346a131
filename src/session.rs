use std::collections::VecDeque;

use image::RgbaImage;
use thiserror::Error;
use web_time::Instant;

use crate::{
    camera::Camera,
    config::ViewerConfig,
    renderer::{RenderError, RenderableVolume, Renderer},
    transfer_function::{
        ColorTransferFunction, OpacityTransferFunction, SLIDER_REFERENCE_INTENSITY, apply_opacity,
    },
    widgets::{SliderRepresentation, TextLabel},
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Input delivered to a session by its interaction loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ViewerEvent {
    /// Slider moved to `value`; fired continuously while dragging.
    SliderInteraction(f32),
    /// Rotate the camera, in degrees.
    Orbit { dx: f32, dy: f32 },
    /// Dolly by a factor; above 1 moves closer.
    Zoom(f32),
    ResetCamera,
    Resize { width: u32, height: u32 },
    Close,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Exit,
}

/// State of one render window, from the first frame until it is closed.
pub struct ViewerSession {
    scene: RenderableVolume,
    camera: Camera,
    slider: SliderRepresentation,
    label: TextLabel,
    renderer: Box<dyn Renderer>,
    size: (u32, u32),
    frame: Option<RgbaImage>,
    redraws: u64,
}

impl ViewerSession {
    pub fn new(scene: RenderableVolume, renderer: Box<dyn Renderer>, config: &ViewerConfig) -> Self {
        let mut camera = Camera::new(config.camera_azimuth, config.camera_elevation);
        camera.reset(&scene.bounds());
        let slider = SliderRepresentation::opacity(
            scene.property.opacity.value(SLIDER_REFERENCE_INTENSITY),
        );

        Self {
            scene,
            camera,
            slider,
            label: TextLabel::instructions(),
            renderer,
            size: config.render_size,
            frame: None,
            redraws: 0,
        }
    }

    pub fn scene(&self) -> &RenderableVolume {
        &self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn slider(&self) -> &SliderRepresentation {
        &self.slider
    }

    pub fn label(&self) -> &TextLabel {
        &self.label
    }

    pub fn color(&self) -> &ColorTransferFunction {
        &self.scene.property.color
    }

    pub fn opacity(&self) -> &OpacityTransferFunction {
        &self.scene.property.opacity
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Most recent frame, once the session has rendered.
    pub fn frame(&self) -> Option<&RgbaImage> {
        self.frame.as_ref()
    }

    pub fn redraw_count(&self) -> u64 {
        self.redraws
    }

    /// Replace the whole opacity curve from the slider value, then redraw.
    pub fn apply_opacity(&mut self, value: f32) -> Result<(), SessionError> {
        self.slider.set_value(value);
        self.scene.property.opacity = apply_opacity(self.slider.value());
        log::debug!("opacity at 100 set to {:.3}", self.slider.value());
        self.redraw()
    }

    pub fn dispatch(&mut self, event: ViewerEvent) -> Result<LoopControl, SessionError> {
        match event {
            ViewerEvent::SliderInteraction(value) => self.apply_opacity(value)?,
            ViewerEvent::Orbit { dx, dy } => {
                self.camera.orbit(dx, dy);
                self.redraw()?;
            }
            ViewerEvent::Zoom(factor) => {
                self.camera.dolly(factor);
                self.redraw()?;
            }
            ViewerEvent::ResetCamera => {
                self.camera.reset(&self.scene.bounds());
                self.redraw()?;
            }
            ViewerEvent::Resize { width, height } => {
                let size = (width.max(1), height.max(1));
                if size != self.size {
                    self.size = size;
                    self.redraw()?;
                }
            }
            ViewerEvent::Close => return Ok(LoopControl::Exit),
        }
        Ok(LoopControl::Continue)
    }

    pub fn redraw(&mut self) -> Result<(), SessionError> {
        let (width, height) = self.size;
        let start = Instant::now();
        let frame = self
            .renderer
            .render(&self.scene, &self.camera, width, height)?;
        log::trace!("rendered {width}x{height} frame in {:?}", start.elapsed());
        self.frame = Some(frame);
        self.redraws += 1;
        Ok(())
    }
}

/// Drives a session until its window closes.
pub trait InteractionLoop {
    fn run(&mut self, session: &mut ViewerSession) -> Result<(), SessionError>;
}

/// Replays a fixed list of events; the window counts as closed once the
/// list runs out.
#[derive(Clone, Debug, Default)]
pub struct ScriptedLoop {
    events: VecDeque<ViewerEvent>,
}

impl ScriptedLoop {
    pub fn new(events: impl IntoIterator<Item = ViewerEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }
}

impl InteractionLoop for ScriptedLoop {
    fn run(&mut self, session: &mut ViewerSession) -> Result<(), SessionError> {
        while let Some(event) = self.events.pop_front() {
            if session.dispatch(event)? == LoopControl::Exit {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intensity::NormalizedVolume;
    use crate::transfer_function::VolumeProperty;
    use ndarray::Array3;
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingRenderer {
        calls: Rc<Cell<usize>>,
    }

    impl Renderer for CountingRenderer {
        fn render(
            &mut self,
            _scene: &RenderableVolume,
            _camera: &Camera,
            width: u32,
            height: u32,
        ) -> Result<RgbaImage, RenderError> {
            self.calls.set(self.calls.get() + 1);
            Ok(RgbaImage::new(width, height))
        }
    }

    fn session() -> (ViewerSession, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let volume = NormalizedVolume::new(Array3::zeros((4, 4, 4)), (1.0, 1.0, 1.0));
        let scene = RenderableVolume::new(volume, VolumeProperty::default());
        let renderer = Box::new(CountingRenderer {
            calls: Rc::clone(&calls),
        });
        let config = ViewerConfig::new().with_render_size(8, 8);
        (ViewerSession::new(scene, renderer, &config), calls)
    }

    #[test]
    fn slider_starts_at_initial_curve_reference() {
        let (session, calls) = session();
        assert_eq!(session.slider().value(), 0.0);
        assert_eq!(session.opacity(), &OpacityTransferFunction::initial());
        assert!(session.frame().is_none());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn slider_event_replaces_curve_and_redraws() {
        let (mut session, calls) = session();
        let control = session.dispatch(ViewerEvent::SliderInteraction(0.3)).unwrap();

        assert_eq!(control, LoopControl::Continue);
        assert_eq!(session.opacity(), &apply_opacity(0.3));
        assert_eq!(session.slider().value(), 0.3);
        assert_eq!(calls.get(), 1);
        assert_eq!(session.frame().map(|f| f.dimensions()), Some((8, 8)));
    }

    #[test]
    fn repeated_slider_events_do_not_accumulate_points() {
        let (mut session, _) = session();
        for _ in 0..5 {
            session.dispatch(ViewerEvent::SliderInteraction(0.6)).unwrap();
        }
        assert_eq!(session.opacity().points().len(), 4);
        assert_eq!(session.opacity(), &apply_opacity(0.6));
        assert_eq!(session.redraw_count(), 5);
    }

    #[test]
    fn out_of_range_slider_value_is_clamped() {
        let (mut session, _) = session();
        session.dispatch(ViewerEvent::SliderInteraction(4.0)).unwrap();
        assert_eq!(session.slider().value(), 1.0);
        assert_eq!(session.opacity().value(100.0), 1.0);
    }

    #[test]
    fn color_function_never_changes() {
        let (mut session, _) = session();
        session.dispatch(ViewerEvent::SliderInteraction(0.9)).unwrap();
        session.dispatch(ViewerEvent::Orbit { dx: 10.0, dy: 5.0 }).unwrap();
        assert_eq!(session.color(), &ColorTransferFunction::ct_default());
    }

    #[test]
    fn resize_redraws_only_on_change() {
        let (mut session, calls) = session();
        session.dispatch(ViewerEvent::Resize { width: 8, height: 8 }).unwrap();
        assert_eq!(calls.get(), 0);
        session.dispatch(ViewerEvent::Resize { width: 16, height: 0 }).unwrap();
        assert_eq!(session.size(), (16, 1));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn camera_events_move_and_reset() {
        let (mut session, _) = session();
        let home = session.camera().clone();
        session.dispatch(ViewerEvent::Orbit { dx: 45.0, dy: 0.0 }).unwrap();
        session.dispatch(ViewerEvent::Zoom(2.0)).unwrap();
        assert_ne!(session.camera(), &home);
        session.dispatch(ViewerEvent::ResetCamera).unwrap();
        assert_eq!(session.camera(), &home);
    }

    #[test]
    fn scripted_loop_stops_at_close() {
        let (mut session, calls) = session();
        let mut script = ScriptedLoop::new([
            ViewerEvent::SliderInteraction(0.2),
            ViewerEvent::Close,
            ViewerEvent::SliderInteraction(0.7),
        ]);
        script.run(&mut session).unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(session.slider().value(), 0.2);
    }
}
