//! FLTK front end: the idle folder window and the modal render window.

use std::{
    cell::{Cell, RefCell},
    path::PathBuf,
    rc::Rc,
};

use fltk::{
    app,
    button::Button,
    dialog,
    draw,
    enums::{Align, CallbackTrigger, Color, ColorDepth, Event, Font, Key},
    frame::Frame,
    input::Input,
    prelude::*,
    valuator::HorNiceSlider,
    window::Window,
};

use crate::{
    app::{DirectoryPicker, ErrorSurface, ViewerApp},
    session::{InteractionLoop, LoopControl, SessionError, ViewerEvent, ViewerSession},
    volume_loader::VolumeDecoder,
};

const DEGREES_PER_PIXEL: f32 = 0.5;
const ZOOM_STEP: f32 = 1.1;
const SLIDER_MIN_HEIGHT: i32 = 20;

pub struct NativeDirectoryPicker;

impl DirectoryPicker for NativeDirectoryPicker {
    fn pick(&mut self) -> Option<PathBuf> {
        let mut chooser = dialog::NativeFileChooser::new(dialog::NativeFileChooserType::BrowseDir);
        chooser.set_title("Select a DICOM folder");
        chooser.show();
        let path = chooser.filename();
        (!path.as_os_str().is_empty()).then_some(path)
    }
}

pub struct AlertErrorSurface;

impl ErrorSurface for AlertErrorSurface {
    fn show_error(&mut self, title: &str, message: &str) {
        dialog::message_title(title);
        dialog::alert_default(message);
    }
}

type FrameBuffer = Rc<RefCell<Option<(Vec<u8>, i32, i32)>>>;

/// Render window that blocks until the user closes it.
pub struct FltkInteractionLoop {
    title: String,
}

impl FltkInteractionLoop {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    fn present(session: &ViewerSession, buffer: &FrameBuffer, canvas: &mut Frame) {
        if let Some(frame) = session.frame() {
            let (w, h) = frame.dimensions();
            *buffer.borrow_mut() = Some((frame.as_raw().clone(), w as i32, h as i32));
            canvas.redraw();
        }
    }

    fn pump(
        session: &mut ViewerSession,
        window: &Window,
        canvas: &mut Frame,
        buffer: &FrameBuffer,
        receiver: &app::Receiver<ViewerEvent>,
    ) -> Result<(), SessionError> {
        let mut presented = session.redraw_count();
        while window.shown() {
            if !app::wait() {
                break;
            }

            let (w, h) = (canvas.w().max(1) as u32, canvas.h().max(1) as u32);
            if (w, h) != session.size() {
                session.dispatch(ViewerEvent::Resize {
                    width: w,
                    height: h,
                })?;
            }

            while let Some(event) = receiver.recv() {
                if session.dispatch(event)? == LoopControl::Exit {
                    return Ok(());
                }
            }

            if session.redraw_count() != presented {
                presented = session.redraw_count();
                Self::present(session, buffer, canvas);
            }
        }
        Ok(())
    }
}

impl InteractionLoop for FltkInteractionLoop {
    fn run(&mut self, session: &mut ViewerSession) -> Result<(), SessionError> {
        let (width, height) = session.size();
        let (width, height) = (width as i32, height as i32);
        let (sender, receiver) = app::channel::<ViewerEvent>();

        let mut window = Window::new(150, 150, width, height, None);
        window.set_label(&self.title);
        window.set_color(Color::Black);

        let buffer: FrameBuffer = Rc::new(RefCell::new(None));
        let mut canvas = Frame::new(0, 0, width, height, None);
        canvas.draw({
            let buffer = Rc::clone(&buffer);
            move |f| match &*buffer.borrow() {
                Some((data, w, h)) => {
                    if let Err(e) = draw::draw_image(data, f.x(), f.y(), *w, *h, ColorDepth::Rgba8) {
                        log::warn!("failed to draw frame: {e}");
                    }
                }
                None => draw::draw_rect_fill(f.x(), f.y(), f.w(), f.h(), Color::Black),
            }
        });
        canvas.handle({
            let last = Cell::new((0, 0));
            move |f, event| match event {
                Event::Push => {
                    last.set(app::event_coords());
                    let _ = f.take_focus();
                    true
                }
                Event::Drag => {
                    let (x, y) = app::event_coords();
                    let (lx, ly) = last.replace((x, y));
                    sender.send(ViewerEvent::Orbit {
                        dx: (x - lx) as f32 * DEGREES_PER_PIXEL,
                        dy: (ly - y) as f32 * DEGREES_PER_PIXEL,
                    });
                    true
                }
                Event::MouseWheel => {
                    let factor = match app::event_dy() {
                        app::MouseWheel::Up => ZOOM_STEP,
                        app::MouseWheel::Down => 1.0 / ZOOM_STEP,
                        _ => return false,
                    };
                    sender.send(ViewerEvent::Zoom(factor));
                    true
                }
                Event::Focus | Event::Unfocus => true,
                Event::KeyDown if app::event_key() == Key::from_char('r') => {
                    sender.send(ViewerEvent::ResetCamera);
                    true
                }
                _ => false,
            }
        });

        let label = session.label();
        let mut text = Frame::new(
            (label.position.0 * width as f32) as i32,
            ((1.0 - label.position.1) * height as f32) as i32,
            width / 2,
            label.font_size as i32 + 6,
            None,
        );
        text.set_label(&label.text);
        text.set_label_font(Font::Helvetica);
        text.set_label_size(label.font_size as i32);
        let [r, g, b] = label.color.map(|c| (c * 255.0).round() as u8);
        text.set_label_color(Color::from_rgb(r, g, b));
        text.set_align(Align::Inside | Align::Left);

        let rep = session.slider();
        let slider_h = ((rep.slider_width * height as f32) as i32).max(SLIDER_MIN_HEIGHT);
        let slider_x = (rep.point1.0 * width as f32) as i32;
        let slider_w = ((rep.point2.0 - rep.point1.0) * width as f32) as i32;
        // Viewport y grows upwards; leave room for the title beneath.
        let slider_y = ((1.0 - rep.point1.1) * height as f32) as i32 - slider_h - slider_h;
        let mut slider = HorNiceSlider::new(slider_x, slider_y, slider_w, slider_h, None);
        slider.set_label(&rep.title);
        slider.set_label_color(Color::White);
        slider.set_range(rep.minimum() as f64, rep.maximum() as f64);
        slider.set_value(rep.value() as f64);
        slider.set_trigger(CallbackTrigger::Changed);
        slider.set_callback(move |s| sender.send(ViewerEvent::SliderInteraction(s.value() as f32)));

        window.end();
        window.resizable(&canvas);
        window.make_modal(true);
        window.set_callback(move |w| {
            w.hide();
            sender.send(ViewerEvent::Close);
        });
        window.show();

        Self::present(session, &buffer, &mut canvas);
        let result = Self::pump(session, &window, &mut canvas, &buffer, &receiver);
        window.hide();
        Window::delete(window);
        result
    }
}

/// Build the idle window around `viewer` and run the FLTK event loop until
/// it is closed.
pub fn run_app<D: VolumeDecoder + 'static>(viewer: ViewerApp<D>) -> Result<(), fltk::prelude::FltkError> {
    let fltk_app = app::App::default();
    let title = viewer.reconstructor().config().window_title.clone();

    let mut window = Window::new(100, 100, 580, 110, None);
    window.set_label(&title);
    let mut folder_label = Frame::new(10, 15, 100, 30, "Select folder:");
    folder_label.set_align(Align::Inside | Align::Left);
    let mut entry = Input::new(110, 15, 340, 30, None);
    let mut browse = Button::new(460, 15, 100, 30, "Browse");
    let mut reconstruct = Button::new(240, 65, 100, 30, "Reconstruct");
    window.end();
    window.show();

    let viewer = Rc::new(RefCell::new(viewer));

    browse.set_callback({
        let viewer = Rc::clone(&viewer);
        let mut entry = entry.clone();
        move |_| {
            let Ok(mut viewer) = viewer.try_borrow_mut() else {
                return;
            };
            viewer.set_path_entry(entry.value());
            if viewer.browse(&mut NativeDirectoryPicker) {
                entry.set_value(viewer.path_entry());
            }
        }
    });

    reconstruct.set_callback({
        let viewer = Rc::clone(&viewer);
        let entry = entry.clone();
        move |button| {
            let Ok(mut viewer) = viewer.try_borrow_mut() else {
                return;
            };
            viewer.set_path_entry(entry.value());
            button.deactivate();
            let mut interaction = FltkInteractionLoop::new(title.clone());
            if viewer.reconstruct(&mut interaction, &mut AlertErrorSurface).is_ok() {
                log::info!("returned to idle");
            }
            button.activate();
        }
    });

    entry.take_focus().ok();
    fltk_app.run()
}
