use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;

use dicom_volume_viewer::{
    CpuRaycaster, InteractionLoop, OpacityTransferFunction, ReconstructError, Reconstructor, RenderError,
    ScriptedLoop, ViewerConfig, ViewerEvent, Volume, VolumeDecoder, VolumeLoaderError,
    apply_opacity, normalize,
};
use ndarray::Array3;

/// Zero everywhere except a 200-valued block in the middle.
fn synthetic_volume() -> Volume {
    let data = Array3::from_shape_fn((12, 12, 12), |(z, y, x)| {
        if (4..8).contains(&z) && (4..8).contains(&y) && (4..8).contains(&x) {
            200.0
        } else {
            0.0
        }
    });
    Volume::new(data, (1.0, 1.0, 1.0))
}

struct SyntheticDecoder {
    calls: Rc<Cell<usize>>,
}

impl VolumeDecoder for SyntheticDecoder {
    fn decode(&self, _path: &Path) -> Result<Volume, VolumeLoaderError> {
        self.calls.set(self.calls.get() + 1);
        Ok(synthetic_volume())
    }
}

fn reconstructor() -> (Reconstructor<SyntheticDecoder>, Rc<Cell<usize>>) {
    let calls = Rc::new(Cell::new(0));
    let decoder = SyntheticDecoder {
        calls: Rc::clone(&calls),
    };
    let config = ViewerConfig::new().with_render_size(24, 24);
    let reconstructor = Reconstructor::new(decoder, config, |config| {
        Ok(Box::new(CpuRaycaster::new(config.sample_distance)))
    });
    (reconstructor, calls)
}

#[test]
fn synthetic_series_normalizes_to_display_range() {
    let volume = synthetic_volume();
    let range = volume.scalar_range();
    assert_eq!((range.min, range.max), (0.0, 200.0));

    let normalized = normalize(&volume).unwrap();
    assert_eq!(normalized.data()[[0, 0, 0]], 0);
    assert_eq!(normalized.data()[[5, 5, 5]], 255);
    assert_eq!(OpacityTransferFunction::initial().value(255.0), 1.0);
}

#[test]
fn empty_path_never_reaches_the_decoder() {
    let (mut reconstructor, calls) = reconstructor();
    for path in ["", "   "] {
        let result = reconstructor.run(path, &mut ScriptedLoop::default());
        assert!(matches!(result, Err(ReconstructError::NoFolderSelected)));
    }
    assert_eq!(calls.get(), 0);
}

#[test]
fn prepared_session_has_initial_state_and_first_frame() {
    let (mut reconstructor, calls) = reconstructor();
    let session = reconstructor.prepare("/synthetic").unwrap();

    assert_eq!(calls.get(), 1);
    assert_eq!(session.opacity(), &OpacityTransferFunction::initial());
    assert_eq!(session.slider().value(), 0.0);
    assert_eq!(session.redraw_count(), 1);

    let frame = session.frame().unwrap();
    assert_eq!(frame.dimensions(), (24, 24));
    let centre = frame.get_pixel(12, 12).0;
    assert!(centre[0] > 0, "centre pixel {centre:?}");
}

#[test]
fn slider_events_drive_the_opacity_curve() {
    let (mut reconstructor, _) = reconstructor();
    let mut session = reconstructor.prepare("/synthetic").unwrap();

    let mut script = ScriptedLoop::new([
        ViewerEvent::SliderInteraction(0.1),
        ViewerEvent::SliderInteraction(0.3),
        ViewerEvent::SliderInteraction(0.3),
    ]);
    script.run(&mut session).unwrap();

    let points: Vec<_> = session
        .opacity()
        .points()
        .iter()
        .map(|p| (p.intensity, p.opacity))
        .collect();
    assert_eq!(
        points,
        vec![(0.0, 0.0), (100.0, 0.3), (200.0, 0.5), (255.0, 1.0)]
    );
    assert_eq!(session.opacity(), &apply_opacity(0.3));
    assert_eq!(session.redraw_count(), 4);
}

#[test]
fn whole_run_tears_down_after_close() {
    let (mut reconstructor, calls) = reconstructor();
    let mut script = ScriptedLoop::new([
        ViewerEvent::Orbit { dx: 30.0, dy: 15.0 },
        ViewerEvent::Close,
    ]);
    reconstructor.run("/synthetic", &mut script).unwrap();
    reconstructor.run("/synthetic", &mut ScriptedLoop::default()).unwrap();

    assert_eq!(calls.get(), 2);
}

#[test]
fn renderer_failures_are_reported() {
    let calls = Rc::new(Cell::new(0));
    let decoder = SyntheticDecoder {
        calls: Rc::clone(&calls),
    };
    let mut reconstructor = Reconstructor::new(decoder, ViewerConfig::new(), |_| {
        Err(RenderError::Gpu("no adapter".to_string()))
    });

    let result = reconstructor.prepare("/synthetic");
    assert!(matches!(result, Err(ReconstructError::Render(RenderError::Gpu(_)))));
}
