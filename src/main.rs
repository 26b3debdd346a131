use anyhow::Context;
use dicom_volume_viewer::{
    app::ViewerApp,
    config::ViewerConfig,
    cpu_raycaster::CpuRaycaster,
    enums::Processor,
    gpu_raycaster::{GpuRaycaster, WGPU},
    gui,
    pipeline::Reconstructor,
    renderer::Renderer,
    volume_loader::VolumeLoader,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ViewerConfig::from_env();
    let gpu = match config.processor {
        Processor::GPU => match WGPU::request().await {
            Ok(gpu) => Some(gpu),
            Err(e) => {
                log::warn!("GPU unavailable ({e}), rendering on the CPU");
                None
            }
        },
        Processor::CPU => None,
    };
    log::info!(
        "render back end: {}",
        if gpu.is_some() { "GPU" } else { "CPU" }
    );

    let decoder = VolumeLoader::new(config.sort_by);
    let reconstructor = Reconstructor::new(decoder, config, move |config| {
        let renderer: Box<dyn Renderer> = match &gpu {
            Some(gpu) => Box::new(GpuRaycaster::new(
                WGPU {
                    device: gpu.device.clone(),
                    queue: gpu.queue.clone(),
                },
                config.sample_distance,
            )),
            None => Box::new(CpuRaycaster::new(config.sample_distance)),
        };
        Ok(renderer)
    });

    gui::run_app(ViewerApp::new(reconstructor)).context("FLTK event loop failed")
}
