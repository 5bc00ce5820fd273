use anyhow::Result;

use spincube_engine::device::GpuInit;
use spincube_engine::logging::{LoggingConfig, init_logging};
use spincube_engine::render::LoopConfig;
use spincube_engine::shader::ShaderSource;
use spincube_engine::window::{Runtime, RuntimeConfig};

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    log::info!("spincube viewer starting; press Escape to quit");

    Runtime::run(
        RuntimeConfig::default(),
        GpuInit::default(),
        LoopConfig::default(),
        ShaderSource::reference(),
    )
}
