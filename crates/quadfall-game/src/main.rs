mod app;
mod board;
mod piece;

use anyhow::Result;
use winit::dpi::LogicalSize;

use quadfall_engine::device::GpuInit;
use quadfall_engine::logging::{self, LoggingConfig};
use quadfall_engine::window::{Runtime, RuntimeConfig};

use crate::app::Game;

fn main() -> Result<()> {
    logging::init_logging(LoggingConfig::default());

    let config = RuntimeConfig {
        title: "Quadfall".to_string(),
        initial_size: LogicalSize::new(640.0, 640.0),
        resizable: false,
    };

    // The palette is authored in raw bytes; a non-sRGB surface passes it
    // through unconverted.
    let gpu_init = GpuInit {
        prefer_srgb: false,
        ..GpuInit::default()
    };

    Runtime::run(config, gpu_init, Game::new())
}
