use anyhow::Result;
use clap::Parser;

use crate::vision::{self, VisionCliArgs, VisionConfig};

/// Live video annotation and MJPEG streaming server.
#[derive(Debug, Parser)]
#[command(name = "videoserver", version, about)]
struct Cli {
    #[command(flatten)]
    vision: VisionCliArgs,
}

pub fn handle_commands() -> Result<()> {
    let cli = Cli::parse();
    let config = VisionConfig::try_from(cli.vision)?;
    vision::telemetry::init_tracing(config.verbose);
    vision::run(config)
}
