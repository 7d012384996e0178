//! Configuration parsing for the video server.
//!
//! CLI flags (and the token environment variable) are collected by
//! `VisionCliArgs` and validated into a `VisionConfig` that the rest of the
//! pipeline consumes without re-parsing.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::Args;
use image::Rgb;

pub(crate) const TOKEN_ENV: &str = "VIDEOSERVER_TOKEN";
pub(crate) const DEFAULT_TOKEN: &str = "token";
/// Largest accepted capture width or height.
pub(crate) const MAX_DIMENSION: i32 = 8192;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Where frames come from.
pub enum SourceKind {
    /// Camera index, device path, or stream URL opened through OpenCV.
    Device,
    /// Built-in synthetic test pattern.
    Pattern,
}

impl SourceKind {
    pub(crate) fn from_uri(uri: &str) -> Self {
        if uri == "pattern" {
            SourceKind::Pattern
        } else {
            SourceKind::Device
        }
    }
}

#[derive(Clone, Debug)]
/// Settings shared by the capture loop and the HTTP server.
pub struct VisionConfig {
    pub source_uri: String,
    pub source_kind: SourceKind,
    pub width: i32,
    pub height: i32,
    pub host: String,
    pub port: u16,
    /// Shared secret required by the control endpoints.
    pub token: String,
    /// Percentage each stream frame dimension shrinks before encoding.
    pub reduce_percent: u8,
    pub jpeg_quality: u8,
    /// Pause between stream parts; zero yields without waiting.
    pub stream_interval: Duration,
    pub target_color: Rgb<u8>,
    pub color_tolerance: u8,
    pub min_blob_pixels: usize,
    pub show_marker: bool,
    pub verbose: bool,
}

/// CLI arguments accepted by the `videoserver` binary.
#[derive(Debug, Args)]
pub struct VisionCliArgs {
    /// Camera index, device path, stream URL, or `pattern`.
    #[arg(long = "source", value_name = "URI", default_value = "0")]
    pub source: String,
    /// Capture width in pixels.
    #[arg(long = "width", value_name = "PX", default_value_t = 1280)]
    pub width: i32,
    /// Capture height in pixels.
    #[arg(long = "height", value_name = "PX", default_value_t = 720)]
    pub height: i32,
    /// Address the HTTP server binds to.
    #[arg(long = "host", default_value = "0.0.0.0")]
    pub host: String,
    /// Port the HTTP server listens on.
    #[arg(long = "port", default_value_t = 8000)]
    pub port: u16,
    /// Token required by the control endpoints.
    #[arg(long = "token", env = TOKEN_ENV, default_value = DEFAULT_TOKEN, hide_env_values = true)]
    pub token: String,
    /// Shrink stream frames by this percentage (0-99).
    #[arg(long = "reduce-percent", value_name = "PCT", default_value_t = 30)]
    pub reduce_percent: u8,
    /// JPEG quality used by the stream encoder (1-100).
    #[arg(long = "jpeg-quality", value_name = "QUALITY", default_value_t = 85)]
    pub jpeg_quality: u8,
    /// Milliseconds between stream parts; 0 re-sends as fast as the client reads.
    #[arg(long = "stream-interval-ms", value_name = "MS", default_value_t = 33)]
    pub stream_interval_ms: u64,
    /// Colour tracked by the detector, as `r,g,b`.
    #[arg(long = "target-color", value_name = "R,G,B", default_value = "255,0,0")]
    pub target_color: String,
    /// Per-channel tolerance around the target colour.
    #[arg(long = "color-tolerance", default_value_t = 60)]
    pub color_tolerance: u8,
    /// Minimum matching pixels before a detection counts.
    #[arg(long = "min-blob-pixels", default_value_t = 50)]
    pub min_blob_pixels: usize,
    /// Do not draw the crosshair at the detected position.
    #[arg(long = "no-marker", action = clap::ArgAction::SetTrue)]
    pub no_marker: bool,
    /// Enable debug logging.
    #[arg(long = "verbose", action = clap::ArgAction::SetTrue)]
    pub verbose: bool,
}

impl TryFrom<VisionCliArgs> for VisionConfig {
    type Error = anyhow::Error;

    fn try_from(args: VisionCliArgs) -> Result<Self> {
        if args.width <= 0 || args.height <= 0 {
            bail!("Capture width and height must be positive integers");
        }
        if args.width > MAX_DIMENSION || args.height > MAX_DIMENSION {
            bail!("Capture width and height must not exceed {MAX_DIMENSION}");
        }
        if args.reduce_percent > 99 {
            bail!("--reduce-percent must be between 0 and 99");
        }
        if !(1..=100).contains(&args.jpeg_quality) {
            bail!("--jpeg-quality must be an integer between 1 and 100");
        }
        if args.min_blob_pixels == 0 {
            bail!("--min-blob-pixels must be at least 1");
        }
        if args.token.is_empty() {
            bail!("--token must not be empty");
        }
        let target_color = parse_color(&args.target_color)
            .with_context(|| format!("invalid --target-color {:?}", args.target_color))?;

        Ok(Self {
            source_kind: SourceKind::from_uri(&args.source),
            source_uri: args.source,
            width: args.width,
            height: args.height,
            host: args.host,
            port: args.port,
            token: args.token,
            reduce_percent: args.reduce_percent,
            jpeg_quality: args.jpeg_quality,
            stream_interval: Duration::from_millis(args.stream_interval_ms),
            target_color,
            color_tolerance: args.color_tolerance,
            min_blob_pixels: args.min_blob_pixels,
            show_marker: !args.no_marker,
            verbose: args.verbose,
        })
    }
}

fn parse_color(value: &str) -> Result<Rgb<u8>> {
    let channels = value
        .split(',')
        .map(|part| part.trim().parse::<u8>())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    match channels.as_slice() {
        [r, g, b] => Ok(Rgb([*r, *g, *b])),
        _ => Err(anyhow!("expected three comma-separated channels")),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: VisionCliArgs,
    }

    fn parse(flags: &[&str]) -> Result<VisionConfig> {
        let argv = std::iter::once("videoserver").chain(flags.iter().copied());
        let cli = TestCli::try_parse_from(argv)?;
        VisionConfig::try_from(cli.args)
    }

    #[test]
    fn defaults_match_reference_setup() {
        let config = parse(&["--token", "token"]).unwrap();
        assert_eq!(config.source_uri, "0");
        assert_eq!(config.source_kind, SourceKind::Device);
        assert_eq!((config.width, config.height), (1280, 720));
        assert_eq!(config.port, 8000);
        assert_eq!(config.reduce_percent, 30);
        assert_eq!(config.stream_interval, Duration::from_millis(33));
        assert_eq!(config.target_color, Rgb([255, 0, 0]));
        assert!(config.show_marker);
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--source",
            "pattern",
            "--token",
            "abc",
            "--target-color",
            "0, 255 ,0",
            "--no-marker",
            "--stream-interval-ms",
            "0",
        ])
        .unwrap();
        assert_eq!(config.source_kind, SourceKind::Pattern);
        assert_eq!(config.token, "abc");
        assert_eq!(config.target_color, Rgb([0, 255, 0]));
        assert!(!config.show_marker);
        assert!(config.stream_interval.is_zero());
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(parse(&["--token", "t", "--reduce-percent", "100"]).is_err());
        assert!(parse(&["--token", "t", "--jpeg-quality", "0"]).is_err());
        assert!(parse(&["--token", "t", "--width", "0"]).is_err());
        assert!(parse(&["--token", "t", "--width", "8193"]).is_err());
        assert!(parse(&["--token", "t", "--height", "2000000000"]).is_err());
        let largest = parse(&["--token", "t", "--width", "8192", "--height", "8192"]);
        assert!(largest.is_ok());
        assert!(parse(&["--token", "t", "--target-color", "1,2"]).is_err());
        assert!(parse(&["--token", "t", "--target-color", "1,2,300"]).is_err());
        assert!(parse(&["--token", ""]).is_err());
    }
}
