use std::path::PathBuf;

use anyhow::{anyhow, Context};
use base64::Engine as _;
use clap::{Args, Parser, Subcommand};

use display_capture::platform::{DisplayBackend, MemoryDisplay, PageId, PageMode};
use display_capture::rendering::Rotation;
use display_capture::{CaptureConfig, CaptureService};

/// Capture screenshots from a simulated single-owner display
#[derive(Parser)]
#[command(name = "display-capture", version)]
struct Cli {
    /// JSON capture configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Capture one screenshot through the owner handoff
    Capture {
        #[command(flatten)]
        display: DisplayArgs,
        /// Page to capture (defaults to the active page)
        #[arg(long)]
        page: Option<usize>,
        /// Write the BMP here
        #[arg(long, short)]
        out: Option<PathBuf>,
        /// Print the BMP as base64 instead of writing a file
        #[arg(long = "base64")]
        print_base64: bool,
    },
    /// Print display metadata as JSON
    Info {
        #[command(flatten)]
        display: DisplayArgs,
    },
    /// Serve /screenshot and /screenshot/info over HTTP
    #[cfg(feature = "http")]
    Serve {
        #[command(flatten)]
        display: DisplayArgs,
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: String,
    },
}

#[derive(Args, Clone)]
struct DisplayArgs {
    /// Displayed width in pixels
    #[arg(long, default_value_t = 320)]
    width: u32,
    /// Displayed height in pixels
    #[arg(long, default_value_t = 240)]
    height: u32,
    /// Panel rotation in degrees (0, 90, 180, 270)
    #[arg(long, default_value_t = 0)]
    rotation: u32,
    /// Number of native pages (0 = single screen)
    #[arg(long, default_value_t = 3)]
    pages: usize,
}

impl DisplayArgs {
    fn build(&self, config: CaptureConfig) -> anyhow::Result<CaptureService<MemoryDisplay>> {
        let rotation = Rotation::from_degrees(self.rotation)
            .ok_or_else(|| anyhow!("unsupported rotation {}", self.rotation))?;
        let mut display = MemoryDisplay::with_displayed_size(self.width, self.height, rotation);
        let mode = if self.pages == 0 {
            PageMode::Single
        } else {
            display = display.with_active_page(Some(0));
            PageMode::NativePages((0..self.pages).collect::<Vec<PageId>>())
        };
        let mut service = CaptureService::new(display, mode, config)?;
        service.backend_mut().render();
        Ok(service)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CaptureConfig::from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => CaptureConfig::default(),
    };

    match cli.command {
        Command::Capture {
            display,
            page,
            out,
            print_base64,
        } => {
            let service = display.build(config)?;
            let coordinator = service.coordinator();
            let owner = service.spawn()?;
            let image = coordinator.request_capture(page);
            owner.shutdown()?;
            let image = image.context("capture failed")?;

            if print_base64 {
                println!(
                    "{}",
                    base64::engine::general_purpose::STANDARD.encode(image.as_bytes())
                );
                return Ok(());
            }
            let out = out.unwrap_or_else(|| PathBuf::from("screenshot.bmp"));
            std::fs::write(&out, image.as_bytes())
                .with_context(|| format!("writing {}", out.display()))?;
            println!(
                "Wrote {}x{} BMP ({} bytes) to {}",
                image.width(),
                image.height(),
                image.len(),
                out.display()
            );
        }
        Command::Info { display } => {
            let service = display.build(config)?;
            println!("{}", serde_json::to_string_pretty(service.coordinator().info())?);
        }
        #[cfg(feature = "http")]
        Command::Serve { display, addr } => {
            let service = display.build(config)?;
            let coordinator = service.coordinator();
            let _owner = service.spawn()?;
            let server = display_capture::http::HttpServer::bind(&addr)?;
            log::info!("Display capture registered at http://{}/screenshot", addr);
            server.run(&coordinator);
        }
    }
    Ok(())
}
