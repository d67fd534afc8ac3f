use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use skirmish_input::{Key, KeyEvent};
use skirmish_render::{DebugTextRenderer, HostUploader, Renderer, ResourceUploader};
use skirmish_render_wgpu::WgpuUploader;
use skirmish_scene::{SceneConfig, SceneDirector, SceneKind};
use skirmish_tools::SceneInspector;
use tracing_subscriber::EnvFilter;

const FRAME_DT: f32 = 1.0 / 60.0;

#[derive(Parser)]
#[command(name = "skirmish-cli", about = "Headless driver for the skirmish scene layer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// JSON scene config; defaults apply to anything it leaves out
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the config seed
    #[arg(short, long, global = true)]
    seed: Option<u64>,

    /// Allocate resources on a headless wgpu device instead of host memory
    #[arg(long, global = true)]
    gpu: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and the effective scene config
    Info,
    /// Start at the title screen, enter the game and run frames
    Simulate {
        /// Number of game frames to run
        #[arg(short, long, default_value = "120")]
        frames: u64,
        /// Fire a bullet every N frames (0 never fires)
        #[arg(long, default_value = "0")]
        fire_every: u64,
        /// Dump the last frame with the debug text renderer
        #[arg(long)]
        render: bool,
    },
    /// Build the game scene and pick at a screen position
    Pick {
        x: f32,
        y: f32,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<SceneConfig> {
    let mut config = match &cli.config {
        Some(path) => SceneConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => SceneConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    config.validate()?;
    Ok(config)
}

fn uploader(gpu: bool) -> anyhow::Result<Box<dyn ResourceUploader>> {
    if gpu {
        let uploader = WgpuUploader::headless().context("creating headless wgpu device")?;
        Ok(Box::new(uploader))
    } else {
        Ok(Box::new(HostUploader::new()))
    }
}

/// Tick one frame and pretend the GPU finished it immediately.
fn step(director: &mut SceneDirector, uploader: &mut dyn ResourceUploader) -> anyhow::Result<String> {
    let frame = director.frame_tick(FRAME_DT, uploader)?;
    director.fence_signaled(frame.frame, uploader);
    Ok(DebugTextRenderer::new().render(&frame))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Info => {
            println!("skirmish-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("{}", config.to_json_pretty()?);
        }
        Commands::Simulate {
            frames,
            fire_every,
            render,
        } => {
            let mut uploader = uploader(cli.gpu)?;
            let uploader = uploader.as_mut();
            let mut director = SceneDirector::new(config, SceneKind::Title, uploader)?;
            director.process_keyboard(KeyEvent::press(Key::Enter), uploader)?;
            director.process_keyboard(KeyEvent::release(Key::Enter), uploader)?;
            // The title frame during which the game finishes loading.
            step(&mut director, uploader)?;

            let mut last = String::new();
            for n in 1..=frames {
                if fire_every > 0 && n % fire_every == 0 {
                    if let Some(game) = director.current_mut().as_game_mut() {
                        game.fire();
                    }
                }
                last = step(&mut director, uploader)?;
            }
            tracing::info!(frames = director.frame(), "simulation finished");

            println!("{}", SceneInspector::director_summary(&director));
            if render {
                print!("{last}");
            }
            director.shutdown(uploader)?;
        }
        Commands::Pick { x, y } => {
            let mut uploader = uploader(cli.gpu)?;
            let uploader = uploader.as_mut();
            let mut director = SceneDirector::new(config, SceneKind::Game, uploader)?;
            step(&mut director, uploader)?;

            let game = director
                .current_mut()
                .as_game_mut()
                .context("game scene is not running")?;
            match game.pick_at(x, y) {
                Some(id) => {
                    if let Some(info) = SceneInspector::inspect_entity(game.registry(), id) {
                        println!("Picked {info}");
                    }
                }
                None => println!("Nothing under ({x}, {y})"),
            }
            director.shutdown(uploader)?;
        }
    }

    Ok(())
}
