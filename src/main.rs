//! storytoon - turn a short story into a four-panel comic

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use storytoon::style::Style;
use storytoon::{
    AspectRatio, CharacterRef, Config, GeminiClient, PanelEvent, Storyboard, StoryboardError,
    MAX_CHARACTERS, PANEL_COUNT,
};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Turn a short story into a four-panel comic
#[derive(Parser, Debug)]
#[command(name = "storytoon", version, about)]
struct Cli {
    /// Config file (defaults to ./storytoon.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split a story into four scene descriptions and print them as JSON
    Split {
        #[command(flatten)]
        input: StoryInput,
    },

    /// Split a story and draw all four panels
    Generate {
        #[command(flatten)]
        input: StoryInput,

        #[command(flatten)]
        render: RenderOptions,
    },

    /// Draw a single panel from a scene description
    Panel {
        /// Scene description
        #[arg(short, long)]
        scene: String,

        /// Panel number (1-4), used for the output file name
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=4))]
        number: u8,

        #[command(flatten)]
        render: RenderOptions,
    },
}

#[derive(Args, Debug)]
struct StoryInput {
    /// Story text
    #[arg(short, long, conflicts_with = "story_file")]
    story: Option<String>,

    /// Read the story from a file
    #[arg(long)]
    story_file: Option<PathBuf>,
}

impl StoryInput {
    async fn read(&self) -> Result<String> {
        let story = match (&self.story, &self.story_file) {
            (Some(story), _) => story.clone(),
            (None, Some(path)) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?,
            (None, None) => bail!("Provide the story with --story or --story-file"),
        };
        Ok(story)
    }
}

#[derive(Args, Debug)]
struct RenderOptions {
    /// Character reference image, PNG or JPEG (repeat for a second one)
    #[arg(long = "character")]
    characters: Vec<PathBuf>,

    /// Canvas preset for the character composite
    #[arg(short, long, value_enum)]
    aspect: Option<AspectRatio>,

    /// Illustration style
    #[arg(long, value_enum)]
    style: Option<Style>,

    /// Directory for panel images
    #[arg(short, long)]
    out: Option<PathBuf>,
}

impl RenderOptions {
    /// Command-line flags override the config file
    fn apply(&self, config: &mut Config) {
        if let Some(aspect) = self.aspect {
            config.aspect_ratio = aspect;
        }
        if let Some(style) = self.style {
            config.style = style;
        }
        if let Some(out) = &self.out {
            config.output_dir = out.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Split { input } => {
            let story = input.read().await?;
            if story.trim().is_empty() {
                bail!(StoryboardError::EmptyStory);
            }

            let client = GeminiClient::new(&config)?;
            let scenes = client.split_story(&story).await?;
            println!("{}", serde_json::to_string_pretty(&scenes)?);
        }

        Command::Generate { input, render } => {
            render.apply(&mut config);
            let story = input.read().await?;
            let client = GeminiClient::new(&config)?;
            let characters = load_characters(&render.characters).await?;

            let (tx, rx) = mpsc::channel(32);
            let progress = tokio::spawn(report_progress(rx));

            let mut board = Storyboard::new(config.aspect_ratio).with_events(tx);
            for index in 0..PANEL_COUNT {
                for character in &characters {
                    board.add_character(index, character.clone())?;
                }
            }

            let result = board.generate_story(&client, &story).await;
            // Panels finished before a failure are still worth keeping
            let written = board.export_images(&config.output_dir).await?;
            drop(board);
            progress.await?;

            report_written(&written, &config.output_dir);
            result?;
        }

        Command::Panel {
            scene,
            number,
            render,
        } => {
            let index = usize::from(number - 1);

            render.apply(&mut config);
            let client = GeminiClient::new(&config)?;
            let characters = load_characters(&render.characters).await?;

            let (tx, rx) = mpsc::channel(32);
            let progress = tokio::spawn(report_progress(rx));

            let mut board = Storyboard::new(config.aspect_ratio).with_events(tx);
            board.set_narrative(index, scene)?;
            for character in characters {
                board.add_character(index, character)?;
            }

            let result = board.regenerate_panel(&client, index).await;
            let written = board.export_images(&config.output_dir).await?;
            drop(board);
            progress.await?;

            report_written(&written, &config.output_dir);
            result?;
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "storytoon=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Load character files, ignoring any beyond the per-panel limit
async fn load_characters(paths: &[PathBuf]) -> Result<Vec<CharacterRef>> {
    if paths.len() > MAX_CHARACTERS {
        for path in &paths[MAX_CHARACTERS..] {
            warn!(
                "Ignoring {}: a panel holds at most {} characters",
                path.display(),
                MAX_CHARACTERS
            );
        }
    }

    let mut characters = Vec::new();
    for path in paths.iter().take(MAX_CHARACTERS) {
        characters.push(CharacterRef::load(path).await?);
    }
    if characters.is_empty() {
        warn!("No --character given; panels need at least one character reference");
    }
    Ok(characters)
}

async fn report_progress(mut rx: mpsc::Receiver<PanelEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            PanelEvent::SceneAssigned { panel, scene } => {
                println!("Panel {}: {}", panel + 1, scene);
            }
            PanelEvent::Started { panel } => {
                eprintln!("Drawing panel {}...", panel + 1);
            }
            PanelEvent::Finished { panel } => {
                eprintln!("Panel {} done", panel + 1);
            }
            PanelEvent::Failed {
                panel: Some(panel), ..
            } => {
                eprintln!("Panel {} failed", panel + 1);
            }
            // Reported by main when the error propagates
            PanelEvent::Failed { panel: None, .. } => {}
        }
    }
}

fn report_written(written: &[PathBuf], dir: &Path) {
    if written.is_empty() {
        info!("No panels written to {}", dir.display());
    }
    for path in written {
        println!("{}", path.display());
    }
}
