use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tune_staff::audio::{file, transcribe};
use tune_staff::notation::{self, LayoutConfig, NoteEvent};
use tune_staff::{ExtractionConfig, RecordedModel};

#[derive(Parser, Debug)]
#[command(version, about = "Extract notes from audio and lay them out on a staff")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode an audio file and turn recorded model activations into notes (JSON on stdout)
    Transcribe {
        audio: PathBuf,
        /// JSON file with `frames`, `onsets` and `contours` matrices
        #[arg(long)]
        activations: PathBuf,
        #[arg(long, default_value_t = 0.25)]
        onset_threshold: f32,
        #[arg(long, default_value_t = 0.25)]
        frame_threshold: f32,
        #[arg(long, default_value_t = 5)]
        min_note_len: usize,
        #[arg(long)]
        min_freq: Option<f32>,
        #[arg(long)]
        max_freq: Option<f32>,
    },
    /// Lay out a JSON array of notes on staff lines (JSON on stdout)
    Layout {
        notes: PathBuf,
        #[arg(long, default_value_t = notation::layout::DEFAULT_PAGE_DURATION_SECONDS)]
        page_seconds: f32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Transcribe {
            audio,
            activations,
            onset_threshold,
            frame_threshold,
            min_note_len,
            min_freq,
            max_freq,
        } => {
            let samples = file::load_mono(&audio)
                .with_context(|| format!("loading {}", audio.display()))?;
            info!(
                sample_rate = samples.sample_rate(),
                seconds = samples.duration_seconds(),
                "Loaded audio"
            );
            let model = Arc::new(RecordedModel::from_json_file(&activations)?);
            let config = ExtractionConfig {
                onset_threshold,
                frame_threshold,
                min_note_len,
                min_freq,
                max_freq,
                ..ExtractionConfig::default()
            };

            let (canceller, cancellation) = transcribe::cancellation();
            let extraction = transcribe::extract_notes(model, &samples, &config, cancellation);
            tokio::pin!(extraction);
            let notes = tokio::select! {
                notes = &mut extraction => notes?,
                _ = tokio::signal::ctrl_c() => {
                    canceller.cancel();
                    extraction.await?
                }
            };
            println!("{}", serde_json::to_string_pretty(&notes)?);
        }
        Command::Layout {
            notes,
            page_seconds,
        } => {
            let text = std::fs::read_to_string(&notes)
                .with_context(|| format!("reading {}", notes.display()))?;
            let notes: Vec<NoteEvent> = serde_json::from_str(&text)
                .with_context(|| format!("parsing notes in {}", notes.display()))?;
            let lines = notation::layout_with(&notes, &LayoutConfig::with_page_duration(page_seconds))?;
            info!(n_notes = notes.len(), n_lines = lines.len(), "Laid out notes");
            println!("{}", serde_json::to_string_pretty(&lines)?);
        }
    }
    Ok(())
}
