use crate::audio::MonoAudio;
use crate::error::{Error, Result};
use crate::notation::NoteEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub mod bends;
pub mod frames;
pub mod model;
pub mod timing;

pub use model::{
    ActivationSink, Activations, Cancellation, Canceller, ModelEvent, PitchModel, RecordedModel,
    cancellation,
};

// Model input
pub const AUDIO_SAMPLE_RATE: u32 = 22050;
pub const FFT_HOP: usize = 256;
pub const AUDIO_WINDOW_LENGTH: usize = 2;
pub const AUDIO_N_SAMPLES: usize = AUDIO_SAMPLE_RATE as usize * AUDIO_WINDOW_LENGTH - FFT_HOP;

// Model output
pub const ANNOTATIONS_FPS: usize = AUDIO_SAMPLE_RATE as usize / FFT_HOP;
pub const ANNOT_N_FRAMES: usize = ANNOTATIONS_FPS * AUDIO_WINDOW_LENGTH;
pub const N_FREQ_BINS_NOTES: usize = 88;
pub const CONTOURS_BINS_PER_SEMITONE: usize = 3;
pub const N_FREQ_BINS_CONTOURS: usize = N_FREQ_BINS_NOTES * CONTOURS_BINS_PER_SEMITONE;
pub const MIDI_OFFSET: usize = 21;
pub const MAX_FREQ_IDX: usize = N_FREQ_BINS_NOTES - 1;

/// Bounded so a fast model cannot run far ahead of the accumulator.
const ACTIVATION_CHANNEL_CAPACITY: usize = 32;

/// Note tracking parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtractionConfig {
    /// Minimum onset activation for a note to start.
    pub onset_threshold: f32,
    /// Minimum frame activation for a note to keep sounding.
    pub frame_threshold: f32,
    /// Notes must be longer than this many frames.
    pub min_note_len: usize,
    pub infer_onsets: bool,
    pub max_freq: Option<f32>,
    pub min_freq: Option<f32>,
    /// Also turn leftover frame energy without an onset into notes.
    pub melodia_trick: bool,
    /// Frames a note may stay below the frame threshold before it ends.
    pub energy_tolerance: usize,
    /// Contour bins searched either side of a note when tracking bends.
    pub pitch_bend_tolerance: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            onset_threshold: 0.25,
            frame_threshold: 0.25,
            min_note_len: 5,
            infer_onsets: true,
            max_freq: None,
            min_freq: None,
            melodia_trick: true,
            energy_tolerance: 11,
            pitch_bend_tolerance: 25,
        }
    }
}

impl ExtractionConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("onset threshold", self.onset_threshold),
            ("frame threshold", self.frame_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Validation(format!(
                    "{name} must be within 0-1, got {value}"
                )));
            }
        }
        for (name, value) in [("min frequency", self.min_freq), ("max frequency", self.max_freq)] {
            match value {
                Some(freq) if !freq.is_finite() || freq <= 0.0 => {
                    return Err(Error::Validation(format!(
                        "{name} must be a positive frequency, got {freq}"
                    )));
                }
                _ => {}
            }
        }
        match (self.min_freq, self.max_freq) {
            (Some(min), Some(max)) if min >= max => Err(Error::Validation(format!(
                "min frequency {min} must be below max frequency {max}"
            ))),
            _ => Ok(()),
        }
    }
}

/// Runs `model` over `audio` and turns its output into notes sorted by onset.
///
/// The model's partial outputs are gathered in arrival order until it
/// reports progress 1.0. A model error, a panic or a stream that ends before
/// completion yields [`Error::Model`] and drops whatever arrived so far.
/// `cancel` firing before completion yields [`Error::Cancelled`].
pub async fn extract_notes<M>(
    model: Arc<M>,
    audio: &MonoAudio,
    config: &ExtractionConfig,
    mut cancel: Cancellation,
) -> Result<Vec<NoteEvent>>
where
    M: PitchModel + ?Sized,
{
    audio.validate()?;
    config.validate()?;
    if audio.sample_rate() != AUDIO_SAMPLE_RATE {
        warn!(
            sample_rate = audio.sample_rate(),
            expected = AUDIO_SAMPLE_RATE,
            "Audio sample rate differs from the model's; note timing assumes {} Hz",
            AUDIO_SAMPLE_RATE
        );
    }
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let activations = collect_activations(model, audio, &mut cancel).await?;
    info!(n_frames = activations.n_frames(), "Model evaluation complete");

    let config = config.clone();
    let notes = tokio::task::spawn_blocking(move || activations_to_notes(&activations, &config))
        .await
        .map_err(|e| Error::model("note conversion panicked", e))?;
    info!(n_notes = notes.len(), "Extracted notes");
    Ok(notes)
}

/// Drives one model evaluation and concatenates its streamed chunks.
async fn collect_activations<M>(
    model: Arc<M>,
    audio: &MonoAudio,
    cancel: &mut Cancellation,
) -> Result<Activations>
where
    M: PitchModel + ?Sized,
{
    let (tx, mut rx) = mpsc::channel::<ModelEvent>(ACTIVATION_CHANNEL_CAPACITY);
    let sink = ActivationSink::new(tx, cancel.clone());
    let samples = audio.shared_samples();
    let handle = tokio::task::spawn_blocking(move || model.evaluate(&samples, &sink));

    let mut activations = Activations::default();
    let mut n_chunks = 0usize;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(n_chunks, "Extraction cancelled");
                return Err(Error::Cancelled);
            }
            event = rx.recv() => match event {
                Some(ModelEvent::Chunk(chunk)) => {
                    let rows = chunk.n_frames();
                    activations
                        .append(chunk)
                        .map_err(|reason| Error::model("model produced misaligned activations", reason))?;
                    n_chunks += 1;
                    debug!(n_chunks, rows, total = activations.n_frames(), "Received activation chunk");
                }
                Some(ModelEvent::Progress(fraction)) => {
                    debug!(fraction, "Model progress");
                    if fraction >= 1.0 {
                        break;
                    }
                }
                None => {
                    // The sink was dropped without a completion signal.
                    return Err(match handle.await {
                        Ok(Ok(())) => Error::model(
                            "model stopped before signalling completion",
                            "activation stream closed early",
                        ),
                        Ok(Err(e)) => Error::model("model evaluation failed", e),
                        Err(e) => Error::model("model evaluation panicked", e),
                    });
                }
            }
        }
    }

    // Nothing more is read after completion.
    drop(rx);
    match handle.await {
        Ok(Ok(())) => Ok(activations),
        Ok(Err(e)) => Err(Error::model("model evaluation failed", e)),
        Err(e) => Err(Error::model("model evaluation panicked", e)),
    }
}

/// Converts complete activations to notes: note tracking, pitch bends,
/// then frame-to-seconds conversion.
pub fn activations_to_notes(activations: &Activations, config: &ExtractionConfig) -> Vec<NoteEvent> {
    let frame_notes = frames::output_to_notes_poly(&activations.frames, &activations.onsets, config);
    let bent = bends::add_pitch_bends_to_note_events(
        &activations.contours,
        &frame_notes,
        config.pitch_bend_tolerance,
    );
    let mut notes = timing::note_frames_to_time(&bent);
    notes.sort_by(|a, b| {
        a.start_time_seconds()
            .total_cmp(&b.start_time_seconds())
            .then(a.pitch_midi().cmp(&b.pitch_midi()))
    });
    notes
}
