//! Boundary with the pitch-detection model.
//!
//! The model runs on a blocking thread and streams partial activation
//! matrices into an [`ActivationSink`]. A progress report of 1.0 marks the
//! end of the stream; the accumulator on the other side of the channel stops
//! reading there.

use super::{N_FREQ_BINS_CONTOURS, N_FREQ_BINS_NOTES};
use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::{mpsc, watch};

/// Model output, indexed `[time frame][pitch bin]`.
/// `frames` and `onsets` have 88 bins per row, `contours` 264.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Activations {
    pub frames: Vec<Vec<f32>>,
    pub onsets: Vec<Vec<f32>>,
    pub contours: Vec<Vec<f32>>,
}

impl Activations {
    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Checks that the three matrices are row-aligned, correctly sized and finite.
    pub fn check_shape(&self) -> Result<(), String> {
        let n = self.frames.len();
        if self.onsets.len() != n || self.contours.len() != n {
            return Err(format!(
                "row counts differ: frames {}, onsets {}, contours {}",
                n,
                self.onsets.len(),
                self.contours.len()
            ));
        }
        let matrices = [
            ("frames", &self.frames, N_FREQ_BINS_NOTES),
            ("onsets", &self.onsets, N_FREQ_BINS_NOTES),
            ("contours", &self.contours, N_FREQ_BINS_CONTOURS),
        ];
        for (name, matrix, width) in matrices {
            for (row_idx, row) in matrix.iter().enumerate() {
                if row.len() != width {
                    return Err(format!(
                        "{name} row {row_idx} has {} bins, expected {width}",
                        row.len()
                    ));
                }
                if row.iter().any(|v| !v.is_finite()) {
                    return Err(format!("{name} row {row_idx} contains non-finite values"));
                }
            }
        }
        Ok(())
    }

    /// Appends a chunk after checking it lines up with what came before.
    pub fn append(&mut self, chunk: Activations) -> Result<(), String> {
        chunk.check_shape()?;
        self.frames.extend(chunk.frames);
        self.onsets.extend(chunk.onsets);
        self.contours.extend(chunk.contours);
        Ok(())
    }

    /// Splits into consecutive chunks of at most `rows` frames.
    pub fn chunks(&self, rows: usize) -> Vec<Activations> {
        let rows = rows.max(1);
        let n_chunks = self.n_frames().div_ceil(rows);
        (0..n_chunks)
            .map(|i| {
                let start = i * rows;
                let end = (start + rows).min(self.n_frames());
                Activations {
                    frames: self.frames[start..end].to_vec(),
                    onsets: self.onsets[start..end].to_vec(),
                    contours: self.contours[start..end].to_vec(),
                }
            })
            .collect()
    }
}

/// Messages a running model sends to the accumulator.
#[derive(Debug)]
pub enum ModelEvent {
    Chunk(Activations),
    Progress(f32),
}

/// Cooperative cancellation signal for a running extraction.
#[derive(Clone, Debug)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

/// Trigger side of a [`Cancellation`].
#[derive(Debug)]
pub struct Canceller {
    tx: watch::Sender<bool>,
}

/// Creates a linked canceller / cancellation pair.
pub fn cancellation() -> (Canceller, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (Canceller { tx }, Cancellation { rx })
}

impl Canceller {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Cancellation {
    /// A cancellation that never fires.
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested; pends forever if the
    /// canceller was dropped without firing.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Producer handle given to a [`PitchModel`] for one evaluation.
pub struct ActivationSink {
    tx: mpsc::Sender<ModelEvent>,
    cancellation: Cancellation,
}

impl ActivationSink {
    pub(crate) fn new(tx: mpsc::Sender<ModelEvent>, cancellation: Cancellation) -> Self {
        Self { tx, cancellation }
    }

    /// Sends the next partial result. Blocks while the accumulator is behind.
    pub fn push(&self, chunk: Activations) -> anyhow::Result<()> {
        if self.is_cancelled() {
            bail!("extraction cancelled");
        }
        self.tx
            .blocking_send(ModelEvent::Chunk(chunk))
            .context("activation receiver dropped")
    }

    /// Reports progress in `[0, 1]`. Reaching 1.0 ends the stream.
    pub fn progress(&self, fraction: f32) -> anyhow::Result<()> {
        self.tx
            .blocking_send(ModelEvent::Progress(fraction))
            .context("activation receiver dropped")
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled() || self.tx.is_closed()
    }
}

/// A pitch-detection model. `evaluate` runs on a blocking worker thread and
/// must push its output in time order, then report progress 1.0.
pub trait PitchModel: Send + Sync + 'static {
    fn evaluate(&self, samples: &[f32], sink: &ActivationSink) -> anyhow::Result<()>;
}

/// Replays activations captured from an earlier model run.
#[derive(Debug, Clone)]
pub struct RecordedModel {
    activations: Activations,
    chunk_frames: usize,
}

impl RecordedModel {
    /// Frames per streamed chunk, one model window.
    pub const DEFAULT_CHUNK_FRAMES: usize = super::ANNOT_N_FRAMES;

    pub fn new(activations: Activations, chunk_frames: usize) -> Self {
        Self {
            activations,
            chunk_frames,
        }
    }

    /// Loads `{"frames": .., "onsets": .., "contours": ..}` from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading activations from {}", path.display()))?;
        let activations: Activations = serde_json::from_str(&text)
            .with_context(|| format!("parsing activations in {}", path.display()))?;
        Ok(Self::new(activations, Self::DEFAULT_CHUNK_FRAMES))
    }
}

impl PitchModel for RecordedModel {
    fn evaluate(&self, _samples: &[f32], sink: &ActivationSink) -> anyhow::Result<()> {
        let total = self.activations.n_frames();
        if total == 0 {
            return sink.progress(1.0);
        }
        let mut sent = 0;
        for chunk in self.activations.chunks(self.chunk_frames) {
            sent += chunk.n_frames();
            sink.push(chunk)?;
            sink.progress(sent as f32 / total as f32)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activations(n: usize) -> Activations {
        Activations {
            frames: (0..n).map(|i| vec![i as f32 / 100.0; N_FREQ_BINS_NOTES]).collect(),
            onsets: vec![vec![0.0; N_FREQ_BINS_NOTES]; n],
            contours: vec![vec![0.0; N_FREQ_BINS_CONTOURS]; n],
        }
    }

    #[test]
    fn chunks_preserve_order_and_cover_all_rows() {
        let acts = activations(10);
        let chunks = acts.chunks(4);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].n_frames(), 2);

        let mut rebuilt = Activations::default();
        for chunk in chunks {
            rebuilt.append(chunk).unwrap();
        }
        assert_eq!(rebuilt, acts);
    }

    #[test]
    fn misaligned_chunk_is_rejected() {
        let mut chunk = activations(3);
        chunk.contours.pop();
        assert!(Activations::default().append(chunk).is_err());
    }

    #[test]
    fn wrong_width_or_nan_is_rejected() {
        let mut chunk = activations(2);
        chunk.frames[1].push(0.0);
        assert!(chunk.check_shape().unwrap_err().contains("frames row 1"));

        let mut chunk = activations(2);
        chunk.onsets[0][5] = f32::NAN;
        assert!(chunk.check_shape().unwrap_err().contains("non-finite"));
    }

    #[tokio::test]
    async fn cancellation_fires_once_requested() {
        let (canceller, mut cancellation) = cancellation();
        assert!(!cancellation.is_cancelled());
        canceller.cancel();
        cancellation.cancelled().await;
        assert!(cancellation.is_cancelled());
    }

    #[test]
    fn never_is_not_cancelled() {
        assert!(!Cancellation::never().is_cancelled());
    }
}
