pub mod file;
pub mod transcribe;

use crate::error::{Error, Result};
use std::sync::Arc;

/// Mono PCM samples handed to the pitch model.
/// Samples live behind an `Arc` so the blocking model thread can share them.
#[derive(Clone, Debug)]
pub struct MonoAudio {
    sample_rate: u32,
    samples: Arc<[f32]>,
}

impl MonoAudio {
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            samples: samples.into(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub(crate) fn shared_samples(&self) -> Arc<[f32]> {
        Arc::clone(&self.samples)
    }

    /// Rejects buffers the model cannot sensibly run on.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::Decode("sample rate must be > 0".to_string()));
        }
        if self.samples.is_empty() {
            return Err(Error::Decode("audio contains no samples".to_string()));
        }
        if let Some(index) = self.samples.iter().position(|s| !s.is_finite()) {
            return Err(Error::Decode(format!(
                "sample {index} is not a finite number"
            )));
        }
        Ok(())
    }
}

/// Keeps one channel of an interleaved buffer.
pub fn extract_channel(interleaved: &[f32], n_channels: usize, channel: usize) -> Result<Vec<f32>> {
    if channel >= n_channels {
        return Err(Error::Decode(format!(
            "channel {channel} does not exist in {n_channels}-channel audio"
        )));
    }
    if interleaved.len() % n_channels != 0 {
        return Err(Error::Decode(format!(
            "sample count {} is not divisible by channel count {n_channels}",
            interleaved.len()
        )));
    }
    Ok(interleaved
        .chunks_exact(n_channels)
        .map(|frame| frame[channel])
        .collect())
}
