use crate::audio::{MonoAudio, extract_channel};
use crate::error::{Error, Result};
use rodio::{Decoder, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// Decodes an audio file and keeps its first channel.
/// Uses rodio::Decoder, which yields interleaved samples for multichannel audio.
pub fn load_mono<P: AsRef<Path>>(path: P) -> Result<MonoAudio> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| Error::Decode(format!("cannot open {}: {e}", path.display())))?;
    let source = Decoder::new(BufReader::new(file))
        .map_err(|e| Error::Decode(format!("cannot decode {}: {e}", path.display())))?;

    let sample_rate = source.sample_rate();
    let n_channels = source.channels() as usize;
    if n_channels == 0 {
        return Err(Error::Decode(format!(
            "decoder reported 0 channels for {}",
            path.display()
        )));
    }

    let samples: Vec<f32> = source.collect();
    debug!(
        sample_rate,
        n_channels,
        n_samples = samples.len() / n_channels,
        "Decoded audio file"
    );

    let first_channel = extract_channel(&samples, n_channels, 0).map_err(|e| match e {
        Error::Decode(reason) => Error::Decode(format!("{reason} in {}", path.display())),
        other => other,
    })?;
    let audio = MonoAudio::new(sample_rate, first_channel);
    audio.validate()?;
    Ok(audio)
}
