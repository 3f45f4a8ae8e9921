pub mod layout;
pub mod pitch;
pub mod staff;

pub use layout::{LayoutConfig, PlacedNote, StaffLine, layout, layout_with};
pub use pitch::{PitchClass, note_name, parse_note_name};
pub use staff::{Accidental, Clef, StemDirection};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// One detected note. Serialized with the camelCase keys of the notes API.
///
/// `note_name` is derived from `pitch_midi` whenever a note is built or
/// deserialized, so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawNoteEvent")]
pub struct NoteEvent {
    start_time_seconds: f32,
    duration_seconds: f32,
    pitch_midi: u8,
    amplitude: f32,
    pitch_bends: Vec<f32>,
    note_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNoteEvent {
    start_time_seconds: f32,
    duration_seconds: f32,
    pitch_midi: u8,
    amplitude: f32,
    #[serde(default)]
    pitch_bends: Option<Vec<f32>>,
}

impl From<RawNoteEvent> for NoteEvent {
    fn from(raw: RawNoteEvent) -> Self {
        NoteEvent::new(
            raw.start_time_seconds,
            raw.duration_seconds,
            raw.pitch_midi,
            raw.amplitude,
            raw.pitch_bends.unwrap_or_default(),
        )
    }
}

impl NoteEvent {
    pub fn new(
        start_time_seconds: f32,
        duration_seconds: f32,
        pitch_midi: u8,
        amplitude: f32,
        pitch_bends: Vec<f32>,
    ) -> Self {
        Self {
            start_time_seconds,
            duration_seconds,
            pitch_midi,
            amplitude,
            pitch_bends,
            note_name: note_name(pitch_midi),
        }
    }

    pub fn start_time_seconds(&self) -> f32 {
        self.start_time_seconds
    }

    pub fn duration_seconds(&self) -> f32 {
        self.duration_seconds
    }

    pub fn end_time_seconds(&self) -> f32 {
        self.start_time_seconds + self.duration_seconds
    }

    pub fn pitch_midi(&self) -> u8 {
        self.pitch_midi
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    pub fn pitch_bends(&self) -> &[f32] {
        &self.pitch_bends
    }

    pub fn note_name(&self) -> &str {
        &self.note_name
    }

    pub fn frequency_hz(&self) -> f32 {
        pitch::midi_to_frequency(self.pitch_midi as f32)
    }

    /// Timestamps of each pitch bend, evenly subdividing the note's duration.
    pub fn pitch_bend_times(&self) -> Vec<f32> {
        let n = self.pitch_bends.len();
        (0..n)
            .map(|i| self.start_time_seconds + i as f32 * self.duration_seconds / n as f32)
            .collect()
    }

    /// Checks the note's fields against their domains. `index` is the note's
    /// position in the caller's input and ends up in the error message.
    pub fn validate(&self, index: usize) -> Result<()> {
        if !self.start_time_seconds.is_finite() || self.start_time_seconds < 0.0 {
            return Err(Error::invalid_note(
                index,
                format!("start time {} must be finite and >= 0", self.start_time_seconds),
            ));
        }
        if !self.duration_seconds.is_finite() || self.duration_seconds <= 0.0 {
            return Err(Error::invalid_note(
                index,
                format!("duration {} must be finite and > 0", self.duration_seconds),
            ));
        }
        if self.pitch_midi > pitch::MAX_MIDI {
            return Err(Error::invalid_note(
                index,
                format!("pitch {} is outside 0-127", self.pitch_midi),
            ));
        }
        if !(0.0..=1.0).contains(&self.amplitude) {
            return Err(Error::invalid_note(
                index,
                format!("amplitude {} is outside 0-1", self.amplitude),
            ));
        }
        Ok(())
    }
}
