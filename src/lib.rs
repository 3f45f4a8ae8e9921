//! Turns pitch-model output into notes and lays those notes out on a
//! paginated treble/bass staff.
//!
//! Audio flows one way: decoded PCM goes through a [`PitchModel`], the
//! streamed activations become [`NoteEvent`]s, and [`notation::layout`]
//! turns the notes into [`StaffLine`]s for a renderer.

pub mod audio;
pub mod error;
pub mod notation;

pub use audio::MonoAudio;
pub use audio::transcribe::{ExtractionConfig, PitchModel, RecordedModel, extract_notes};
pub use error::{Error, Result};
pub use notation::{LayoutConfig, NoteEvent, StaffLine, layout, layout_with};
