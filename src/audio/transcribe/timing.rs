use super::frames::NoteEventFrame;
use super::{ANNOT_N_FRAMES, AUDIO_N_SAMPLES, AUDIO_SAMPLE_RATE, FFT_HOP};
use crate::notation::NoteEvent;

/// Seconds lost at each model window boundary. The trailing 0.0018 s is an
/// empirical alignment correction.
const WINDOW_OFFSET: f32 = (FFT_HOP as f32 / AUDIO_SAMPLE_RATE as f32)
    * (ANNOT_N_FRAMES as f32 - AUDIO_N_SAMPLES as f32 / FFT_HOP as f32)
    + 0.0018;

/// Start time in seconds of a model output frame.
pub fn model_frame_to_time(frame: usize) -> f32 {
    frame as f32 * FFT_HOP as f32 / AUDIO_SAMPLE_RATE as f32
        - WINDOW_OFFSET * (frame / ANNOT_N_FRAMES) as f32
}

/// Converts frame-indexed notes into second-denominated [`NoteEvent`]s.
pub fn note_frames_to_time(notes: &[NoteEventFrame]) -> Vec<NoteEvent> {
    notes
        .iter()
        .map(|note| {
            let start = model_frame_to_time(note.start_frame);
            let end = model_frame_to_time(note.end_frame());
            NoteEvent::new(
                start,
                end - start,
                note.pitch_midi,
                note.amplitude.clamp(0.0, 1.0),
                note.pitch_bends.clone(),
            )
        })
        .collect()
}
