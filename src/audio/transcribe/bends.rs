use super::frames::NoteEventFrame;
use super::{CONTOURS_BINS_PER_SEMITONE, MIDI_OFFSET, N_FREQ_BINS_CONTOURS};
use rayon::prelude::*;

/// Standard deviation, in contour bins, of the weighting window.
const BEND_GAUSSIAN_STD: f32 = 5.0;

/// Symmetric Gaussian window of `len` points.
fn gaussian(len: usize, std: f32) -> Vec<f32> {
    let center = (len as f32 - 1.0) / 2.0;
    (0..len)
        .map(|n| {
            let x = (n as f32 - center) / std;
            (-0.5 * x * x).exp()
        })
        .collect()
}

/// Contour bin at the centre of `pitch_midi`.
pub fn midi_pitch_to_contour_bin(pitch_midi: u8) -> usize {
    (pitch_midi as usize).saturating_sub(MIDI_OFFSET) * CONTOURS_BINS_PER_SEMITONE
}

/// Attaches one pitch bend per frame to each note.
///
/// For every frame of a note, the contour row is weighted by a Gaussian
/// centred on the note's bin (within `n_bins_tolerance` bins either side) and
/// the bend is the offset of the strongest bin from that centre. Bends are in
/// contour bins, i.e. thirds of a semitone.
pub fn add_pitch_bends_to_note_events(
    contours: &[Vec<f32>],
    notes: &[NoteEventFrame],
    n_bins_tolerance: usize,
) -> Vec<NoteEventFrame> {
    let window_length = n_bins_tolerance * 2 + 1;
    let freq_gaussian = gaussian(window_length, BEND_GAUSSIAN_STD);

    notes
        .par_iter()
        .map(|note| {
            let freq_idx = midi_pitch_to_contour_bin(note.pitch_midi);
            let freq_start = freq_idx.saturating_sub(n_bins_tolerance);
            let freq_end = (freq_idx + n_bins_tolerance + 1).min(N_FREQ_BINS_CONTOURS);

            let window_start = n_bins_tolerance.saturating_sub(freq_idx);
            let window_end = window_length
                - (freq_idx + n_bins_tolerance + 1).saturating_sub(N_FREQ_BINS_CONTOURS);
            let weights = &freq_gaussian[window_start..window_end];
            let shift = (n_bins_tolerance - window_start) as isize;

            let end = note.end_frame().min(contours.len());
            let start = note.start_frame.min(end);
            let pitch_bends = contours[start..end]
                .iter()
                .map(|row| {
                    let best = row[freq_start..freq_end]
                        .iter()
                        .zip(weights)
                        .map(|(v, w)| v * w)
                        .enumerate()
                        .fold((0, f32::NEG_INFINITY), |best, (i, v)| {
                            if v > best.1 { (i, v) } else { best }
                        })
                        .0;
                    (best as isize - shift) as f32
                })
                .collect();

            NoteEventFrame {
                pitch_bends,
                ..note.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn note(pitch_midi: u8, start_frame: usize, duration_frames: usize) -> NoteEventFrame {
        NoteEventFrame {
            start_frame,
            duration_frames,
            pitch_midi,
            amplitude: 0.5,
            pitch_bends: Vec::new(),
        }
    }

    fn contours_with_peaks(peaks: &[usize]) -> Vec<Vec<f32>> {
        peaks
            .iter()
            .map(|&bin| {
                let mut row = vec![0.0; N_FREQ_BINS_CONTOURS];
                row[bin] = 1.0;
                row
            })
            .collect()
    }

    #[test]
    fn gaussian_is_symmetric_and_peaks_at_one() {
        let g = gaussian(51, 5.0);
        assert_relative_eq!(g[25], 1.0);
        assert_relative_eq!(g[20], g[30]);
        assert!(g[0] < 0.01);
    }

    #[test]
    fn contour_bins_are_thirds_of_a_semitone() {
        assert_eq!(midi_pitch_to_contour_bin(21), 0);
        assert_eq!(midi_pitch_to_contour_bin(60), 117);
        assert_eq!(midi_pitch_to_contour_bin(108), 261);
    }

    #[test]
    fn bends_follow_the_contour_peak() {
        let centre = midi_pitch_to_contour_bin(60);
        let contours = contours_with_peaks(&[centre, centre + 1, centre - 2, centre]);
        let notes = add_pitch_bends_to_note_events(&contours, &[note(60, 0, 4)], 25);
        assert_eq!(notes[0].pitch_bends, vec![0.0, 1.0, -2.0, 0.0]);
    }

    #[test]
    fn one_bend_per_frame_and_order_is_kept() {
        let contours = contours_with_peaks(&[117; 20]);
        let notes = add_pitch_bends_to_note_events(
            &contours,
            &[note(60, 2, 6), note(62, 10, 8)],
            25,
        );
        assert_eq!(notes[0].pitch_bends.len(), 6);
        assert_eq!(notes[1].pitch_bends.len(), 8);
        assert_eq!(notes[1].pitch_midi, 62);
    }

    #[test]
    fn windows_clip_at_the_edges_of_the_range() {
        // Lowest note: window starts at bin 0.
        let contours = contours_with_peaks(&[0, 3]);
        let notes = add_pitch_bends_to_note_events(&contours, &[note(21, 0, 2)], 25);
        assert_eq!(notes[0].pitch_bends, vec![0.0, 3.0]);

        // Highest note: window ends at the last bin.
        let top = N_FREQ_BINS_CONTOURS - 1;
        let contours = contours_with_peaks(&[top - 2, top]);
        let notes = add_pitch_bends_to_note_events(&contours, &[note(108, 0, 2)], 25);
        assert_eq!(notes[0].pitch_bends, vec![0.0, 2.0]);
    }
}
