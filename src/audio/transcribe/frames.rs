use super::{ExtractionConfig, MAX_FREQ_IDX, MIDI_OFFSET};
use crate::notation::pitch::frequency_to_midi;

/// A note in model-frame units, before timing conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteEventFrame {
    pub start_frame: usize,
    pub duration_frames: usize,
    pub pitch_midi: u8,
    pub amplitude: f32,
    /// Contour-bin offsets, one per frame; empty until pitch bends are added.
    pub pitch_bends: Vec<f32>,
}

impl NoteEventFrame {
    pub fn end_frame(&self) -> usize {
        self.start_frame + self.duration_frames
    }
}

/// Decodes frame and onset activations into polyphonic note events.
///
/// Onset peaks are walked from the latest to the earliest. Each one becomes
/// a note that lasts until the frame activation stays below the frame
/// threshold for `energy_tolerance` frames; the energy it used (plus the
/// neighbouring bins) is removed so later candidates cannot reuse it. With
/// the melodia trick enabled, leftover energy peaks are then turned into
/// notes as well, extending both ways from the peak.
pub fn output_to_notes_poly(
    frames: &[Vec<f32>],
    onsets: &[Vec<f32>],
    config: &ExtractionConfig,
) -> Vec<NoteEventFrame> {
    let n_frames = frames.len();
    if n_frames == 0 {
        return Vec::new();
    }

    let mut frames = frames.to_vec();
    let mut onsets = onsets.to_vec();
    constrain_frequency(&mut onsets, &mut frames, config.max_freq, config.min_freq);

    let onsets = if config.infer_onsets {
        inferred_onsets(&onsets, &frames, 2)
    } else {
        onsets
    };

    let note_starts: Vec<(usize, usize)> = relative_maxima(&onsets)
        .into_iter()
        .filter(|&(row, col)| onsets[row][col] >= config.onset_threshold)
        .collect();

    let frame_threshold = config.frame_threshold;
    let energy_tolerance = config.energy_tolerance;
    let min_note_len = config.min_note_len;
    let mut remaining_energy = frames.clone();
    let mut notes = Vec::new();

    for &(note_start, freq_idx) in note_starts.iter().rev() {
        // too close to the end of the audio
        if note_start >= n_frames - 1 {
            continue;
        }

        let mut i = note_start + 1;
        let mut k = 0;
        while i < n_frames - 1 && k < energy_tolerance {
            if remaining_energy[i][freq_idx] < frame_threshold {
                k += 1;
            } else {
                k = 0;
            }
            i += 1;
        }
        i -= k;

        if i - note_start <= min_note_len {
            continue;
        }

        for row in &mut remaining_energy[note_start..i] {
            clear_bins(row, freq_idx);
        }

        notes.push(NoteEventFrame {
            start_frame: note_start,
            duration_frames: i - note_start,
            pitch_midi: (freq_idx + MIDI_OFFSET) as u8,
            amplitude: column_mean(&frames[note_start..i], freq_idx),
            pitch_bends: Vec::new(),
        });
    }

    if config.melodia_trick {
        while let Some((i_mid, freq_idx)) = arg_max(&remaining_energy) {
            if remaining_energy[i_mid][freq_idx] <= frame_threshold {
                break;
            }
            remaining_energy[i_mid][freq_idx] = 0.0;

            // forward pass
            let mut i = i_mid + 1;
            let mut k = 0;
            while i < n_frames - 1 && k < energy_tolerance {
                if remaining_energy[i][freq_idx] < frame_threshold {
                    k += 1;
                } else {
                    k = 0;
                }
                clear_bins(&mut remaining_energy[i], freq_idx);
                i += 1;
            }
            let i_end = i as isize - 1 - k as isize;

            // backward pass
            let mut i = i_mid as isize - 1;
            let mut k = 0;
            while i > 0 && k < energy_tolerance {
                let row = &mut remaining_energy[i as usize];
                if row[freq_idx] < frame_threshold {
                    k += 1;
                } else {
                    k = 0;
                }
                clear_bins(row, freq_idx);
                i -= 1;
            }
            let i_start = i + 1 + k as isize;

            if i_end - i_start <= min_note_len as isize {
                continue;
            }
            let (i_start, i_end) = (i_start as usize, i_end as usize);

            notes.push(NoteEventFrame {
                start_frame: i_start,
                duration_frames: i_end - i_start,
                pitch_midi: (freq_idx + MIDI_OFFSET) as u8,
                amplitude: column_mean(&frames[i_start..i_end], freq_idx),
                pitch_bends: Vec::new(),
            });
        }
    }

    notes
}

/// Zeroes a bin and its immediate neighbours.
fn clear_bins(row: &mut [f32], freq_idx: usize) {
    row[freq_idx] = 0.0;
    if freq_idx < MAX_FREQ_IDX {
        row[freq_idx + 1] = 0.0;
    }
    if freq_idx > 0 {
        row[freq_idx - 1] = 0.0;
    }
}

fn column_mean(rows: &[Vec<f32>], col: usize) -> f32 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().map(|row| row[col]).sum::<f32>() / rows.len() as f32
}

/// Row-major position of the first largest value.
fn arg_max(matrix: &[Vec<f32>]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize, f32)> = None;
    for (r, row) in matrix.iter().enumerate() {
        for (c, &v) in row.iter().enumerate() {
            if best.is_none_or(|(_, _, b)| v > b) {
                best = Some((r, c, v));
            }
        }
    }
    best.map(|(r, c, _)| (r, c))
}

/// Zeroes bins outside `[min_freq, max_freq)` in both matrices.
fn constrain_frequency(
    onsets: &mut [Vec<f32>],
    frames: &mut [Vec<f32>],
    max_freq: Option<f32>,
    min_freq: Option<f32>,
) {
    let to_bin = |freq: f32| (frequency_to_midi(freq) - MIDI_OFFSET as f32).round().max(0.0) as usize;

    if let Some(max_freq) = max_freq {
        let max_idx = to_bin(max_freq);
        for row in onsets.iter_mut().chain(frames.iter_mut()) {
            let from = max_idx.min(row.len());
            row[from..].fill(0.0);
        }
    }
    if let Some(min_freq) = min_freq {
        let min_idx = to_bin(min_freq);
        for row in onsets.iter_mut().chain(frames.iter_mut()) {
            let to = min_idx.min(row.len());
            row[..to].fill(0.0);
        }
    }
}

/// Adds onsets where frame activations jump sharply.
///
/// The frame difference over the last `n_diff` frames (smallest of the
/// 1..=n_diff lags, negatives clipped) is rescaled to the onset maximum and
/// merged into the onsets with an element-wise max.
pub(crate) fn inferred_onsets(onsets: &[Vec<f32>], frames: &[Vec<f32>], n_diff: usize) -> Vec<Vec<f32>> {
    let mut frame_diff: Vec<Vec<f32>> = frames
        .iter()
        .enumerate()
        .map(|(r, row)| {
            row.iter()
                .enumerate()
                .map(|(c, &value)| {
                    if r < n_diff {
                        return 0.0;
                    }
                    (1..=n_diff)
                        .map(|lag| value - frames[r - lag][c])
                        .fold(f32::INFINITY, f32::min)
                        .max(0.0)
                })
                .collect()
        })
        .collect();

    let onset_max = global_max(onsets);
    let diff_max = global_max(&frame_diff);
    if diff_max > 0.0 {
        for v in frame_diff.iter_mut().flatten() {
            *v = onset_max * *v / diff_max;
        }
    }

    onsets
        .iter()
        .zip(&frame_diff)
        .map(|(o_row, d_row)| o_row.iter().zip(d_row).map(|(&o, &d)| o.max(d)).collect())
        .collect()
}

fn global_max(matrix: &[Vec<f32>]) -> f32 {
    matrix
        .iter()
        .flatten()
        .copied()
        .fold(f32::NEG_INFINITY, f32::max)
}

/// Positions strictly greater than both time neighbours, in row-major order.
/// The first and last frames never qualify.
fn relative_maxima(matrix: &[Vec<f32>]) -> Vec<(usize, usize)> {
    let mut peaks = Vec::new();
    for r in 1..matrix.len().saturating_sub(1) {
        for c in 0..matrix[r].len() {
            let v = matrix[r][c];
            if v > matrix[r - 1][c] && v > matrix[r + 1][c] {
                peaks.push((r, c));
            }
        }
    }
    peaks
}
