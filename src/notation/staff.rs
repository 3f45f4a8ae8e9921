//! Staff geometry: clef choice, diatonic staff positions, ledger lines.
//!
//! Positions are counted in staff steps: one step is the distance between a
//! line and the adjacent space (half a line spacing). Step 0 is the middle
//! line, positive steps go up. The five staff lines sit on steps -4, -2, 0,
//! 2 and 4.
//!
//! Sharps are written on the natural below them with an accidental mark, so
//! C4 and C#4 share a position.

use super::pitch::{MIDDLE_C, PitchClass};
use serde::{Deserialize, Serialize};

/// Step of the outermost staff line on either side of the middle line.
pub const STAFF_EDGE_STEP: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Clef {
    Treble,
    Bass,
}

impl Clef {
    /// Middle C and above go on the treble staff, everything lower on the bass staff.
    pub fn for_pitch(midi: u8) -> Self {
        if midi >= MIDDLE_C {
            Clef::Treble
        } else {
            Clef::Bass
        }
    }

    /// Pitch on the middle line: B4 for treble, D3 for bass.
    pub fn middle_line_midi(self) -> u8 {
        match self {
            Clef::Treble => 71,
            Clef::Bass => 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accidental {
    Sharp,
}

impl Accidental {
    pub fn for_pitch(midi: u8) -> Option<Self> {
        PitchClass::from_midi(midi).is_sharp().then_some(Accidental::Sharp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemDirection {
    Up,
    Down,
}

impl StemDirection {
    /// Notes below the middle line take an up stem.
    pub fn for_step(step: i32) -> Self {
        if step < 0 {
            StemDirection::Up
        } else {
            StemDirection::Down
        }
    }
}

/// Number of natural letters from C-1 up to the letter `midi` is written on.
pub fn diatonic_index(midi: u8) -> i32 {
    (midi / 12) as i32 * 7 + PitchClass::from_midi(midi).letter() as i32
}

/// Staff step of `midi` on `clef`'s staff.
pub fn staff_step(midi: u8, clef: Clef) -> i32 {
    diatonic_index(midi) - diatonic_index(clef.middle_line_midi())
}

/// Pixel metrics of one drawn staff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaffMetrics {
    pub staff_height: f32,
    pub line_spacing: f32,
}

impl StaffMetrics {
    pub fn middle_line_y(&self) -> f32 {
        self.staff_height / 2.0
    }

    pub fn top_line_y(&self) -> f32 {
        self.step_to_y(STAFF_EDGE_STEP)
    }

    pub fn bottom_line_y(&self) -> f32 {
        self.step_to_y(-STAFF_EDGE_STEP)
    }

    /// Y grows downwards, as in SVG.
    pub fn step_to_y(&self, step: i32) -> f32 {
        self.middle_line_y() - step as f32 * self.line_spacing / 2.0
    }

    /// Y coordinates of the five staff lines, top to bottom.
    pub fn staff_line_ys(&self) -> [f32; 5] {
        [4, 2, 0, -2, -4].map(|step| self.step_to_y(step))
    }

    /// Ledger lines for a note on `step`, ordered outward from the staff.
    ///
    /// One line per line-spacing between the staff edge and the note,
    /// including the note's own position when it sits on a line.
    pub fn ledger_lines(&self, step: i32) -> Vec<f32> {
        let beyond = step.abs() - STAFF_EDGE_STEP;
        if beyond < 2 {
            return Vec::new();
        }
        let sign = step.signum();
        (1..=beyond / 2)
            .map(|n| self.step_to_y(sign * (STAFF_EDGE_STEP + 2 * n)))
            .collect()
    }
}
