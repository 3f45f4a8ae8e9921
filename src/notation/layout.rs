use super::NoteEvent;
use super::staff::{Accidental, Clef, StaffMetrics, StemDirection, staff_step};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_PAGE_DURATION_SECONDS: f32 = 5.0;

/// Page and staff geometry used by [`layout_with`].
///
/// Horizontal values are percentages of the page width; vertical values are
/// pixels inside one staff of `staff_height`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    pub page_duration_seconds: f32,
    pub staff_height: f32,
    pub line_spacing: f32,
    /// Room left of the first note for the clef glyph and time label.
    pub left_margin_percent: f32,
    pub drawable_width_percent: f32,
    pub ledger_half_width_percent: f32,
    pub stem_length: f32,
    pub label_offset: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_duration_seconds: DEFAULT_PAGE_DURATION_SECONDS,
            staff_height: 160.0,
            line_spacing: 10.0,
            left_margin_percent: 15.0,
            drawable_width_percent: 85.0,
            ledger_half_width_percent: 2.0,
            stem_length: 30.0,
            label_offset: 10.0,
        }
    }
}

impl LayoutConfig {
    pub fn with_page_duration(page_duration_seconds: f32) -> Self {
        Self {
            page_duration_seconds,
            ..Self::default()
        }
    }

    pub fn metrics(&self) -> StaffMetrics {
        StaffMetrics {
            staff_height: self.staff_height,
            line_spacing: self.line_spacing,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("page duration", self.page_duration_seconds),
            ("staff height", self.staff_height),
            ("line spacing", self.line_spacing),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::Validation(format!(
                    "{name} must be finite and > 0, got {value}"
                )));
            }
        }
        let non_negative = [
            ("left margin", self.left_margin_percent),
            ("drawable width", self.drawable_width_percent),
            ("ledger half width", self.ledger_half_width_percent),
            ("stem length", self.stem_length),
            ("label offset", self.label_offset),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Validation(format!(
                    "{name} must be finite and >= 0, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Horizontal position of `time` on a page starting at `page_start`.
    pub fn time_to_x_percent(&self, page_start: f32, time: f32) -> f32 {
        let relative = (time - page_start) / self.page_duration_seconds;
        self.left_margin_percent + relative * self.drawable_width_percent
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stem {
    pub direction: StemDirection,
    pub y_start: f32,
    pub y_end: f32,
}

/// A note with everything a renderer needs to draw it on its staff.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedNote {
    pub note: NoteEvent,
    pub clef: Clef,
    /// Diatonic steps above the staff's middle line.
    pub staff_step: i32,
    pub x_percent: f32,
    pub y: f32,
    pub accidental: Option<Accidental>,
    /// Y of each ledger line, ordered outward from the staff.
    pub ledger_lines: Vec<f32>,
    pub ledger_start_x_percent: f32,
    pub ledger_end_x_percent: f32,
    pub stem: Stem,
    pub label: String,
    pub label_y: f32,
}

impl PlacedNote {
    fn place(note: &NoteEvent, page_start: f32, config: &LayoutConfig) -> Self {
        let metrics = config.metrics();
        let clef = Clef::for_pitch(note.pitch_midi());
        let step = staff_step(note.pitch_midi(), clef);
        let y = metrics.step_to_y(step);
        let x_percent = config.time_to_x_percent(page_start, note.start_time_seconds());
        let direction = StemDirection::for_step(step);
        let y_end = match direction {
            StemDirection::Up => y - config.stem_length,
            StemDirection::Down => y + config.stem_length,
        };

        Self {
            note: note.clone(),
            clef,
            staff_step: step,
            x_percent,
            y,
            accidental: Accidental::for_pitch(note.pitch_midi()),
            ledger_lines: metrics.ledger_lines(step),
            ledger_start_x_percent: x_percent - config.ledger_half_width_percent,
            ledger_end_x_percent: x_percent + config.ledger_half_width_percent,
            stem: Stem {
                direction,
                y_start: y,
                y_end,
            },
            label: note.note_name().to_string(),
            label_y: y - config.label_offset,
        }
    }
}

/// One page of the grand staff.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffLine {
    pub start_time: f32,
    pub end_time: f32,
    #[serde(rename = "trebleNotes")]
    pub treble: Vec<PlacedNote>,
    #[serde(rename = "bassNotes")]
    pub bass: Vec<PlacedNote>,
}

impl StaffLine {
    fn build(page_start: f32, notes: &[&NoteEvent], config: &LayoutConfig) -> Self {
        let (treble, bass): (Vec<PlacedNote>, Vec<PlacedNote>) = notes
            .iter()
            .map(|note| PlacedNote::place(note, page_start, config))
            .partition(|placed| placed.clef == Clef::Treble);
        debug!(
            start_time = page_start,
            treble = treble.len(),
            bass = bass.len(),
            "Laid out staff line"
        );
        Self {
            start_time: page_start,
            end_time: page_start + config.page_duration_seconds,
            treble,
            bass,
        }
    }

    pub fn len(&self) -> usize {
        self.treble.len() + self.bass.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Both staves merged back into onset order.
    pub fn notes(&self) -> Vec<&PlacedNote> {
        let mut merged = Vec::with_capacity(self.len());
        let (mut t, mut b) = (self.treble.iter().peekable(), self.bass.iter().peekable());
        loop {
            let next = match (t.peek(), b.peek()) {
                (Some(tn), Some(bn)) => {
                    if bn.note.start_time_seconds() < tn.note.start_time_seconds() {
                        b.next()
                    } else {
                        t.next()
                    }
                }
                (Some(_), None) => t.next(),
                (None, Some(_)) => b.next(),
                (None, None) => break,
            };
            merged.extend(next);
        }
        merged
    }

    /// Label drawn next to the clef, e.g. "12.5s".
    pub fn time_label(&self) -> String {
        format!("{:.1}s", self.start_time)
    }
}

/// Lays `notes` out on pages of `page_duration_seconds` with default geometry.
pub fn layout(notes: &[NoteEvent], page_duration_seconds: f32) -> Result<Vec<StaffLine>> {
    layout_with(notes, &LayoutConfig::with_page_duration(page_duration_seconds))
}

/// Sorts `notes` by onset and splits them into staff lines.
///
/// A new line starts at the first note whose onset lies more than one page
/// duration after the current line's start. Each note lands on exactly one
/// line and one staff, even when it sounds past the end of its line.
/// Any out-of-domain note fails the whole call.
pub fn layout_with(notes: &[NoteEvent], config: &LayoutConfig) -> Result<Vec<StaffLine>> {
    config.validate()?;
    for (index, note) in notes.iter().enumerate() {
        note.validate(index)?;
    }

    let mut sorted: Vec<&NoteEvent> = notes.iter().collect();
    sorted.sort_by(|a, b| a.start_time_seconds().total_cmp(&b.start_time_seconds()));

    let mut lines = Vec::new();
    let Some(first) = sorted.first() else {
        return Ok(lines);
    };
    let mut page_start = first.start_time_seconds();
    let mut current: Vec<&NoteEvent> = Vec::new();

    for note in sorted {
        if note.start_time_seconds() - page_start > config.page_duration_seconds {
            lines.push(StaffLine::build(page_start, &current, config));
            current.clear();
            page_start = note.start_time_seconds();
        }
        current.push(note);
    }
    lines.push(StaffLine::build(page_start, &current, config));

    Ok(lines)
}
