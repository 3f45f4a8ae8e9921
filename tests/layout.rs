use anyhow::Result;
use approx::assert_relative_eq;
use tune_staff::notation::{Accidental, Clef, LayoutConfig, NoteEvent, StemDirection, layout, layout_with};
use tune_staff::Error;

fn note(start: f32, pitch: u8) -> NoteEvent {
    NoteEvent::new(start, 0.25, pitch, 0.6, vec![])
}

/// A deterministic spread of notes across the whole keyboard and several pages.
fn scattered_notes() -> Vec<NoteEvent> {
    (0..200u32)
        .map(|i| {
            let start = ((i * 37) % 211) as f32 * 0.13;
            let pitch = ((i * 53) % 128) as u8;
            note(start, pitch)
        })
        .collect()
}

#[test]
fn every_note_lands_exactly_once() -> Result<()> {
    let notes = scattered_notes();
    let lines = layout(&notes, 5.0)?;
    let placed: usize = lines.iter().map(|line| line.len()).sum();
    assert_eq!(placed, notes.len());

    for line in &lines {
        assert!(line.treble.iter().all(|n| n.clef == Clef::Treble && n.note.pitch_midi() >= 60));
        assert!(line.bass.iter().all(|n| n.clef == Clef::Bass && n.note.pitch_midi() < 60));
    }
    Ok(())
}

#[test]
fn lines_are_ordered_and_respect_the_page_length() -> Result<()> {
    let lines = layout(&scattered_notes(), 5.0)?;
    assert!(lines.len() > 1);
    for pair in lines.windows(2) {
        assert!(pair[1].start_time - pair[0].start_time > 5.0);
    }
    for line in &lines {
        assert!(!line.is_empty());
        assert_relative_eq!(line.end_time, line.start_time + 5.0);
        for placed in line.notes() {
            let start = placed.note.start_time_seconds();
            assert!(start >= line.start_time && start <= line.end_time);
            assert!(placed.x_percent >= 15.0 - 1e-4 && placed.x_percent <= 100.0 + 1e-4);
        }
    }
    Ok(())
}

#[test]
fn x_position_follows_onset_within_a_staff() -> Result<()> {
    let lines = layout(&scattered_notes(), 5.0)?;
    for line in &lines {
        for staff in [&line.treble, &line.bass] {
            for pair in staff.windows(2) {
                assert!(pair[0].note.start_time_seconds() <= pair[1].note.start_time_seconds());
                assert!(pair[0].x_percent <= pair[1].x_percent);
            }
        }
        let merged = line.notes();
        assert_eq!(merged.len(), line.len());
        for pair in merged.windows(2) {
            assert!(pair[0].note.start_time_seconds() <= pair[1].note.start_time_seconds());
        }
    }
    Ok(())
}

#[test]
fn layout_is_deterministic() -> Result<()> {
    let notes = scattered_notes();
    let mut reversed = notes.clone();
    reversed.reverse();
    assert_eq!(layout(&notes, 5.0)?, layout(&notes, 5.0)?);

    let a = layout(&notes, 5.0)?;
    let b = layout(&reversed, 5.0)?;
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.start_time, y.start_time);
        assert_eq!(x.len(), y.len());
    }
    Ok(())
}

#[test]
fn ledger_lines_appear_only_off_the_staff() -> Result<()> {
    let notes: Vec<NoteEvent> = (0..=127u8).map(|p| note(0.0, p)).collect();
    let lines = layout(&notes, 5.0)?;
    assert_eq!(lines.len(), 1);
    for placed in lines[0].notes() {
        let off_staff = placed.staff_step.abs() >= 6;
        assert_eq!(!placed.ledger_lines.is_empty(), off_staff, "{}", placed.label);
        if off_staff {
            assert_eq!(placed.ledger_lines.len(), (placed.staff_step.unsigned_abs() as usize - 4) / 2);
            for y in &placed.ledger_lines {
                assert!(*y < 60.0 || *y > 100.0);
            }
        }
    }
    Ok(())
}

#[test]
fn familiar_notes_sit_where_a_musician_expects() -> Result<()> {
    // C4, F#4, A4 and the bass staff's G2
    let lines = layout(&[note(0.0, 60), note(1.0, 66), note(2.0, 69), note(3.0, 43)], 5.0)?;
    let line = &lines[0];

    let middle_c = &line.treble[0];
    assert_eq!(middle_c.label, "C4");
    assert_relative_eq!(middle_c.y, 110.0);
    assert_eq!(middle_c.ledger_lines, vec![110.0]);
    assert_eq!(middle_c.stem.direction, StemDirection::Up);
    assert_relative_eq!(middle_c.x_percent, 15.0);

    let f_sharp = &line.treble[1];
    assert_eq!(f_sharp.accidental, Some(Accidental::Sharp));
    assert_relative_eq!(f_sharp.y, 95.0);
    assert_relative_eq!(f_sharp.x_percent, 32.0);

    let a4 = &line.treble[2];
    assert_relative_eq!(a4.y, 85.0);
    assert!(a4.ledger_lines.is_empty());

    let g2 = &line.bass[0];
    assert_eq!(g2.label, "G2");
    assert_relative_eq!(g2.y, 100.0);
    assert_relative_eq!(g2.ledger_start_x_percent, g2.x_percent - 2.0);
    assert_relative_eq!(g2.ledger_end_x_percent, g2.x_percent + 2.0);
    Ok(())
}

#[test]
fn custom_page_length() -> Result<()> {
    let notes = [note(0.0, 72), note(2.5, 72), note(2.6, 72)];
    let lines = layout_with(&notes, &LayoutConfig::with_page_duration(2.5))?;
    assert_eq!(lines.len(), 2);
    assert_relative_eq!(lines[0].treble[1].x_percent, 100.0);
    assert_relative_eq!(lines[1].start_time, 2.6);
    Ok(())
}

#[test]
fn one_bad_note_fails_the_whole_layout() {
    let notes = [note(0.0, 60), NoteEvent::new(1.0, 0.0, 60, 0.5, vec![])];
    match layout(&notes, 5.0) {
        Err(Error::Validation(msg)) => assert!(msg.starts_with("note 1")),
        other => panic!("expected a validation error, got {other:?}"),
    }
    assert!(matches!(layout(&[note(0.0, 60)], 0.0), Err(Error::Validation(_))));
}

#[test]
fn notes_json_feeds_layout() -> Result<()> {
    let json = r#"[
        {"startTimeSeconds": 0.5, "durationSeconds": 0.4, "pitchMidi": 64, "amplitude": 0.9, "pitchBends": [0, 1]},
        {"startTimeSeconds": 0.0, "durationSeconds": 0.4, "pitchMidi": 48, "amplitude": 0.3, "pitchBends": null}
    ]"#;
    let notes: Vec<NoteEvent> = serde_json::from_str(json)?;
    let lines = layout(&notes, 5.0)?;
    let value = serde_json::to_value(&lines)?;
    assert_eq!(value[0]["trebleNotes"][0]["label"], "E4");
    assert_eq!(value[0]["bassNotes"][0]["note"]["noteName"], "C3");
    assert_eq!(value[0]["startTime"], 0.0);
    Ok(())
}
