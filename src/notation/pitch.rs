use std::fmt;
use std::str::FromStr;

/// Highest valid MIDI note number.
pub const MAX_MIDI: u8 = 127;
/// MIDI number of middle C (C4).
pub const MIDDLE_C: u8 = 60;

/// The twelve pitch classes, spelled with sharps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PitchClass {
    C,
    Cs,
    D,
    Ds,
    E,
    F,
    Fs,
    G,
    Gs,
    A,
    As,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::Cs,
        PitchClass::D,
        PitchClass::Ds,
        PitchClass::E,
        PitchClass::F,
        PitchClass::Fs,
        PitchClass::G,
        PitchClass::Gs,
        PitchClass::A,
        PitchClass::As,
        PitchClass::B,
    ];

    pub fn from_midi(midi: u8) -> Self {
        Self::ALL[(midi % 12) as usize]
    }

    /// Semitones above C.
    pub fn semitone(self) -> u8 {
        self as u8
    }

    /// Index of the natural letter this class is written on (C = 0 .. B = 6).
    /// Sharps sit on the letter below them.
    pub fn letter(self) -> u8 {
        match self {
            PitchClass::C | PitchClass::Cs => 0,
            PitchClass::D | PitchClass::Ds => 1,
            PitchClass::E => 2,
            PitchClass::F | PitchClass::Fs => 3,
            PitchClass::G | PitchClass::Gs => 4,
            PitchClass::A | PitchClass::As => 5,
            PitchClass::B => 6,
        }
    }

    pub fn is_sharp(self) -> bool {
        matches!(
            self,
            PitchClass::Cs | PitchClass::Ds | PitchClass::Fs | PitchClass::Gs | PitchClass::As
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::Cs => "C#",
            PitchClass::D => "D",
            PitchClass::Ds => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::Fs => "F#",
            PitchClass::G => "G",
            PitchClass::Gs => "G#",
            PitchClass::A => "A",
            PitchClass::As => "A#",
            PitchClass::B => "B",
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PitchClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "c" | "b#" => Ok(PitchClass::C),
            "c#" | "db" => Ok(PitchClass::Cs),
            "d" => Ok(PitchClass::D),
            "d#" | "eb" => Ok(PitchClass::Ds),
            "e" | "fb" => Ok(PitchClass::E),
            "f" | "e#" => Ok(PitchClass::F),
            "f#" | "gb" => Ok(PitchClass::Fs),
            "g" => Ok(PitchClass::G),
            "g#" | "ab" => Ok(PitchClass::Gs),
            "a" => Ok(PitchClass::A),
            "a#" | "bb" => Ok(PitchClass::As),
            "b" | "cb" => Ok(PitchClass::B),
            _ => Err(format!("Invalid pitch class: {}", s)),
        }
    }
}

/// Octave number in scientific pitch notation (MIDI 60 is in octave 4).
pub fn octave_of(midi: u8) -> i8 {
    (midi / 12) as i8 - 1
}

/// Display name for a MIDI note, e.g. 60 -> "C4", 61 -> "C#4", 0 -> "C-1".
pub fn note_name(midi: u8) -> String {
    format!("{}{}", PitchClass::from_midi(midi), octave_of(midi))
}

/// Parses a name produced by [`note_name`] back to its MIDI number.
/// Flat spellings ("Bb3") are accepted as well.
pub fn parse_note_name(name: &str) -> Result<u8, String> {
    let split = name
        .char_indices()
        .find(|(i, c)| *i > 0 && (c.is_ascii_digit() || *c == '-'))
        .map(|(i, _)| i)
        .ok_or_else(|| format!("Missing octave in note name: {}", name))?;
    let (class, octave) = name.split_at(split);
    let class: PitchClass = class.parse()?;
    let octave: i16 = octave
        .parse()
        .map_err(|_| format!("Invalid octave in note name: {}", name))?;

    // Cb and B# cross the octave boundary.
    let lower = class_spelling_shift(&name[..split]);
    let midi = (octave + 1) * 12 + class.semitone() as i16 + lower;
    if !(0..=MAX_MIDI as i16).contains(&midi) {
        return Err(format!("MIDI note out of range for note name: {}", name));
    }
    Ok(midi as u8)
}

fn class_spelling_shift(class: &str) -> i16 {
    match class.to_lowercase().as_str() {
        "cb" => -12,
        "b#" => 12,
        _ => 0,
    }
}

pub fn midi_to_frequency(midi: f32) -> f32 {
    440.0 * 2f32.powf((midi - 69.0) / 12.0)
}

pub fn frequency_to_midi(freq: f32) -> f32 {
    69.0 + 12.0 * (freq / 440.0).log2()
}
