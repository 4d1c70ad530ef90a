//! Scientific pitch notation for MIDI note numbers
//!
//! `60 → "C4"`, `61 → "C#4"`, `21 → "A0"`, `0 → "C-1"`. Sharps are always preferred
//! when naming; parsing accepts sharps or flats (`"Db4"` and `"C#4"` are both 61).

/// Pitch class names indexed by semitone above C
const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Name a MIDI note number in scientific pitch notation
///
/// # Examples
/// ```
/// use etude::pitch::note_name;
///
/// assert_eq!(note_name(60), "C4");
/// assert_eq!(note_name(69), "A4");
/// assert_eq!(note_name(70), "A#4");
/// assert_eq!(note_name(0), "C-1");
/// ```
pub fn note_name(note: u8) -> String {
    let octave = (note / 12) as i8 - 1;
    format!("{}{}", PITCH_CLASS_NAMES[(note % 12) as usize], octave)
}

/// Parse a scientific pitch name back into a MIDI note number
///
/// Returns `None` for malformed names or pitches outside 0..=127.
///
/// # Examples
/// ```
/// use etude::pitch::midi_from_name;
///
/// assert_eq!(midi_from_name("C4"), Some(60));
/// assert_eq!(midi_from_name("Db4"), Some(61));
/// assert_eq!(midi_from_name("c#-1"), Some(1));
/// assert_eq!(midi_from_name("H2"), None);
/// ```
pub fn midi_from_name(name: &str) -> Option<u8> {
    let mut chars = name.trim().chars().peekable();

    let base: i32 = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let accidental = match chars.peek() {
        Some('#') => {
            chars.next();
            1
        }
        Some('b') => {
            chars.next();
            -1
        }
        _ => 0,
    };

    let octave: i32 = chars.collect::<String>().parse().ok()?;
    let midi = (octave + 1) * 12 + base + accidental;
    u8::try_from(midi).ok().filter(|m| *m <= 127)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_pitches() {
        assert_eq!(note_name(21), "A0"); // lowest piano key
        assert_eq!(note_name(108), "C8"); // highest piano key
        assert_eq!(note_name(127), "G9");
        assert_eq!(note_name(59), "B3");
    }

    #[test]
    fn test_round_trip_all_notes() {
        for note in 0..=127u8 {
            let name = note_name(note);
            assert_eq!(midi_from_name(&name), Some(note), "round trip failed for {}", name);
            assert_eq!(note_name(midi_from_name(&name).unwrap()), name);
        }
    }

    #[test]
    fn test_flats_and_out_of_range() {
        assert_eq!(midi_from_name("Bb3"), Some(58));
        assert_eq!(midi_from_name("Cb4"), Some(59));
        assert_eq!(midi_from_name("Cb-1"), None); // below 0
        assert_eq!(midi_from_name("G#9"), None); // above 127
        assert_eq!(midi_from_name(""), None);
        assert_eq!(midi_from_name("C"), None);
    }
}
