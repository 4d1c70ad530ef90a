//! Measure slicing
//!
//! Buckets hand-labelled notes into one left and one right [`MeasureBucket`] per measure.
//! Every measure index in `0..total_measures` gets both buckets, even when silent, and
//! each bucket's contents are ordered by offset with pitch as the tie-break so that the
//! same input always slices the same way.

use crate::error::EtudeError;
use crate::song::{Hand, MeasureBucket, ResolvedNote};

use super::hands::group_chords;

/// Both hands of one measure
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureSlice {
    pub index: usize,
    pub left: MeasureBucket,
    pub right: MeasureBucket,
}

pub fn slice_measures(
    notes: &[ResolvedNote],
    total_measures: usize,
    chord_tolerance_seconds: f64,
) -> Result<Vec<MeasureSlice>, EtudeError> {
    let mut per_measure: Vec<(Vec<ResolvedNote>, Vec<ResolvedNote>)> =
        vec![(Vec::new(), Vec::new()); total_measures];

    for (i, note) in notes.iter().enumerate() {
        let Some((left, right)) = per_measure.get_mut(note.measure) else {
            return Err(EtudeError::NoteOutOfRange {
                measure: note.measure,
                total: total_measures,
            });
        };
        match note.hand {
            Hand::Left => left.push(note.clone()),
            Hand::Right => right.push(note.clone()),
            Hand::Unknown => {
                return Err(EtudeError::InvalidInput {
                    index: i,
                    message: format!("{} was sliced before being assigned a hand", note.name),
                })
            }
        }
    }

    Ok(per_measure
        .into_iter()
        .enumerate()
        .map(|(index, (left, right))| MeasureSlice {
            index,
            left: bucket(index, Hand::Left, left, chord_tolerance_seconds),
            right: bucket(index, Hand::Right, right, chord_tolerance_seconds),
        })
        .collect())
}

fn bucket(
    measure: usize,
    hand: Hand,
    mut notes: Vec<ResolvedNote>,
    chord_tolerance_seconds: f64,
) -> MeasureBucket {
    notes.sort_by(|a, b| a.offset_ticks.cmp(&b.offset_ticks).then(a.note.cmp(&b.note)));
    MeasureBucket {
        measure,
        hand,
        chords: group_chords(&notes, chord_tolerance_seconds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(pitch: u8, measure: usize, offset_ticks: u64, hand: Hand) -> ResolvedNote {
        let offset_beats = offset_ticks as f64 / 480.0;
        ResolvedNote {
            note: pitch,
            name: ResolvedNote::pitch_label(pitch),
            velocity: 70,
            channel: 0,
            time: measure as f64 * 2.0 + offset_beats * 0.5,
            duration: 0.5,
            measure,
            offset_ticks,
            offset_beats,
            duration_beats: 1.0,
            hand,
        }
    }

    #[test]
    fn test_silent_measures_get_empty_buckets() {
        let notes = vec![note(60, 0, 0, Hand::Right), note(48, 3, 0, Hand::Left)];
        let slices = slice_measures(&notes, 4, 0.03).unwrap();

        assert_eq!(slices.len(), 4);
        assert_eq!(
            slices.iter().map(|s| s.index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
        assert!(slices[0].left.is_empty());
        assert_eq!(slices[0].right.chords.len(), 1);
        assert!(slices[1].left.is_empty() && slices[1].right.is_empty());
        assert!(slices[2].left.is_empty() && slices[2].right.is_empty());
        assert_eq!(slices[3].left.chords[0].pitches(), vec![48]);
        assert_eq!(slices[3].left.measure, 3);
        assert_eq!(slices[3].left.hand, Hand::Left);
    }

    #[test]
    fn test_bucket_order_is_offset_then_pitch() {
        let notes = vec![
            note(72, 0, 960, Hand::Right),
            note(67, 0, 0, Hand::Right),
            note(64, 0, 0, Hand::Right),
            note(65, 0, 480, Hand::Right),
        ];
        let slices = slice_measures(&notes, 1, 0.03).unwrap();
        let labels: Vec<String> = slices[0].right.chords.iter().map(|c| c.label()).collect();
        assert_eq!(labels, vec!["E4+G4", "F4", "C5"]);
    }

    #[test]
    fn test_slicing_is_deterministic() {
        let notes = vec![
            note(62, 1, 240, Hand::Right),
            note(50, 0, 0, Hand::Left),
            note(60, 1, 240, Hand::Right),
            note(43, 1, 0, Hand::Left),
        ];
        let mut reversed = notes.clone();
        reversed.reverse();
        assert_eq!(
            slice_measures(&notes, 2, 0.03).unwrap(),
            slice_measures(&reversed, 2, 0.03).unwrap()
        );
    }

    #[test]
    fn test_note_outside_song_is_an_error() {
        let notes = vec![note(60, 2, 0, Hand::Right)];
        let result = slice_measures(&notes, 2, 0.03);
        assert!(matches!(
            result,
            Err(EtudeError::NoteOutOfRange { measure: 2, total: 2 })
        ));
    }

    #[test]
    fn test_unlabelled_note_is_an_error() {
        let notes = vec![note(60, 0, 0, Hand::Unknown)];
        assert!(matches!(
            slice_measures(&notes, 1, 0.03),
            Err(EtudeError::InvalidInput { index: 0, .. })
        ));
    }
}
