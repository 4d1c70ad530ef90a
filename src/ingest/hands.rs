//! Hand separation and chord grouping
//!
//! ## Hand Assignment
//! - One channel: pitch decides. Notes below the split point (default middle C) go to the
//!   left hand, the rest to the right hand.
//! - Several channels: the channel decides, because channels are an authorial signal.
//!   A channel listed in `channel-hands` gets that hand. Otherwise its mean pitch is
//!   compared with the split point. If every channel would then share one hand, one
//!   inferred channel moves across: the lowest (by mean pitch) to the left hand when all
//!   are right, the highest to the right hand when all are left. Listed channels never move.
//!
//! ## Chord Grouping
//! Notes on the same hand and in the same measure merge into one chord when consecutive
//! onsets are closer than the tolerance. Grouping is transitive: a rolled chord whose
//! outer notes are further apart than the tolerance still merges as long as each step is
//! within it. Members are ordered by pitch.
//!
//! Neither step changes timing; they only label and regroup.

use std::collections::BTreeMap;

use crate::config::{ChannelHands, IngestOptions};
use crate::song::{Chord, Hand, ResolvedNote};

pub struct HandSeparator {
    split_point: u8,
    channel_hands: ChannelHands,
}

impl HandSeparator {
    pub fn new(options: &IngestOptions) -> Self {
        Self {
            split_point: options.split_point,
            channel_hands: options.channel_hands.clone(),
        }
    }

    pub fn hand_for_pitch(&self, note: u8) -> Hand {
        if note < self.split_point {
            Hand::Left
        } else {
            Hand::Right
        }
    }

    /// Label every note with a hand
    pub fn separate(&self, notes: &[ResolvedNote]) -> Vec<ResolvedNote> {
        let by_channel = self.channel_assignments(notes);
        notes
            .iter()
            .map(|note| {
                let hand = by_channel
                    .get(&note.channel)
                    .copied()
                    .unwrap_or_else(|| self.hand_for_pitch(note.note));
                note.with_hand(hand)
            })
            .collect()
    }

    /// Hand per channel, or an empty map when only one channel is present
    pub fn channel_assignments(&self, notes: &[ResolvedNote]) -> BTreeMap<u8, Hand> {
        let mut pitch_sums: BTreeMap<u8, (u64, u64)> = BTreeMap::new();
        for note in notes {
            let entry = pitch_sums.entry(note.channel).or_default();
            entry.0 += note.note as u64;
            entry.1 += 1;
        }
        if pitch_sums.len() < 2 {
            return BTreeMap::new();
        }

        let means: BTreeMap<u8, f64> = pitch_sums
            .iter()
            .map(|(channel, (sum, count))| (*channel, *sum as f64 / *count as f64))
            .collect();

        let mut assignments: BTreeMap<u8, Hand> = BTreeMap::new();
        let mut inferred: Vec<(f64, u8)> = Vec::new();
        for (channel, mean) in &means {
            let hand = match self.channel_hands.hand_for(*channel) {
                Some(hand) => hand,
                None => {
                    inferred.push((*mean, *channel));
                    if *mean >= self.split_point as f64 {
                        Hand::Right
                    } else {
                        Hand::Left
                    }
                }
            };
            assignments.insert(*channel, hand);
        }

        // Only inferred channels move; ties on mean pitch rank by channel number
        let shared = assignments.values().next().copied();
        if assignments.values().all(|hand| Some(*hand) == shared) {
            let by_rank = |a: &&(f64, u8), b: &&(f64, u8)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
            let moved = match shared {
                Some(Hand::Right) => inferred.iter().min_by(by_rank).map(|(_, c)| (*c, Hand::Left)),
                Some(Hand::Left) => inferred.iter().max_by(by_rank).map(|(_, c)| (*c, Hand::Right)),
                _ => None,
            };
            if let Some((channel, hand)) = moved {
                assignments.insert(channel, hand);
            }
        }

        assignments
    }
}

/// Merge near-simultaneous onsets into chords
///
/// Returns chords ordered by hand, then measure, then onset.
pub fn group_chords(notes: &[ResolvedNote], tolerance_seconds: f64) -> Vec<Chord> {
    let mut sorted: Vec<&ResolvedNote> = notes.iter().collect();
    sorted.sort_by(|a, b| {
        a.hand
            .cmp(&b.hand)
            .then(a.measure.cmp(&b.measure))
            .then(a.time.total_cmp(&b.time))
            .then(a.note.cmp(&b.note))
    });

    let mut chords = Vec::new();
    let mut current: Vec<ResolvedNote> = Vec::new();

    for note in sorted {
        let joins = current.last().is_some_and(|prev| {
            prev.hand == note.hand
                && prev.measure == note.measure
                && note.time - prev.time < tolerance_seconds
        });
        if !joins && !current.is_empty() {
            chords.push(build_chord(std::mem::take(&mut current)));
        }
        current.push(note.clone());
    }
    if !current.is_empty() {
        chords.push(build_chord(current));
    }

    chords
}

/// Flatten chords back into notes and group them again
pub fn regroup(chords: &[Chord], tolerance_seconds: f64) -> Vec<Chord> {
    let notes: Vec<ResolvedNote> = chords.iter().flat_map(|c| c.notes.iter().cloned()).collect();
    group_chords(&notes, tolerance_seconds)
}

fn build_chord(mut notes: Vec<ResolvedNote>) -> Chord {
    let (time, offset_beats) = notes
        .iter()
        .map(|n| (n.time, n.offset_beats))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .unwrap_or_default();
    notes.sort_by(|a, b| a.note.cmp(&b.note).then(a.time.total_cmp(&b.time)));
    Chord {
        hand: notes[0].hand,
        measure: notes[0].measure,
        time,
        offset_beats,
        notes,
    }
}
