//! Time resolution: seconds ↔ ticks ↔ measures
//!
//! Two independent maps are combined into a [`Timeline`]:
//!
//! - [`TempoMap`] converts between absolute seconds and MIDI ticks. A tempo change
//!   takes effect immediately at its stated time; each segment caches the tick it
//!   starts at, so later changes never re-time earlier events.
//! - [`MeterMap`] converts ticks into `(measure, offset)`. A time signature change only
//!   takes effect on a barline: if it is stated mid-measure, the cutover happens at the
//!   next measure boundary.
//!
//! Defaults: no tempo changes → 120 BPM throughout; no time signatures → 4/4.

use tracing::debug;

use crate::error::EtudeError;
use crate::midi::{ParsedMidi, RawNoteEvent, TempoSegment, TimeSignatureSegment, DEFAULT_BPM};
use crate::song::{Hand, ResolvedNote, TimeSignature};

/// Slack for float tick comparisons at segment boundaries
const TICK_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
struct TempoPoint {
    time: f64,
    start_ticks: f64,
    bpm: f64,
}

/// Piecewise-constant tempo timeline
#[derive(Debug, Clone)]
pub struct TempoMap {
    points: Vec<TempoPoint>,
    ticks_per_beat: f64,
}

impl TempoMap {
    pub fn new(changes: &[TempoSegment], ticks_per_beat: u16) -> Result<Self, EtudeError> {
        if ticks_per_beat == 0 {
            return Err(EtudeError::Timeline(
                "ticks per beat must be positive".to_string(),
            ));
        }
        let tpb = ticks_per_beat as f64;
        let mut points: Vec<TempoPoint> = Vec::with_capacity(changes.len() + 1);

        for (i, segment) in changes.iter().enumerate() {
            if !segment.time.is_finite() || segment.time < 0.0 {
                return Err(EtudeError::Timeline(format!(
                    "tempo change {} has invalid time {}",
                    i, segment.time
                )));
            }
            let bpm = segment.effective_bpm().ok_or_else(|| {
                EtudeError::Timeline(format!("tempo change {} has no usable tempo", i))
            })?;

            // Before the first stated tempo, MIDI's implicit 120 BPM applies
            if points.is_empty() && segment.time > 0.0 {
                points.push(TempoPoint {
                    time: 0.0,
                    start_ticks: 0.0,
                    bpm: DEFAULT_BPM,
                });
            }

            match points.last_mut() {
                Some(last) if segment.time < last.time => {
                    return Err(EtudeError::Timeline(format!(
                        "tempo change {} at {}s comes before the previous change at {}s",
                        i, segment.time, last.time
                    )));
                }
                // Two changes at the same instant: the later one wins
                Some(last) if segment.time == last.time => last.bpm = bpm,
                Some(last) => {
                    let start_ticks =
                        last.start_ticks + (segment.time - last.time) * last.bpm / 60.0 * tpb;
                    points.push(TempoPoint {
                        time: segment.time,
                        start_ticks,
                        bpm,
                    });
                }
                None => points.push(TempoPoint {
                    time: 0.0,
                    start_ticks: 0.0,
                    bpm,
                }),
            }
        }

        if points.is_empty() {
            points.push(TempoPoint {
                time: 0.0,
                start_ticks: 0.0,
                bpm: DEFAULT_BPM,
            });
        }

        Ok(Self {
            points,
            ticks_per_beat: tpb,
        })
    }

    fn point_at_seconds(&self, seconds: f64) -> &TempoPoint {
        let idx = self
            .points
            .partition_point(|p| p.time <= seconds)
            .saturating_sub(1);
        &self.points[idx]
    }

    fn point_at_ticks(&self, ticks: f64) -> &TempoPoint {
        let idx = self
            .points
            .partition_point(|p| p.start_ticks <= ticks + TICK_EPSILON)
            .saturating_sub(1);
        &self.points[idx]
    }

    pub fn seconds_to_ticks(&self, seconds: f64) -> f64 {
        let point = self.point_at_seconds(seconds);
        point.start_ticks + (seconds - point.time) * point.bpm / 60.0 * self.ticks_per_beat
    }

    pub fn ticks_to_seconds(&self, ticks: f64) -> f64 {
        let point = self.point_at_ticks(ticks);
        point.time + (ticks - point.start_ticks) / self.ticks_per_beat * 60.0 / point.bpm
    }

    pub fn bpm_at(&self, seconds: f64) -> f64 {
        self.point_at_seconds(seconds).bpm
    }

    pub fn bpm_at_ticks(&self, ticks: f64) -> f64 {
        self.point_at_ticks(ticks).bpm
    }
}

#[derive(Debug, Clone, PartialEq)]
struct MeterRegion {
    start_tick: u64,
    start_measure: usize,
    ticks_per_measure: u64,
    signature: TimeSignature,
}

/// Time signature timeline quantized to barlines
#[derive(Debug, Clone)]
pub struct MeterMap {
    regions: Vec<MeterRegion>,
}

impl MeterMap {
    pub fn new(segments: &[TimeSignatureSegment], ticks_per_beat: u16) -> Result<Self, EtudeError> {
        if ticks_per_beat == 0 {
            return Err(EtudeError::Timeline(
                "ticks per beat must be positive".to_string(),
            ));
        }
        let tpb = ticks_per_beat as u64;
        let default = TimeSignature::default();
        let mut regions = Vec::with_capacity(segments.len() + 1);
        let mut current = MeterRegion {
            start_tick: 0,
            start_measure: 0,
            ticks_per_measure: ticks_per_measure(tpb, &default)?,
            signature: default,
        };
        let mut last_tick = 0u64;

        for (i, segment) in segments.iter().enumerate() {
            let signature = validate_signature(i, segment)?;
            if segment.ticks < last_tick {
                return Err(EtudeError::Timeline(format!(
                    "time signature {} at tick {} comes before tick {}",
                    i, segment.ticks, last_tick
                )));
            }
            last_tick = segment.ticks;
            let tpm = ticks_per_measure(tpb, &signature)?;

            // Measures of the current signature until the first barline at or after the change.
            // A change stated before a pending cutover lands on that same barline.
            let measures = segment
                .ticks
                .saturating_sub(current.start_tick)
                .div_ceil(current.ticks_per_measure);

            if measures == 0 {
                current.signature = signature;
                current.ticks_per_measure = tpm;
            } else {
                let next = MeterRegion {
                    start_tick: current.start_tick + measures * current.ticks_per_measure,
                    start_measure: current.start_measure + measures as usize,
                    ticks_per_measure: tpm,
                    signature,
                };
                regions.push(std::mem::replace(&mut current, next));
            }
        }
        regions.push(current);

        Ok(Self { regions })
    }

    fn region_for_tick(&self, tick: u64) -> &MeterRegion {
        let idx = self
            .regions
            .partition_point(|r| r.start_tick <= tick)
            .saturating_sub(1);
        &self.regions[idx]
    }

    fn region_for_measure(&self, measure: usize) -> &MeterRegion {
        let idx = self
            .regions
            .partition_point(|r| r.start_measure <= measure)
            .saturating_sub(1);
        &self.regions[idx]
    }

    /// Owning measure index and the offset into it, both for an absolute tick
    pub fn locate(&self, tick: u64) -> (usize, u64) {
        let region = self.region_for_tick(tick);
        let into_region = tick - region.start_tick;
        (
            region.start_measure + (into_region / region.ticks_per_measure) as usize,
            into_region % region.ticks_per_measure,
        )
    }

    pub fn measure_start_tick(&self, measure: usize) -> u64 {
        let region = self.region_for_measure(measure);
        region.start_tick + (measure - region.start_measure) as u64 * region.ticks_per_measure
    }

    pub fn measure_ticks(&self, measure: usize) -> u64 {
        self.region_for_measure(measure).ticks_per_measure
    }

    pub fn signature_at(&self, measure: usize) -> TimeSignature {
        self.region_for_measure(measure).signature
    }

    /// Number of measures needed to cover `[0, total_ticks)`
    pub fn measure_count(&self, total_ticks: u64) -> usize {
        if total_ticks == 0 {
            return 0;
        }
        self.locate(total_ticks - 1).0 + 1
    }
}

fn validate_signature(
    index: usize,
    segment: &TimeSignatureSegment,
) -> Result<TimeSignature, EtudeError> {
    if segment.numerator == 0 {
        return Err(EtudeError::Timeline(format!(
            "time signature {} has a zero numerator",
            index
        )));
    }
    if !segment.denominator.is_power_of_two() || segment.denominator > 64 {
        return Err(EtudeError::Timeline(format!(
            "time signature {} has denominator {} (expected a power of two up to 64)",
            index, segment.denominator
        )));
    }
    Ok(TimeSignature {
        beats: segment.numerator,
        beat_type: segment.denominator,
    })
}

fn ticks_per_measure(ticks_per_beat: u64, signature: &TimeSignature) -> Result<u64, EtudeError> {
    let numerator = ticks_per_beat * 4 * signature.beats as u64;
    let denominator = signature.beat_type as u64;
    if numerator % denominator != 0 {
        return Err(EtudeError::Timeline(format!(
            "{} ticks per beat cannot express a {} measure in whole ticks",
            ticks_per_beat, signature
        )));
    }
    Ok(numerator / denominator)
}

/// Where an instant falls on the measure grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub ticks: u64,
    pub measure: usize,
    pub offset_ticks: u64,
    pub offset_beats: f64,
}

/// Tempo and meter maps for one piece
#[derive(Debug, Clone)]
pub struct Timeline {
    tempo: TempoMap,
    meter: MeterMap,
    ticks_per_beat: u16,
    duration_seconds: f64,
}

impl Timeline {
    pub fn new(
        tempo_changes: &[TempoSegment],
        time_signatures: &[TimeSignatureSegment],
        ticks_per_beat: u16,
        duration_seconds: f64,
    ) -> Result<Self, EtudeError> {
        if !duration_seconds.is_finite() || duration_seconds < 0.0 {
            return Err(EtudeError::Timeline(format!(
                "duration {} is not a valid number of seconds",
                duration_seconds
            )));
        }
        Ok(Self {
            tempo: TempoMap::new(tempo_changes, ticks_per_beat)?,
            meter: MeterMap::new(time_signatures, ticks_per_beat)?,
            ticks_per_beat,
            duration_seconds,
        })
    }

    pub fn from_midi(midi: &ParsedMidi) -> Result<Self, EtudeError> {
        Self::new(
            &midi.tempo_changes,
            &midi.time_signatures,
            midi.ticks_per_beat,
            midi.duration_seconds,
        )
    }

    pub fn tempo(&self) -> &TempoMap {
        &self.tempo
    }

    pub fn meter(&self) -> &MeterMap {
        &self.meter
    }

    /// Nearest whole tick for an absolute time
    pub fn ticks_at(&self, seconds: f64) -> u64 {
        self.tempo.seconds_to_ticks(seconds).round().max(0.0) as u64
    }

    pub fn locate_seconds(&self, seconds: f64) -> Position {
        self.position_at(self.ticks_at(seconds))
    }

    /// Like [`Timeline::locate_seconds`], but an onset before the end of the
    /// piece never rounds onto or past the final barline
    fn locate_onset(&self, seconds: f64) -> Position {
        let ticks = self.ticks_at(seconds);
        let total = self.total_ticks();
        if seconds < self.duration_seconds && total > 0 && ticks >= total {
            return self.position_at(total - 1);
        }
        self.position_at(ticks)
    }

    fn position_at(&self, ticks: u64) -> Position {
        let (measure, offset_ticks) = self.meter.locate(ticks);
        Position {
            ticks,
            measure,
            offset_ticks,
            offset_beats: offset_ticks as f64 / self.ticks_per_beat as f64,
        }
    }

    /// Quarter-note beats spanned by `[start, start + duration)`, honouring tempo changes inside
    pub fn beats_between(&self, start_seconds: f64, duration_seconds: f64) -> f64 {
        let start = self.tempo.seconds_to_ticks(start_seconds);
        let end = self.tempo.seconds_to_ticks(start_seconds + duration_seconds);
        (end - start) / self.ticks_per_beat as f64
    }

    pub fn total_ticks(&self) -> u64 {
        self.ticks_at(self.duration_seconds)
    }

    pub fn measure_count(&self) -> usize {
        self.meter.measure_count(self.total_ticks())
    }

    pub fn measure_start_seconds(&self, measure: usize) -> f64 {
        self.tempo
            .ticks_to_seconds(self.meter.measure_start_tick(measure) as f64)
    }

    pub fn measure_beats(&self, measure: usize) -> f64 {
        self.meter.measure_ticks(measure) as f64 / self.ticks_per_beat as f64
    }

    pub fn signature_at(&self, measure: usize) -> TimeSignature {
        self.meter.signature_at(measure)
    }

    /// Tempo in effect on the downbeat of a measure
    pub fn bpm_at_measure(&self, measure: usize) -> f64 {
        self.tempo
            .bpm_at_ticks(self.meter.measure_start_tick(measure) as f64)
    }

    /// Place raw events on the measure grid
    ///
    /// Velocity-0 events are note-off markers and are dropped. Hands are left
    /// `Unknown` for the hand separator to fill in.
    pub fn resolve(&self, events: &[RawNoteEvent]) -> Result<Vec<ResolvedNote>, EtudeError> {
        let mut resolved = Vec::with_capacity(events.len());
        for (index, event) in events.iter().enumerate() {
            validate_event(index, event)?;
            if event.velocity == 0 {
                debug!(index, note = event.note, "skipping note-off marker");
                continue;
            }
            let position = self.locate_onset(event.time);
            resolved.push(ResolvedNote {
                note: event.note,
                name: ResolvedNote::pitch_label(event.note),
                velocity: event.velocity,
                channel: event.channel,
                time: event.time,
                duration: event.duration,
                measure: position.measure,
                offset_ticks: position.offset_ticks,
                offset_beats: position.offset_beats,
                duration_beats: self.beats_between(event.time, event.duration),
                hand: Hand::Unknown,
            });
        }
        Ok(resolved)
    }
}

fn validate_event(index: usize, event: &RawNoteEvent) -> Result<(), EtudeError> {
    let problem = if event.note > 127 {
        Some(format!("note {} is outside 0..=127", event.note))
    } else if event.velocity > 127 {
        Some(format!("velocity {} is outside 0..=127", event.velocity))
    } else if event.channel > 15 {
        Some(format!("channel {} is outside 0..=15", event.channel))
    } else if !event.time.is_finite() || event.time < 0.0 {
        Some(format!("start time {} is not a valid time", event.time))
    } else if !event.duration.is_finite() || event.duration < 0.0 {
        Some(format!("duration {} is not a valid length", event.duration))
    } else {
        None
    };
    match problem {
        Some(message) => Err(EtudeError::InvalidInput { index, message }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    const TPB: u16 = 480;

    #[test]
    fn test_defaults_120_bpm_four_four() {
        let timeline = Timeline::new(&[], &[], TPB, 24.0).unwrap();
        // 120 BPM: one second = two beats = 960 ticks; a 4/4 bar = 1920 ticks = 2 s
        assert_eq!(timeline.ticks_at(1.0), 960);
        assert_eq!(timeline.measure_count(), 12);
        assert_eq!(timeline.signature_at(5), TimeSignature::default());
        assert_eq!(timeline.bpm_at_measure(0), 120.0);

        let pos = timeline.locate_seconds(5.0);
        assert_eq!(pos.measure, 2);
        assert_eq!(pos.offset_ticks, 960);
        assert_eq!(pos.offset_beats, 2.0);
    }

    #[test]
    fn test_measure_count_boundaries() {
        // Exactly on a barline does not open a new measure
        let exact = Timeline::new(&[], &[], TPB, 4.0).unwrap();
        assert_eq!(exact.measure_count(), 2);

        let past = Timeline::new(&[], &[], TPB, 4.01).unwrap();
        assert_eq!(past.measure_count(), 3);

        let empty = Timeline::new(&[], &[], TPB, 0.0).unwrap();
        assert_eq!(empty.measure_count(), 0);
    }

    #[test]
    fn test_time_signature_change_mid_measure_waits_for_barline() {
        // 3/4 stated at tick 2880, halfway through measure 1 (1920..3840)
        let meter = MeterMap::new(&[TimeSignatureSegment::new(2880, 3, 4)], TPB).unwrap();

        assert_eq!(meter.signature_at(1), TimeSignature::default());
        assert_eq!(meter.measure_ticks(1), 1920);
        assert_eq!(meter.measure_start_tick(2), 3840);
        assert_eq!(meter.signature_at(2), TimeSignature { beats: 3, beat_type: 4 });
        assert_eq!(meter.measure_ticks(2), 1440);

        assert_eq!(meter.locate(3000), (1, 1080));
        assert_eq!(meter.locate(3840), (2, 0));
        assert_eq!(meter.locate(3840 + 1440), (3, 0));
    }

    #[test]
    fn test_time_signature_on_barline_and_at_zero() {
        let meter = MeterMap::new(
            &[
                TimeSignatureSegment::new(0, 6, 8),
                TimeSignatureSegment::new(2880, 2, 4),
            ],
            TPB,
        )
        .unwrap();
        // 6/8 = 1440 ticks; tick 2880 is exactly the start of measure 2
        assert_eq!(meter.signature_at(0), TimeSignature { beats: 6, beat_type: 8 });
        assert_eq!(meter.locate(2879), (1, 1439));
        assert_eq!(meter.locate(2880), (2, 0));
        assert_eq!(meter.measure_ticks(2), 960);
    }

    #[test]
    fn test_same_boundary_last_signature_wins() {
        let meter = MeterMap::new(
            &[
                TimeSignatureSegment::new(100, 3, 4),
                TimeSignatureSegment::new(200, 5, 4),
            ],
            TPB,
        )
        .unwrap();
        assert_eq!(meter.signature_at(1), TimeSignature { beats: 5, beat_type: 4 });
        assert_eq!(meter.measure_start_tick(2), 1920 + 2400);
    }

    #[test]
    fn test_tempo_change_is_not_retroactive() {
        let tempo = TempoMap::new(
            &[TempoSegment::from_bpm(0.0, 120.0), TempoSegment::from_bpm(2.0, 60.0)],
            TPB,
        )
        .unwrap();

        assert_approx_eq!(tempo.seconds_to_ticks(1.0), 960.0);
        assert_approx_eq!(tempo.seconds_to_ticks(2.0), 1920.0);
        // After the change a second is one beat
        assert_approx_eq!(tempo.seconds_to_ticks(3.0), 2400.0);
        assert_approx_eq!(tempo.ticks_to_seconds(2400.0), 3.0);
        assert_approx_eq!(tempo.ticks_to_seconds(960.0), 1.0);
        assert_eq!(tempo.bpm_at(1.99), 120.0);
        assert_eq!(tempo.bpm_at(2.0), 60.0);
    }

    #[test]
    fn test_implicit_120_before_first_tempo() {
        let tempo = TempoMap::new(&[TempoSegment::from_bpm(1.0, 60.0)], TPB).unwrap();
        assert_eq!(tempo.bpm_at(0.5), 120.0);
        assert_approx_eq!(tempo.seconds_to_ticks(1.0), 960.0);
        assert_approx_eq!(tempo.seconds_to_ticks(2.0), 1440.0);
    }

    #[test]
    fn test_bpm_at_measure_uses_downbeat_tempo() {
        // Tempo drops to 60 at 4 s, which is exactly the downbeat of measure 2
        let timeline = Timeline::new(
            &[TempoSegment::from_bpm(0.0, 120.0), TempoSegment::from_bpm(4.0, 60.0)],
            &[],
            TPB,
            12.0,
        )
        .unwrap();
        assert_eq!(timeline.bpm_at_measure(1), 120.0);
        assert_eq!(timeline.bpm_at_measure(2), 60.0);
        assert_approx_eq!(timeline.measure_start_seconds(3), 8.0);
        // 4 s at 120 + 8 s at 60 = 8 + 8 beats = 4 measures
        assert_eq!(timeline.measure_count(), 4);
    }

    #[test]
    fn test_beats_between_spans_tempo_change() {
        let timeline = Timeline::new(
            &[TempoSegment::from_bpm(0.0, 120.0), TempoSegment::from_bpm(1.0, 60.0)],
            &[],
            TPB,
            4.0,
        )
        .unwrap();
        // 0.5 s at 120 BPM (1 beat) + 1 s at 60 BPM (1 beat)
        assert_approx_eq!(timeline.beats_between(0.5, 1.5), 2.0);
    }

    #[test]
    fn test_resolve_places_notes_on_grid() {
        let timeline = Timeline::new(&[], &[], TPB, 4.0).unwrap();
        let events = vec![
            RawNoteEvent { note: 60, velocity: 90, time: 0.0, duration: 0.5, channel: 0 },
            RawNoteEvent { note: 62, velocity: 0, time: 0.5, duration: 0.0, channel: 0 },
            // Slightly early because of float noise in the parser; rounds onto the barline
            RawNoteEvent { note: 64, velocity: 70, time: 1.999_999_9, duration: 1.0, channel: 1 },
        ];
        let notes = timeline.resolve(&events).unwrap();

        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].name, "C4");
        assert_eq!((notes[0].measure, notes[0].offset_ticks), (0, 0));
        assert_approx_eq!(notes[0].duration_beats, 1.0);
        assert_eq!((notes[1].measure, notes[1].offset_ticks), (1, 0));
        assert_eq!(notes[1].hand, Hand::Unknown);
        assert_eq!(notes[1].channel, 1);
    }

    #[test]
    fn test_onset_just_before_end_stays_in_last_measure() {
        // 3.9996 s is 3839.6 ticks, which rounds onto the closing barline at 3840
        let timeline = Timeline::new(&[], &[], TPB, 4.0).unwrap();
        assert_eq!(timeline.measure_count(), 2);
        let events = vec![
            RawNoteEvent { note: 60, velocity: 90, time: 0.0, duration: 0.5, channel: 0 },
            RawNoteEvent { note: 72, velocity: 90, time: 3.9996, duration: 0.0004, channel: 0 },
        ];
        let notes = timeline.resolve(&events).unwrap();

        assert_eq!(notes[1].measure, 1);
        assert_eq!(notes[1].offset_ticks, 1919);
        assert!(notes.iter().all(|n| n.measure < timeline.measure_count()));
        // Plain lookups still round to the nearest tick
        assert_eq!(timeline.locate_seconds(3.9996).measure, 2);
    }

    #[test]
    fn test_resolve_rejects_malformed_events() {
        let timeline = Timeline::new(&[], &[], TPB, 4.0).unwrap();
        let events = vec![
            RawNoteEvent { note: 60, velocity: 90, time: 0.0, duration: 0.5, channel: 0 },
            RawNoteEvent { note: 200, velocity: 90, time: 0.5, duration: 0.5, channel: 0 },
        ];
        match timeline.resolve(&events) {
            Err(EtudeError::InvalidInput { index, message }) => {
                assert_eq!(index, 1);
                assert!(message.contains("note 200"));
            }
            other => panic!("Expected InvalidInput but got: {:?}", other),
        }

        let negative = vec![RawNoteEvent { note: 60, velocity: 90, time: -1.0, duration: 0.5, channel: 0 }];
        assert!(timeline.resolve(&negative).is_err());
    }

    #[test]
    fn test_malformed_timelines() {
        assert!(TempoMap::new(&[], 0).is_err());
        assert!(TempoMap::new(
            &[TempoSegment::from_bpm(2.0, 100.0), TempoSegment::from_bpm(1.0, 90.0)],
            TPB
        )
        .is_err());
        assert!(TempoMap::new(
            &[TempoSegment {
                time: 0.0,
                bpm: 0.0,
                microseconds_per_beat: 0
            }],
            TPB
        )
        .is_err());
        assert!(MeterMap::new(&[TimeSignatureSegment::new(0, 3, 5)], TPB).is_err());
        assert!(MeterMap::new(&[TimeSignatureSegment::new(0, 0, 4)], TPB).is_err());
        assert!(MeterMap::new(
            &[TimeSignatureSegment::new(960, 3, 4), TimeSignatureSegment::new(0, 4, 4)],
            TPB
        )
        .is_err());
        assert!(Timeline::new(&[], &[], TPB, f64::NAN).is_err());
    }
}
