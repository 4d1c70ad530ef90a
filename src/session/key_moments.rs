//! Key moment matching
//!
//! Key moments are authored lines such as `"Bar 5: Watch the leap"` or
//! `"Bars 9-12: Left hand takes the melody"`. Lines in any other shape are not
//! key moments; they are skipped without error.

use std::sync::OnceLock;

use regex::Regex;

use super::types::Priority;

/// A key moment tied to an inclusive range of 1-based bar numbers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMoment {
    pub text: String,
    pub first_bar: usize,
    pub last_bar: usize,
}

const PATTERN: &str = r"(?i)^\s*(?:bar\s+(\d+)|bars\s+(\d+)\s*-\s*(\d+))\s*:";

fn pattern() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(PATTERN).expect("key moment pattern is a valid regex"))
}

impl KeyMoment {
    pub fn parse(text: &str) -> Option<KeyMoment> {
        let caps = pattern().captures(text)?;
        let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<usize>().ok());

        let (first_bar, last_bar) = match number(1) {
            Some(bar) => (bar, bar),
            None => (number(2)?, number(3)?),
        };
        if first_bar == 0 || first_bar > last_bar {
            return None;
        }
        Some(KeyMoment {
            text: text.trim().to_string(),
            first_bar,
            last_bar,
        })
    }

    pub fn covers(&self, measure_number: usize) -> bool {
        (self.first_bar..=self.last_bar).contains(&measure_number)
    }

    /// `High` on the bar that opens the range, `Med` on the bars after it
    pub fn priority_at(&self, measure_number: usize) -> Priority {
        if measure_number == self.first_bar {
            Priority::High
        } else {
            Priority::Med
        }
    }
}

/// Key moments that apply to a 1-based measure number, in authored order
pub fn detect_key_moments(moments: &[String], measure_number: usize) -> Vec<(KeyMoment, Priority)> {
    moments
        .iter()
        .filter_map(|text| KeyMoment::parse(text))
        .filter(|moment| moment.covers(measure_number))
        .map(|moment| {
            let priority = moment.priority_at(measure_number);
            (moment, priority)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_compiles() {
        assert!(Regex::new(PATTERN).is_ok());
        assert!(pattern().is_match("Bar 1:"));
    }

    #[test]
    fn test_parse_single_bar() {
        let moment = KeyMoment::parse("Bar 5: Watch the leap").unwrap();
        assert_eq!((moment.first_bar, moment.last_bar), (5, 5));
        assert_eq!(moment.text, "Bar 5: Watch the leap");
    }

    #[test]
    fn test_parse_range_case_and_whitespace() {
        let moment = KeyMoment::parse("  bars 3 - 4 :crescendo").unwrap();
        assert_eq!((moment.first_bar, moment.last_bar), (3, 4));
        assert!(KeyMoment::parse("BARS 9-12: Left hand melody").is_some());
    }

    #[test]
    fn test_other_formats_ignored() {
        for text in [
            "Measure 3: nope",
            "Bar: missing number",
            "Bar 3 no colon",
            "Bars 5-3: backwards",
            "Bar 0: zero",
            "Bars 3: range without end",
            "In bar 3: not at the start",
            "",
        ] {
            assert_eq!(KeyMoment::parse(text), None, "{:?}", text);
        }
    }

    #[test]
    fn test_detect_range_matches_only_its_bars() {
        let moments = vec![
            "Bars 3-4: crescendo".to_string(),
            "Bar 4: land on the downbeat".to_string(),
            "General advice".to_string(),
        ];
        assert!(detect_key_moments(&moments, 2).is_empty());

        let third = detect_key_moments(&moments, 3);
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].1, Priority::High);

        let fourth = detect_key_moments(&moments, 4);
        assert_eq!(fourth.len(), 2);
        assert_eq!(fourth[0].0.text, "Bars 3-4: crescendo");
        assert_eq!(fourth[0].1, Priority::Med);
        assert_eq!(fourth[1].1, Priority::High);

        assert!(detect_key_moments(&moments, 5).is_empty());
    }
}
