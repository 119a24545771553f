//! The four-state strength progression for vocabulary entries.

/// Practices required at `learning` before a correct answer promotes to
/// `known`, counted before the current event's increment.
pub const KNOWN_THRESHOLD: u32 = 3;
/// Practices required at `known` before a correct answer promotes to
/// `mastered`, counted before the current event's increment.
pub const MASTERED_THRESHOLD: u32 = 7;

/// Coarse mastery bucket for a vocabulary entry.
///
/// Variant order is the review ordering: less-mastered words sort first.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    parse_display::Display,
    parse_display::FromStr,
)]
#[serde(rename_all = "lowercase")]
#[display(style = "lowercase")]
pub enum Strength {
    #[default]
    New,
    Learning,
    Known,
    Mastered,
}

impl Strength {
    pub fn rank(self) -> u8 {
        self as u8
    }
}

/// Compute the strength an entry moves to after one practice outcome.
///
/// `times_practiced` is the count of prior practices, i.e. the stored
/// counter before this event increments it. Promotion out of `learning`
/// and `known` requires the accumulated-repetition thresholds; an
/// incorrect answer demotes exactly one level, bottoming out at
/// `learning` (and `new` stays `new`).
pub fn apply_outcome(current: Strength, correct: bool, times_practiced: u32) -> Strength {
    use Strength::*;
    if correct {
        match current {
            New => Learning,
            Learning if times_practiced >= KNOWN_THRESHOLD => Known,
            Learning => Learning,
            Known if times_practiced >= MASTERED_THRESHOLD => Mastered,
            Known => Known,
            Mastered => Mastered,
        }
    } else {
        match current {
            New => New,
            Learning => Learning,
            Known => Learning,
            Mastered => Known,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Strength::*;

    #[test]
    fn correct_answers_follow_the_promotion_table() {
        assert_eq!(apply_outcome(New, true, 0), Learning);
        assert_eq!(apply_outcome(New, true, 10), Learning);
        assert_eq!(apply_outcome(Learning, true, 2), Learning);
        assert_eq!(apply_outcome(Learning, true, 3), Known);
        assert_eq!(apply_outcome(Known, true, 6), Known);
        assert_eq!(apply_outcome(Known, true, 7), Mastered);
        assert_eq!(apply_outcome(Mastered, true, 100), Mastered);
    }

    #[test]
    fn incorrect_answers_demote_one_level() {
        assert_eq!(apply_outcome(Mastered, false, 9), Known);
        assert_eq!(apply_outcome(Known, false, 5), Learning);
        assert_eq!(apply_outcome(Learning, false, 2), Learning);
        assert_eq!(apply_outcome(New, false, 0), New);
    }

    #[test]
    fn threshold_uses_the_pre_increment_count() {
        // Two prior practices: stays learning even though this event is
        // the third practice overall.
        assert_eq!(apply_outcome(Learning, true, 2), Learning);
        assert_eq!(apply_outcome(Learning, true, KNOWN_THRESHOLD), Known);
    }

    #[test]
    fn rank_follows_variant_order() {
        assert_eq!(New.rank(), 0);
        assert_eq!(Learning.rank(), 1);
        assert_eq!(Known.rank(), 2);
        assert_eq!(Mastered.rank(), 3);
        assert!(New < Learning && Learning < Known && Known < Mastered);
    }

    #[test]
    fn strength_round_trips_through_text() {
        for strength in [New, Learning, Known, Mastered] {
            let text = strength.to_string();
            assert_eq!(text, text.to_lowercase());
            assert_eq!(text.parse::<Strength>().unwrap(), strength);
            let json = serde_json::to_string(&strength).unwrap();
            assert_eq!(json, format!("\"{text}\""));
        }
    }
}
