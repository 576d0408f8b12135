//! mood classification: a weighted score and two thresholds.

use crate::domain::{Mood, Reading};

pub const TEMPERATURE_WEIGHT: f64 = 0.5;
pub const ACCELERATION_WEIGHT: f64 = 10.0;

/// scores below this are relaxed
pub const NEUTRAL_FROM: f64 = 15.0;
/// scores at or above this are energetic
pub const ENERGETIC_FROM: f64 = 25.0;

pub fn score(reading: &Reading) -> f64 {
    reading.temperature * TEMPERATURE_WEIGHT + reading.acceleration * ACCELERATION_WEIGHT
}

/// map a reading to its mood; boundary scores go to the upper bucket
pub fn classify(reading: &Reading) -> Mood {
    classify_score(score(reading))
}

pub fn classify_score(score: f64) -> Mood {
    if score < NEUTRAL_FROM {
        Mood::Relaxed
    } else if score < ENERGETIC_FROM {
        Mood::Neutral
    } else {
        Mood::Energetic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(temperature: f64, acceleration: f64) -> Reading {
        Reading { temperature, acceleration }
    }

    #[test]
    fn boundaries_belong_to_upper_bucket() {
        assert_eq!(classify_score(14.999), Mood::Relaxed);
        assert_eq!(classify_score(15.0), Mood::Neutral);
        assert_eq!(classify_score(24.999), Mood::Neutral);
        assert_eq!(classify_score(25.0), Mood::Energetic);
    }

    #[test]
    fn boundaries_via_readings() {
        // temperature only, acceleration zero: score == temperature / 2
        assert_eq!(classify(&reading(29.998, 0.0)), Mood::Relaxed);
        assert_eq!(classify(&reading(30.0, 0.0)), Mood::Neutral);
        assert_eq!(classify(&reading(49.998, 0.0)), Mood::Neutral);
        assert_eq!(classify(&reading(50.0, 0.0)), Mood::Energetic);
    }

    #[test]
    fn scenario_readings() {
        let calm = reading(10.0, 0.5);
        assert_eq!(score(&calm), 10.0);
        assert_eq!(classify(&calm), Mood::Relaxed);

        let active = reading(30.0, 1.0);
        assert_eq!(score(&active), 25.0);
        assert_eq!(classify(&active), Mood::Energetic);
    }

    #[test]
    fn classification_is_monotonic_in_score() {
        let mut previous = Mood::Relaxed;
        let rank = |m: Mood| Mood::ALL.iter().position(|x| *x == m).unwrap();
        for i in 0..=400 {
            let mood = classify_score(i as f64 * 0.1);
            assert!(rank(mood) >= rank(previous));
            previous = mood;
        }
        assert_eq!(previous, Mood::Energetic);
    }

    #[test]
    fn body_temperature_at_rest_is_neutral() {
        // 36.6 * 0.5 = 18.3
        assert_eq!(classify(&reading(36.6, 0.0)), Mood::Neutral);
        // 36.6 * 0.5 + 0.7 * 10 = 25.3
        assert_eq!(classify(&reading(36.6, 0.7)), Mood::Energetic);
    }
}
