//! Threshold status classification
//!
//! Maps a measured value against its parameter's [`ThresholdBand`].

use serde::{Deserialize, Serialize};

use crate::models::{Parameter, ThresholdMap};

/// Severity of a value relative to its threshold band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Safe,
    Caution,
    Critical,
    /// No value, or no band configured for the parameter
    Unknown,
}

impl Severity {
    /// CSS class the table renderer attaches to the cell
    pub fn css_class(self) -> &'static str {
        match self {
            Severity::Safe => "status-safe",
            Severity::Caution => "status-caution",
            Severity::Critical => "status-critical",
            Severity::Unknown => "",
        }
    }
}

/// Classify one cell.
///
/// Predicates are evaluated in a fixed order (safe, then caution, then
/// critical). Bands violating `warn_min <= safe_min <= safe_max <= warn_max`
/// are not rejected; they fall through the same chain.
pub fn classify(
    parameter: Parameter,
    value: Option<f64>,
    thresholds: Option<&ThresholdMap>,
) -> Severity {
    let (Some(value), Some(band)) = (value, thresholds.and_then(|t| t.band(parameter))) else {
        return Severity::Unknown;
    };

    if value >= band.safe_min && value <= band.safe_max {
        return Severity::Safe;
    }

    if (value >= band.warn_min && value < band.safe_min)
        || (value > band.safe_max && value <= band.warn_max)
    {
        return Severity::Caution;
    }

    Severity::Critical
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ThresholdBand;

    fn temperature_thresholds() -> ThresholdMap {
        let mut map = ThresholdMap::default();
        map.insert(
            Parameter::Temperature,
            ThresholdBand {
                safe_min: 20.0,
                safe_max: 28.0,
                warn_min: 15.0,
                warn_max: 32.0,
            },
        );
        map
    }

    #[test]
    fn test_band_edges() {
        let map = temperature_thresholds();
        let at = |v: f64| classify(Parameter::Temperature, Some(v), Some(&map));

        assert_eq!(at(20.0), Severity::Safe);
        assert_eq!(at(28.0), Severity::Safe);
        assert_eq!(at(15.0), Severity::Caution);
        assert_eq!(at(32.0), Severity::Caution);
        assert_eq!(at(14.99), Severity::Critical);
        assert_eq!(at(32.01), Severity::Critical);
    }

    #[test]
    fn test_inside_bands() {
        let map = temperature_thresholds();

        assert_eq!(
            classify(Parameter::Temperature, Some(25.0), Some(&map)),
            Severity::Safe
        );
        assert_eq!(
            classify(Parameter::Temperature, Some(31.0), Some(&map)),
            Severity::Caution
        );
        assert_eq!(
            classify(Parameter::Temperature, Some(17.5), Some(&map)),
            Severity::Caution
        );
        assert_eq!(
            classify(Parameter::Temperature, Some(-3.0), Some(&map)),
            Severity::Critical
        );
    }

    #[test]
    fn test_unknown_cases() {
        let map = temperature_thresholds();

        assert_eq!(
            classify(Parameter::Temperature, None, Some(&map)),
            Severity::Unknown
        );
        assert_eq!(
            classify(Parameter::Ph, Some(7.0), Some(&map)),
            Severity::Unknown
        );
        assert_eq!(
            classify(Parameter::Temperature, Some(25.0), None),
            Severity::Unknown
        );
        assert_eq!(
            classify(Parameter::Temperature, Some(25.0), Some(&ThresholdMap::default())),
            Severity::Unknown
        );
    }

    #[test]
    fn test_inverted_band_falls_through() {
        // warn range narrower than safe range: the safe check still wins first
        let mut map = ThresholdMap::default();
        map.insert(
            Parameter::Ph,
            ThresholdBand {
                safe_min: 6.0,
                safe_max: 9.0,
                warn_min: 7.0,
                warn_max: 8.0,
            },
        );

        assert_eq!(classify(Parameter::Ph, Some(6.5), Some(&map)), Severity::Safe);
        assert_eq!(classify(Parameter::Ph, Some(5.0), Some(&map)), Severity::Critical);
    }

    #[test]
    fn test_css_classes() {
        assert_eq!(Severity::Safe.css_class(), "status-safe");
        assert_eq!(Severity::Caution.css_class(), "status-caution");
        assert_eq!(Severity::Critical.css_class(), "status-critical");
        assert_eq!(Severity::Unknown.css_class(), "");
    }
}
