//! Input validation module
//!
//! Validates request bodies at the HTTP boundary before they reach the
//! state commands or the feed hub.

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};
use validator::{Validate, ValidationErrors};

use crate::calendar::Picker;
use crate::error::{AppError, AppResult, FilterError};
use crate::filter::SortOrder;
use crate::models::{LiveReading, Parameter};
use crate::state::FilterCommand;

/// Body of `POST /api/history/filter`
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FilterRequest {
    #[validate(
        required(message = "Please select both start date and end date"),
        length(min = 1, message = "Please select both start date and end date")
    )]
    pub start_date: Option<String>,

    #[validate(
        required(message = "Please select both start date and end date"),
        length(min = 1, message = "Please select both start date and end date")
    )]
    pub end_date: Option<String>,

    #[serde(default)]
    pub sort: Option<SortOrder>,
}

impl FilterRequest {
    /// Check presence and date syntax; ordering is checked by the command.
    pub fn into_command(self) -> AppResult<FilterCommand> {
        if let Err(errors) = self.validate() {
            warn!(errors = ?field_messages(&errors), "Filter request missing dates");
            return Err(FilterError::MissingDates.into());
        }

        Ok(FilterCommand {
            start: Some(parse_date_field("start date", self.start_date.as_deref())?),
            end: Some(parse_date_field("end date", self.end_date.as_deref())?),
            sort: self.sort,
        })
    }
}

/// Body of `PUT /api/history/sort`
#[derive(Debug, Clone, Deserialize)]
pub struct SortRequest {
    pub sort: SortOrder,
}

/// Body of `PUT /api/history/selection`
#[derive(Debug, Clone, Deserialize)]
pub struct SelectionRequest {
    pub picker: Picker,
    /// `None` or empty clears the picker
    #[serde(default)]
    pub date: Option<String>,
}

impl SelectionRequest {
    pub fn parsed_date(&self) -> AppResult<Option<NaiveDate>> {
        match self.date.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => parse_date_field("date", Some(text)).map(Some),
        }
    }
}

/// Query of `GET /api/history/calendar`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CalendarQuery {
    #[validate(range(min = 1, max = 9999, message = "Year must be between 1 and 9999"))]
    pub year: i32,

    #[validate(range(min = 1, max = 12, message = "Month must be between 1 and 12"))]
    pub month: u32,

    #[serde(default = "default_picker")]
    pub picker: Picker,
}

fn default_picker() -> Picker {
    Picker::Start
}

impl CalendarQuery {
    pub fn check(&self) -> AppResult<()> {
        self.validate().map_err(|errors| {
            AppError::ValidationError(field_messages(&errors).join("; "))
        })
    }
}

/// Parse a picker date: ISO `YYYY-MM-DD` or the display form `Jan 05, 2026`.
pub fn parse_picker_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%B %d, %Y"))
        .ok()
}

fn parse_date_field(label: &str, text: Option<&str>) -> AppResult<NaiveDate> {
    let text = text.unwrap_or_default();
    parse_picker_date(text).ok_or_else(|| {
        AppError::ValidationError(format!("Invalid {label} {text:?}"))
    })
}

/// Validate a live snapshot pushed through the sensor feed endpoint.
///
/// Only non-finite values are rejected. Values outside the plausible
/// sensor ranges are real extremes for the classifier to flag, so they are
/// logged and accepted.
pub fn validate_live_reading(reading: &LiveReading) -> AppResult<()> {
    if let Err(validation_errors) = reading.validate() {
        warn!(
            errors = ?field_messages(&validation_errors),
            "Live reading outside plausible sensor range; applying anyway"
        );
    }

    for parameter in Parameter::ALL {
        if let Some(value) = reading.value(parameter) {
            validate_finite(parameter, value)?;
        }
    }

    debug!("Live reading validation passed");
    Ok(())
}

fn validate_finite(parameter: Parameter, value: f64) -> AppResult<()> {
    if !value.is_finite() {
        return Err(AppError::ValidationError(format!(
            "{} must be a finite number",
            parameter.key()
        )));
    }
    Ok(())
}

fn field_messages(errors: &ValidationErrors) -> Vec<String> {
    errors
        .field_errors()
        .iter()
        .map(|(field, errors)| {
            let msgs: Vec<&str> = errors
                .iter()
                .filter_map(|e| e.message.as_ref().map(|c| c.as_ref()))
                .collect();
            format!("{}: {}", field, msgs.join(", "))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn request(start: Option<&str>, end: Option<&str>) -> FilterRequest {
        FilterRequest {
            start_date: start.map(String::from),
            end_date: end.map(String::from),
            sort: None,
        }
    }

    #[test]
    fn test_picker_date_formats() {
        assert_eq!(parse_picker_date("2026-01-05"), Some(date(2026, 1, 5)));
        assert_eq!(parse_picker_date("Jan 05, 2026"), Some(date(2026, 1, 5)));
        assert_eq!(parse_picker_date(" Mar 15, 2026 "), Some(date(2026, 3, 15)));
        assert_eq!(parse_picker_date("05/01/2026"), None);
        assert_eq!(parse_picker_date(""), None);
    }

    #[test]
    fn test_filter_request_into_command() {
        let command = request(Some("2026-01-01"), Some("Jan 10, 2026"))
            .into_command()
            .unwrap();

        assert_eq!(command.start, Some(date(2026, 1, 1)));
        assert_eq!(command.end, Some(date(2026, 1, 10)));
        assert!(command.sort.is_none());
    }

    #[test]
    fn test_filter_request_missing_dates() {
        for req in [
            request(None, Some("2026-01-10")),
            request(Some("2026-01-01"), None),
            request(Some(""), Some("2026-01-10")),
        ] {
            match req.into_command() {
                Err(AppError::ValidationError(msg)) => {
                    assert_eq!(msg, FilterError::MissingDates.to_string())
                }
                other => panic!("expected missing-date error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_filter_request_bad_syntax() {
        let result = request(Some("yesterday"), Some("2026-01-10")).into_command();
        assert!(matches!(result, Err(AppError::ValidationError(msg)) if msg.contains("start date")));
    }

    #[test]
    fn test_filter_request_body() {
        let req: FilterRequest = serde_json::from_str(
            r#"{"startDate":"2026-01-01","endDate":"2026-01-02","sort":"ascending"}"#,
        )
        .unwrap();
        assert_eq!(req.sort, Some(SortOrder::Oldest));
    }

    #[test]
    fn test_selection_request() {
        let req = SelectionRequest {
            picker: Picker::End,
            date: Some("2026-02-01".into()),
        };
        assert_eq!(req.parsed_date().unwrap(), Some(date(2026, 2, 1)));

        let clear = SelectionRequest {
            picker: Picker::Start,
            date: Some(String::new()),
        };
        assert_eq!(clear.parsed_date().unwrap(), None);
    }

    #[test]
    fn test_calendar_query() {
        let ok = CalendarQuery { year: 2026, month: 2, picker: Picker::Start };
        assert!(ok.check().is_ok());

        let bad = CalendarQuery { year: 2026, month: 13, picker: Picker::End };
        assert!(bad.check().is_err());
    }

    #[test]
    fn test_valid_live_reading() {
        let reading = LiveReading {
            temperature: Some(26.5),
            ph: Some(7.8),
            dissolved_oxygen: Some(6.1),
            ..Default::default()
        };
        assert!(validate_live_reading(&reading).is_ok());
        assert!(validate_live_reading(&LiveReading::default()).is_ok());
    }

    #[test]
    fn test_extreme_live_reading_accepted() {
        let reading = LiveReading {
            temperature: Some(46.0),
            salinity: Some(80.0),
            turbidity: Some(1200.0),
            ..Default::default()
        };

        assert!(reading.validate().is_err());
        assert!(validate_live_reading(&reading).is_ok());
    }

    #[test]
    fn test_non_finite_live_reading_rejected() {
        let reading = LiveReading {
            ph: Some(f64::NAN),
            ..Default::default()
        };

        match validate_live_reading(&reading) {
            Err(AppError::ValidationError(msg)) => assert!(msg.contains("ph")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_non_finite_values() {
        assert!(validate_finite(Parameter::Ph, f64::NAN).is_err());
        assert!(validate_finite(Parameter::Temperature, f64::INFINITY).is_err());
        assert!(validate_finite(Parameter::Turbidity, 12.0).is_ok());
    }
}
