use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%d/%m/%Y";
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// The single mutable break row. Overwritten in place on every start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BreakRecord {
    pub start_timestamp: DateTime<Utc>,
    pub start_date: String,
    pub start_time: String,
    pub is_active: bool,
}

impl BreakRecord {
    /// Derives the date and time strings from `instant` as seen in `time_zone`.
    pub fn started_at<Tz: TimeZone>(instant: DateTime<Utc>, time_zone: &Tz) -> Self {
        let local = instant.with_timezone(time_zone).naive_local();
        Self {
            start_timestamp: instant,
            start_date: local.format(DATE_FORMAT).to_string(),
            start_time: local.format(TIME_FORMAT).to_string(),
            is_active: true,
        }
    }

    pub fn start_epoch_seconds(&self) -> f64 {
        self.start_timestamp.timestamp_millis() as f64 / 1000.0
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_date(&self.start_date, "break.start_date")?;
        validate_time(&self.start_time, "break.start_time")?;
        Ok(())
    }
}

/// A finished break as handed to the ledger. Times are local and unshifted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BreakEntry {
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub reason: String,
}

impl BreakEntry {
    pub fn validate(&self) -> Result<(), String> {
        validate_date(&self.date, "entry.date")?;
        validate_time(&self.start_time, "entry.start_time")?;
        validate_time(&self.end_time, "entry.end_time")?;
        if self.reason.trim().is_empty() {
            return Err("entry.reason must not be empty".to_string());
        }
        Ok(())
    }
}

/// One ledger row, columns A through G.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    pub row_index: u32,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_formula: String,
    pub reason: String,
    pub running_total_formula: String,
}

impl SheetRow {
    pub fn cells(&self) -> Vec<String> {
        vec![
            self.date.clone(),
            self.start_time.clone(),
            self.end_time.clone(),
            self.duration_formula.clone(),
            self.reason.clone(),
            String::new(),
            self.running_total_formula.clone(),
        ]
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    #[default]
    Reject,
    Overwrite,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
}

impl OAuthToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>, leeway_seconds: i64) -> bool {
        self.expires_at > now + chrono::Duration::seconds(leeway_seconds)
            && !self.access_token.trim().is_empty()
    }
}

/// Renders a whole number of seconds as `HH:MM:SS`; hours are not wrapped.
pub fn format_elapsed(total_seconds: i64) -> String {
    let total_seconds = total_seconds.max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

fn validate_date(value: &str, field_name: &str) -> Result<(), String> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| format!("{field_name} must be DD/MM/YYYY"))?;
    Ok(())
}

fn validate_time(value: &str, field_name: &str) -> Result<(), String> {
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .map_err(|_| format!("{field_name} must be HH:MM:SS"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid RFC3339")
            .with_timezone(&Utc)
    }

    #[test]
    fn started_at_derives_strings_from_the_same_instant() {
        let record = BreakRecord::started_at(fixed_time("2024-03-01T09:00:00Z"), &Utc);
        assert_eq!(record.start_date, "01/03/2024");
        assert_eq!(record.start_time, "09:00:00");
        assert!(record.is_active);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn started_at_uses_the_given_time_zone() {
        let madrid_winter = FixedOffset::east_opt(3600).expect("valid offset");
        let record = BreakRecord::started_at(fixed_time("2024-03-01T23:30:00Z"), &madrid_winter);
        assert_eq!(record.start_date, "02/03/2024");
        assert_eq!(record.start_time, "00:30:00");
    }

    #[test]
    fn start_epoch_seconds_keeps_millisecond_precision() {
        let record = BreakRecord::started_at(fixed_time("2024-03-01T09:00:00.250Z"), &Utc);
        assert_eq!(record.start_epoch_seconds(), 1_709_283_600.25);
    }

    #[test]
    fn entry_validate_rejects_blank_reason() {
        let entry = BreakEntry {
            date: "01/03/2024".to_string(),
            start_time: "09:00:00".to_string(),
            end_time: "09:30:00".to_string(),
            reason: "   ".to_string(),
        };
        assert!(entry.validate().is_err());
    }

    #[test]
    fn sheet_row_leaves_column_f_blank() {
        let row = SheetRow {
            row_index: 5,
            date: "01/03/2024".to_string(),
            start_time: "10:00:00".to_string(),
            end_time: "10:30:00".to_string(),
            duration_formula: "=C5-B5".to_string(),
            reason: "lunch".to_string(),
            running_total_formula: "=SUMIF(A2:A5,A5,D2:D5)".to_string(),
        };
        let cells = row.cells();
        assert_eq!(cells.len(), 7);
        assert_eq!(cells[4], "lunch");
        assert_eq!(cells[5], "");
    }

    #[test]
    fn format_elapsed_pads_and_does_not_wrap_hours() {
        assert_eq!(format_elapsed(0), "00:00:00");
        assert_eq!(format_elapsed(1_800), "00:30:00");
        assert_eq!(format_elapsed(90_061), "25:01:01");
        assert_eq!(format_elapsed(-5), "00:00:00");
    }

    proptest! {
        #[test]
        fn started_at_output_always_validates(seconds in 0i64..4_102_444_800i64) {
            let instant = DateTime::<Utc>::from_timestamp(seconds, 0).expect("in range");
            let record = BreakRecord::started_at(instant, &Utc);
            prop_assert!(record.validate().is_ok());
            prop_assert_eq!(record.start_epoch_seconds(), seconds as f64);
        }

        #[test]
        fn format_elapsed_roundtrips_through_components(seconds in 0i64..1_000_000i64) {
            let rendered = format_elapsed(seconds);
            let parts: Vec<i64> = rendered
                .split(':')
                .map(|part| part.parse().expect("numeric part"))
                .collect();
            prop_assert_eq!(parts[0] * 3600 + parts[1] * 60 + parts[2], seconds);
        }
    }
}
