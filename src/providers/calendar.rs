/// Date and time provider
///
/// Dates are accepted as `Date` values or text in ISO (`YYYY-MM-DD`), US
/// (`MM/DD/YYYY`), long (`January 15, 2024`) or short (`Jan 15, 2024`)
/// form, tried in that order. Current date and time use local time.
use crate::registry::{Operation, Provider};
use crate::value::args;
use crate::{DefaultKind, OperationError, OperationResult, Value};
use chrono::format::{Item, StrftimeItems};
use chrono::{Days, Local, NaiveDate, NaiveTime, Timelike};

pub const PROVIDER_ID: &str = "calendar";

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y"];

#[derive(Debug, Default, Clone, Copy)]
pub struct Calendar;

impl Provider for Calendar {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn operations(&self) -> Vec<Operation> {
        vec![
            Operation::new("current_date", PROVIDER_ID, |_: &[Value]| {
                Ok(Value::Date(Local::now().date_naive()))
            })
            .with_description("Returns current date as YYYY-MM-DD. Args: ()")
            .with_default(DefaultKind::SentinelDate),
            Operation::new("current_time", PROVIDER_ID, |_: &[Value]| {
                let now = Local::now().time();
                // Whole seconds only
                let time = NaiveTime::from_hms_opt(now.hour(), now.minute(), now.second())
                    .unwrap_or(now);
                Ok(Value::Time(time))
            })
            .with_description("Returns current time as HH:MM:SS. Args: ()")
            .with_default(DefaultKind::SentinelTime),
            Operation::new("add_days", PROVIDER_ID, |a: &[Value]| {
                let date = parse_date(a, 0, "date")?;
                let days = args::integer(a, 1, "days")?;
                add_days(date, days).map(Value::Date)
            })
            .with_description("Adds days to a date. Args: (date_str, days)")
            .with_default(DefaultKind::UnchangedDate),
            Operation::new("days_between", PROVIDER_ID, |a: &[Value]| {
                let start = parse_date(a, 0, "date1")?;
                let end = parse_date(a, 1, "date2")?;
                Ok(Value::Integer((end - start).num_days()))
            })
            .with_description("Days between two dates. Args: (date1, date2)")
            .with_default(DefaultKind::SentinelCount),
            Operation::new("format_date", PROVIDER_ID, |a: &[Value]| {
                let date = parse_date(a, 0, "date")?;
                let pattern = args::text(a, 1, "format")?;
                format_date(date, pattern).map(Value::Text)
            })
            .with_description("Formats date with pattern. Args: (date_str, format)")
            .with_default(DefaultKind::UnchangedInput),
        ]
    }
}

fn parse_date(a: &[Value], index: usize, name: &str) -> OperationResult<NaiveDate> {
    if let Some(Value::Text(text)) = a.get(index) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(OperationError::Validation(format!("{} cannot be empty", name)));
        }
        return DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
            .ok_or_else(|| {
                OperationError::Validation(format!(
                    "Cannot parse date: '{}'. Expected formats: YYYY-MM-DD, MM/DD/YYYY, 'Month DD, YYYY', or 'Mon DD, YYYY'",
                    trimmed
                ))
            });
    }
    args::date(a, index, name)
}

fn add_days(date: NaiveDate, days: i64) -> OperationResult<NaiveDate> {
    let shifted = if days >= 0 {
        date.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    shifted.ok_or_else(|| {
        OperationError::Validation(format!("{} plus {} days is out of range", date, days))
    })
}

fn format_date(date: NaiveDate, pattern: &str) -> OperationResult<String> {
    if pattern.trim().is_empty() {
        return Err(OperationError::Validation(
            "format cannot be empty".to_string(),
        ));
    }

    // Formatting an invalid pattern would panic inside Display
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(OperationError::Validation(format!(
            "Invalid format pattern: '{}'",
            pattern
        )));
    }

    Ok(date.format_with_items(items.into_iter()).to_string())
}
