//! Date and time handling: canonical hours, date resolution, and the
//! `a/to/b[/by/n]` range expanders.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::error::{Error, Result};

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Normalize a time-of-day value to an hour in `0..=23`.
///
/// Accepts plain hours (`"0"`, `"06"`, `"18"`) and `HHMM` forms (`"0600"`,
/// `"1800"`); an `HHMM` value must have zero minutes.
pub(crate) fn canonical_time(time: &str) -> Result<u32> {
    let t = time.trim();
    let mut n: i64 = t.parse().map_err(|_| Error::InvalidTime(t.to_string()))?;
    if n >= 100 {
        if n % 100 != 0 {
            return Err(Error::InvalidTime(t.to_string()));
        }
        n /= 100;
    }
    if !(0..=23).contains(&n) {
        return Err(Error::InvalidTime(t.to_string()));
    }
    Ok(n as u32)
}

/// Resolve a date value to a concrete datetime.
///
/// Accepted forms: a non-positive integer (days relative to `now`), a
/// `YYYYMMDD` integer, and ISO-like strings (`2001-01-01`,
/// `2022-01-25 12:00:00`, `2022-01-25T12:00`, optional trailing `Z`).
/// When `time` is given it replaces the hour and zeroes the minutes.
pub(crate) fn resolve_date(
    date: &str,
    time: Option<&str>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    let trimmed = date.trim();
    let trimmed = trimmed.strip_suffix('Z').unwrap_or(trimmed);

    let mut resolved: Option<NaiveDateTime> = None;

    if let Ok(n) = trimmed.parse::<i64>() {
        let d = if n <= 0 {
            now.date_naive()
                .checked_add_signed(Duration::days(n))
                .ok_or_else(|| Error::InvalidDate(trimmed.to_string()))?
        } else if trimmed.len() == 8 {
            NaiveDate::from_ymd_opt((n / 10000) as i32, (n % 10000 / 100) as u32, (n % 100) as u32)
                .ok_or_else(|| Error::InvalidDate(trimmed.to_string()))?
        } else {
            // positive integers are YYYYMMDD, eight digits exactly
            return Err(Error::InvalidDate(trimmed.to_string()));
        };
        resolved = Some(d.and_time(NaiveTime::MIN));
    }

    if resolved.is_none() {
        for fmt in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
                resolved = Some(dt);
                break;
            }
        }
    }

    if resolved.is_none() {
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            resolved = Some(d.and_time(NaiveTime::MIN));
        }
    }

    let mut dt = resolved.ok_or_else(|| Error::InvalidDate(date.to_string()))?;

    if let Some(time) = time {
        let hour = canonical_time(time)?;
        let t = NaiveTime::from_hms_opt(hour, 0, 0)
            .ok_or_else(|| Error::InvalidTime(time.to_string()))?;
        dt = dt.date().and_time(t);
    }

    Ok(Utc.from_utc_datetime(&dt))
}

/// Trailing step of a range like `"12-24"`; plain values parse directly.
pub(crate) fn end_step(step: &str) -> Result<i64> {
    let last = match step.rsplit_once('-') {
        Some((_, rhs)) => rhs,
        None => step,
    };
    last.trim()
        .parse()
        .map_err(|_| Error::InvalidRequest(format!("invalid step: {step}")))
}

/// Whether a value list has the shape `[a, "to", b]` or `[a, "to", b, "by", n]`.
pub(crate) fn is_range_tokens(tokens: &[String]) -> bool {
    match tokens.len() {
        3 => tokens[1].eq_ignore_ascii_case("to"),
        5 => tokens[1].eq_ignore_ascii_case("to") && tokens[3].eq_ignore_ascii_case("by"),
        _ => false,
    }
}

/// Increment of a range value list, or `default` when none is given.
pub(crate) fn range_increment(tokens: &[String], default: i64) -> Result<i64> {
    let by = if tokens.len() == 5 {
        tokens[4]
            .parse()
            .map_err(|_| Error::InvalidRange(format!("invalid increment {:?}", tokens[4])))?
    } else {
        default
    };
    if by <= 0 {
        return Err(Error::InvalidRange(format!(
            "increment must be positive, got {by}"
        )));
    }
    Ok(by)
}

/// Expand date range tokens to daily `YYYYMMDD` strings, never overshooting
/// the end date. Anything not range-shaped passes through unchanged.
pub(crate) fn expand_date(tokens: &[String], now: DateTime<Utc>) -> Result<Vec<String>> {
    if !is_range_tokens(tokens) {
        return Ok(tokens.to_vec());
    }

    let start = resolve_date(&tokens[0], None, now)?;
    let end = resolve_date(&tokens[2], None, now)?;
    let by = range_increment(tokens, 1)?;
    if start > end {
        return Err(Error::InvalidRange(format!(
            "start {} is after end {}",
            tokens[0], tokens[2]
        )));
    }

    let by = Duration::days(by);
    let mut out = Vec::new();
    let mut cur = start;
    while cur <= end {
        out.push(cur.format("%Y%m%d").to_string());
        cur += by;
    }
    Ok(out)
}

/// Expand time range tokens to hours, stepping six hours by default.
/// Anything not range-shaped passes through unchanged.
pub(crate) fn expand_time(tokens: &[String]) -> Result<Vec<String>> {
    if !is_range_tokens(tokens) {
        return Ok(tokens.to_vec());
    }

    let start = i64::from(canonical_time(&tokens[0])?);
    let end = i64::from(canonical_time(&tokens[2])?);
    let by = range_increment(tokens, 6)?;
    if start > end {
        return Err(Error::InvalidRange(format!(
            "start {start} is after end {end}"
        )));
    }

    let mut out = Vec::new();
    let mut cur = start;
    while cur <= end {
        out.push(cur.to_string());
        cur += by;
    }
    Ok(out)
}
