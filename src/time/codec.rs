//! Epoch millisecond codec.
//!
//! Conversions never build a millisecond duration out of a raw day count.
//! Values are decomposed into days since the epoch plus milliseconds of the
//! day, so the full `i64` range can be handled without intermediate overflow.
//!
//! Naive date-times are interpreted as UTC. Sub-millisecond precision is
//! truncated toward the start of the millisecond.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use thiserror::Error;

/// Milliseconds in one UTC calendar day.
pub const MS_PER_DAY: i64 = 86_400_000;

const MS_PER_SECOND: i64 = 1_000;
const NANOS_PER_MS: u32 = 1_000_000;

/// `NaiveDate::num_days_from_ce` of 1970-01-01.
const EPOCH_DAYS_FROM_CE: i64 = 719_163;

/// Errors raised when a timestamp cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// Epoch milliseconds fall outside the calendar range supported by chrono.
    #[error("epoch milliseconds {0} are outside the representable calendar range")]
    OutOfRange(i64),

    /// A calendar value could not be expressed as epoch milliseconds.
    #[error("timestamp {0} cannot be expressed as epoch milliseconds")]
    Overflow(String),
}

/// Converts a zoned timestamp into epoch milliseconds.
///
/// # Arguments
/// * `t` - Any timestamp carrying a definite offset
///
/// # Returns
/// Milliseconds since the Unix epoch, truncated to whole milliseconds
pub fn to_epoch_ms<Tz: TimeZone>(t: &DateTime<Tz>) -> Result<i64, EncodingError> {
    naive_utc_to_epoch_ms(&t.naive_utc())
}

/// Converts epoch milliseconds back into a UTC timestamp.
pub fn to_utc(ms: i64) -> Result<DateTime<Utc>, EncodingError> {
    let days = ms.div_euclid(MS_PER_DAY);
    let ms_of_day = ms.rem_euclid(MS_PER_DAY);

    let days_from_ce = days
        .checked_add(EPOCH_DAYS_FROM_CE)
        .and_then(|d| i32::try_from(d).ok())
        .ok_or(EncodingError::OutOfRange(ms))?;
    let date = NaiveDate::from_num_days_from_ce_opt(days_from_ce)
        .ok_or(EncodingError::OutOfRange(ms))?;

    let secs_of_day = (ms_of_day / MS_PER_SECOND) as u32;
    let nanos = (ms_of_day % MS_PER_SECOND) as u32 * NANOS_PER_MS;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs_of_day, nanos)
        .ok_or(EncodingError::OutOfRange(ms))?;

    Ok(NaiveDateTime::new(date, time).and_utc())
}

fn naive_utc_to_epoch_ms(t: &NaiveDateTime) -> Result<i64, EncodingError> {
    let overflow = || EncodingError::Overflow(t.to_string());

    let days = i64::from(t.date().num_days_from_ce()) - EPOCH_DAYS_FROM_CE;
    // Leap seconds carry nanos >= 1e9; clamp them to the last millisecond.
    let millis = (t.nanosecond().min(999_999_999) / NANOS_PER_MS) as i64;
    let ms_of_day = i64::from(t.num_seconds_from_midnight()) * MS_PER_SECOND + millis;

    days.checked_mul(MS_PER_DAY)
        .and_then(|ms| ms.checked_add(ms_of_day))
        .ok_or_else(overflow)
}

/// Time points accepted wherever the public API takes a timestamp.
///
/// Raw `i64` values are taken as epoch milliseconds, zoned values are
/// normalised through their offset and naive values are treated as UTC.
pub trait IntoEpochMs {
    fn into_epoch_ms(self) -> Result<i64, EncodingError>;
}

impl IntoEpochMs for i64 {
    fn into_epoch_ms(self) -> Result<i64, EncodingError> {
        Ok(self)
    }
}

impl<Tz: TimeZone> IntoEpochMs for DateTime<Tz> {
    fn into_epoch_ms(self) -> Result<i64, EncodingError> {
        to_epoch_ms(&self)
    }
}

impl<Tz: TimeZone> IntoEpochMs for &DateTime<Tz> {
    fn into_epoch_ms(self) -> Result<i64, EncodingError> {
        to_epoch_ms(self)
    }
}

impl IntoEpochMs for NaiveDateTime {
    fn into_epoch_ms(self) -> Result<i64, EncodingError> {
        naive_utc_to_epoch_ms(&self)
    }
}
