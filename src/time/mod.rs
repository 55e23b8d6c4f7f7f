//! Timestamp handling.
//!
//! Every timestamp stored by this crate is a signed 64-bit count of
//! milliseconds since 1970-01-01T00:00:00Z. This module converts between that
//! representation and `chrono` calendar types.

pub mod codec;

pub use codec::{to_epoch_ms, to_utc, EncodingError, IntoEpochMs, MS_PER_DAY};
