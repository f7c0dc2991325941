/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Time model for batch windows.
//!
//! Batches are bound to half-open windows `[start, end)` over a wall clock
//! fixed at UTC+08:00. All datetimes handled here are naive local times in
//! that zone; the conversions to and from Unix epoch seconds go through
//! [`LOCAL_OFFSET_SECONDS`] so that day-level windows break at local
//! midnight regardless of the host timezone.
//!
//! Timestamps are persisted as `%Y-%m-%d %H:%M:%S` text. That format
//! compares lexicographically in chronological order, and the batch store
//! relies on it for `plan_time <= now` scans.

use chrono::{DateTime, Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Storage format for all persisted timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Sentinel stored in `exec_time` / `exit_time` columns before a batch has
/// run. Sorts before any real timestamp.
pub const UNSET_TIMESTAMP: &str = "0000-00-00 00:00:00";

/// Fixed UTC+08:00 wall-clock offset, in seconds.
pub const LOCAL_OFFSET_SECONDS: i64 = 8 * 3600;

/// Width of the batch generation horizon: batches are materialised up to
/// this far past the current tick.
pub const GENERATION_HORIZON_MINUTES: i64 = 180;

/// The time unit a task's windows are expressed in.
///
/// The unit fixes both the width of a single window and the truncation
/// length of the window tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecUnit {
    Minute,
    Hour,
    Day,
}

impl ExecUnit {
    /// Seconds in one unit.
    pub fn unit_seconds(&self) -> i64 {
        match self {
            ExecUnit::Minute => 60,
            ExecUnit::Hour => 3600,
            ExecUnit::Day => 86400,
        }
    }

    /// Tag truncation length over `%Y%m%d%H%M%S`: day keeps the date, hour
    /// keeps through the hour, minute through the minute.
    pub fn tag_len(&self) -> usize {
        match self {
            ExecUnit::Day => 8,
            ExecUnit::Hour => 10,
            ExecUnit::Minute => 12,
        }
    }

    /// `n` units as a duration.
    pub fn span(&self, n: i64) -> Duration {
        match self {
            ExecUnit::Minute => Duration::minutes(n),
            ExecUnit::Hour => Duration::hours(n),
            ExecUnit::Day => Duration::days(n),
        }
    }

    /// Parses the stored unit string.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value {
            "minute" => Ok(ExecUnit::Minute),
            "hour" => Ok(ExecUnit::Hour),
            "day" => Ok(ExecUnit::Day),
            other => Err(ValidationError::UnknownExecUnit(other.to_string())),
        }
    }

    /// The stored unit string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecUnit::Minute => "minute",
            ExecUnit::Hour => "hour",
            ExecUnit::Day => "day",
        }
    }
}

/// Converts a local wall-clock datetime to Unix epoch seconds.
pub fn epoch_from_local(local: NaiveDateTime) -> i64 {
    local.and_utc().timestamp() - LOCAL_OFFSET_SECONDS
}

/// Converts Unix epoch seconds to the local wall clock.
pub fn local_from_epoch(epoch: i64) -> NaiveDateTime {
    // Safe for any epoch this scheduler can produce; chrono's representable
    // range exceeds ±260,000 years.
    DateTime::from_timestamp(epoch + LOCAL_OFFSET_SECONDS, 0)
        .expect("epoch within chrono range")
        .naive_utc()
}

/// Current local wall-clock time, truncated to whole seconds.
pub fn now_local() -> NaiveDateTime {
    local_from_epoch(chrono::Utc::now().timestamp())
}

/// Formats a datetime in the storage format.
pub fn format_ts(dt: NaiveDateTime) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a stored timestamp. The unset sentinel is rejected; callers check
/// for it explicitly where it is meaningful.
pub fn parse_ts(value: &str) -> Result<NaiveDateTime, ValidationError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map_err(|_| ValidationError::MalformedTimestamp(value.to_string()))
}

/// The most recent fully-elapsed window start for a task created at `now`.
///
/// Minute and hour floors are plain epoch floors minus one unit; the day
/// floor shifts by the local offset first so the boundary lands at local
/// midnight.
pub fn init_start(now: NaiveDateTime, unit: ExecUnit) -> NaiveDateTime {
    let epoch = epoch_from_local(now);
    let start = match unit {
        ExecUnit::Minute => (epoch.div_euclid(60) - 1) * 60,
        ExecUnit::Hour => (epoch.div_euclid(3600) - 1) * 3600,
        ExecUnit::Day => {
            ((epoch + LOCAL_OFFSET_SECONDS).div_euclid(86400) - 1) * 86400 - LOCAL_OFFSET_SECONDS
        }
    };
    local_from_epoch(start)
}

/// The start of the window that follows a window starting at `start`, for a
/// task striding `param` units between windows.
pub fn next_start(start: NaiveDateTime, unit: ExecUnit, param: i32) -> NaiveDateTime {
    start + unit.span(param as i64)
}

/// The exclusive end of the window starting at `start`.
///
/// A window is always exactly one unit wide, independent of the stride
/// between windows. Tasks with `exec_unit_param > 1` therefore leave gaps
/// between consecutive windows; upstream consumers depend on this bucketing.
pub fn window_end(start: NaiveDateTime, unit: ExecUnit) -> NaiveDateTime {
    start + unit.span(1)
}

/// Canonical tag identifying a `(task_name, window)` pair.
pub fn tag_name(task_name: &str, start: NaiveDateTime, unit: ExecUnit) -> String {
    let stamp = start.format("%Y%m%d%H%M%S").to_string();
    format!("{}_{}", task_name, &stamp[..unit.tag_len()])
}

/// Applies a `[days, hours, minutes]` dependency offset to a window start.
pub fn apply_offset(start: NaiveDateTime, offset: [i64; 3]) -> NaiveDateTime {
    start + Duration::days(offset[0]) + Duration::hours(offset[1]) + Duration::minutes(offset[2])
}

/// Wall-clock duration between two instants, in minutes, rounded up.
/// Sub-minute (and sub-second) durations round to one minute.
pub fn duration_minutes_ceil(start: NaiveDateTime, end: NaiveDateTime) -> i32 {
    let millis = (end - start).num_milliseconds().max(0);
    ((millis + 59_999) / 60_000) as i32
}

/// A batch execution window as passed to task scripts.
///
/// Half-open `[ts_start, ts_end)` in Unix epoch seconds. The closed form of
/// any accessor is `(start, end - 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub ts_start: i64,
    pub ts_end: i64,
}

impl Interval {
    /// Builds an interval from raw epoch seconds.
    pub fn new(ts_start: i64, ts_end: i64) -> Self {
        Self { ts_start, ts_end }
    }

    /// Builds an interval from local window boundaries.
    pub fn from_window(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            ts_start: epoch_from_local(start),
            ts_end: epoch_from_local(end),
        }
    }

    /// The interval as epoch seconds.
    pub fn as_epochs(&self, closed: bool) -> (i64, i64) {
        if closed {
            (self.ts_start, self.ts_end - 1)
        } else {
            (self.ts_start, self.ts_end)
        }
    }

    /// The interval as local wall-clock datetimes.
    pub fn as_datetimes(&self, closed: bool) -> (NaiveDateTime, NaiveDateTime) {
        let (start, end) = self.as_epochs(closed);
        (local_from_epoch(start), local_from_epoch(end))
    }

    /// The interval formatted with a chrono format string.
    pub fn format(&self, fmt: &str, closed: bool) -> (String, String) {
        let (start, end) = self.as_datetimes(closed);
        (
            start.format(fmt).to_string(),
            end.format(fmt).to_string(),
        )
    }
}
