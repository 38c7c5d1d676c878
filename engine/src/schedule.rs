// SPDX-License-Identifier: Apache-2.0
//! Cron schedule arithmetic.
//!
//! Pure functions over an explicit instant, so the reconciler's requeue
//! decisions are testable without a clock. Missed ticks are never
//! backfilled: the next run is always computed from "now or later".

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::error::{EngineError, Result};

/// Parses a cron expression. Standard five-field expressions are accepted;
/// the `cron` crate's native six/seven-field form (with seconds) works
/// unchanged.
pub fn parse(expression: &str) -> Result<Schedule> {
    let fields = expression.split_whitespace().count();
    let normalized = if fields == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    };
    Schedule::from_str(&normalized).map_err(|e| EngineError::InvalidSchedule {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// The first fire time strictly after `after`, or None for expressions with
/// no future occurrence.
pub fn next_run(expression: &str, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    Ok(parse(expression)?.after(&after).next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn five_field_expressions_parse() {
        assert!(parse("*/5 * * * *").is_ok());
        assert!(parse("0 3 * * 1").is_ok());
    }

    #[test]
    fn malformed_expressions_are_rejected_with_context() {
        let err = parse("every five minutes").unwrap_err();
        match err {
            EngineError::InvalidSchedule { expression, .. } => {
                assert_eq!(expression, "every five minutes");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn next_run_lands_on_the_following_tick() {
        let after = Utc.with_ymd_and_hms(2026, 3, 1, 10, 2, 30).unwrap();
        let next = next_run("*/5 * * * *", after).unwrap().unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 1, 10, 5, 0).unwrap());
    }

    #[test]
    fn next_run_is_strictly_in_the_future() {
        let on_tick = Utc.with_ymd_and_hms(2026, 3, 1, 10, 5, 0).unwrap();
        let next = next_run("*/5 * * * *", on_tick).unwrap().unwrap();
        assert!(next > on_tick);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 1, 10, 10, 0).unwrap());
    }
}
