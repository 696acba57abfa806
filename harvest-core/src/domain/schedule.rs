//! Schedule domain types
//!
//! Recurrence rules are daily time-of-day triggers evaluated in the
//! process-local time zone. The rule set is computed once at startup.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Hour and minute of a daily trigger (24h clock)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

/// Error parsing a `HH:MM` time of day
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeOfDayError {
    #[error("expected HH:MM, got '{0}'")]
    Format(String),

    #[error("time out of range: {0}")]
    OutOfRange(String),
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self, TimeOfDayError> {
        if hour > 23 || minute > 59 {
            return Err(TimeOfDayError::OutOfRange(format!("{:02}:{:02}", hour, minute)));
        }
        Ok(Self { hour, minute })
    }

    /// Whether the given wall-clock time falls inside this trigger's minute
    pub fn matches(&self, time: NaiveTime) -> bool {
        time.hour() == self.hour && time.minute() == self.minute
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeOfDayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| TimeOfDayError::Format(s.to_string()))?;
        let hour = h
            .parse::<u32>()
            .map_err(|_| TimeOfDayError::Format(s.to_string()))?;
        let minute = m
            .parse::<u32>()
            .map_err(|_| TimeOfDayError::Format(s.to_string()))?;
        Self::new(hour, minute)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// What a rule does when it fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleAction {
    /// Dispatch the whole batch
    RunAll,
    /// Dispatch a single site
    RunOne(String),
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleAction::RunAll => write!(f, "run-all"),
            RuleAction::RunOne(id) => write!(f, "run-one({})", id),
        }
    }
}

/// A daily trigger bound to an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub at: TimeOfDay,
    pub action: RuleAction,
}

impl RecurrenceRule {
    /// Builds the daily plan: one batch trigger plus one trigger per site
    ///
    /// Site `i` (in load order) fires at `(base_hour + i) mod 24`, minute 0.
    pub fn daily_plan<'a>(
        batch_at: TimeOfDay,
        base_hour: u32,
        site_ids: impl IntoIterator<Item = &'a str>,
    ) -> Vec<RecurrenceRule> {
        let mut rules = vec![RecurrenceRule {
            at: batch_at,
            action: RuleAction::RunAll,
        }];

        for (index, id) in site_ids.into_iter().enumerate() {
            let hour = ((base_hour as usize + index) % 24) as u32;
            rules.push(RecurrenceRule {
                at: TimeOfDay { hour, minute: 0 },
                action: RuleAction::RunOne(id.to_string()),
            });
        }

        rules
    }
}
