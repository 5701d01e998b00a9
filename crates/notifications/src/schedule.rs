//! Weekly schedule of the expiry report job
//!
//! The backend stores the schedule as a five-field cron expression,
//! `minute hour day-of-month month day-of-week`. Only the minute, hour and
//! day-of-week fields are used; days are numbered 0 (Sunday) to 6.

use std::fmt;
use std::str::FromStr;

use lisa_rust_auth::{ApiClient, ApiRequest, AuthError};
use log::{debug, info, warn};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::NotificationError;

/// Name of the backend job that sends the report
pub const JOB_NAME: &str = "sendEmail";

const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

pub fn day_name(day: u8) -> &'static str {
    DAY_NAMES.get(day as usize).copied().unwrap_or("?")
}

/// Time of day, `HH:MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScheduleTime {
    pub hour: u8,
    pub minute: u8,
}

impl ScheduleTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, NotificationError> {
        if hour > 23 || minute > 59 {
            return Err(NotificationError::Validation(vec![format!(
                "{}:{} is not a time of day",
                hour, minute
            )]));
        }
        Ok(Self { hour, minute })
    }
}

impl fmt::Display for ScheduleTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for ScheduleTime {
    type Err = NotificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NotificationError::Validation(vec![format!("'{}' is not HH:MM", s)]);
        let (hour, minute) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour = hour.parse().map_err(|_| invalid())?;
        let minute = minute.parse().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }
}

/// Days and times the report is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// Ascending, unique, 0 = Sunday
    pub days: Vec<u8>,
    pub times: Vec<ScheduleTime>,
}

impl Default for Schedule {
    /// Weekdays at 09:00 and 15:00
    fn default() -> Self {
        Self {
            days: vec![1, 2, 3, 4, 5],
            times: vec![
                ScheduleTime { hour: 9, minute: 0 },
                ScheduleTime { hour: 15, minute: 0 },
            ],
        }
    }
}

fn parse_field(expression: &str, field: &str, name: &str, max: u8) -> Result<u8, NotificationError> {
    let value: u8 = field.parse().map_err(|_| NotificationError::InvalidCron {
        expression: expression.to_string(),
        reason: format!("{} '{}' is not a number", name, field),
    })?;
    if value > max {
        return Err(NotificationError::InvalidCron {
            expression: expression.to_string(),
            reason: format!("{} {} is out of range", name, value),
        });
    }
    Ok(value)
}

impl Schedule {
    pub fn new(days: Vec<u8>, times: Vec<ScheduleTime>) -> Self {
        let mut schedule = Self { days, times };
        schedule.normalize_days();
        schedule
    }

    fn normalize_days(&mut self) {
        self.days.sort_unstable();
        self.days.dedup();
    }

    /// Parses `m h * * dow`, where `h` is a comma list and `dow` is `*`, a
    /// day, a range or a comma list of either
    pub fn parse(expression: &str) -> Result<Self, NotificationError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        let [minute, hours, _, _, dow] = fields[..] else {
            return Err(NotificationError::InvalidCron {
                expression: expression.to_string(),
                reason: format!("expected 5 fields, found {}", fields.len()),
            });
        };

        let minute = parse_field(expression, minute, "minute", 59)?;
        let times = hours
            .split(',')
            .map(|h| {
                parse_field(expression, h, "hour", 23).map(|hour| ScheduleTime { hour, minute })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut days: Vec<u8> = Vec::new();
        if dow == "*" {
            days.extend(0..=6);
        } else {
            for item in dow.split(',') {
                match item.split_once('-') {
                    Some((start, end)) => {
                        let start = parse_field(expression, start, "day", 7)?;
                        let end = parse_field(expression, end, "day", 7)?;
                        days.extend((start..=end).map(|d| d % 7));
                    }
                    None => days.push(parse_field(expression, item, "day", 7)? % 7),
                }
            }
        }

        Ok(Self::new(days, times))
    }

    /// Formats the schedule as cron. Cron has a single minute field, so every
    /// time fires at the minute of the first one.
    pub fn to_cron(&self) -> String {
        let minute = self.times.first().map(|t| t.minute).unwrap_or(0);
        if self.times.iter().any(|t| t.minute != minute) {
            warn!(
                "Schedule times have different minutes, all will fire at minute {:02}",
                minute
            );
        }

        let mut hours: Vec<u8> = Vec::new();
        for time in &self.times {
            if !hours.contains(&time.hour) {
                hours.push(time.hour);
            }
        }

        let mut days = self.days.clone();
        days.sort_unstable();
        days.dedup();

        format!(
            "{:02} {} * * {}",
            minute,
            hours
                .iter()
                .map(|h| format!("{:02}", h))
                .collect::<Vec<_>>()
                .join(","),
            days.iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(",")
        )
    }

    pub fn validate(&self) -> Result<(), NotificationError> {
        let mut errors = Vec::new();
        if self.days.is_empty() || self.times.is_empty() {
            errors.push("Select at least one day and one time".to_string());
        }
        if let Some(day) = self.days.iter().find(|d| **d > 6) {
            errors.push(format!("{} is not a day of the week", day));
        }
        if let Some(time) = self.times.iter().find(|t| t.hour > 23 || t.minute > 59) {
            errors.push(format!("{}:{} is not a time of day", time.hour, time.minute));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(NotificationError::Validation(errors))
        }
    }

    pub fn toggle_day(&mut self, day: u8) {
        match self.days.iter().position(|d| *d == day) {
            Some(index) => {
                self.days.remove(index);
            }
            None => {
                self.days.push(day);
                self.normalize_days();
            }
        }
    }

    /// Removes a time, keeping at least one
    pub fn remove_time(&mut self, index: usize) {
        if self.times.len() > 1 && index < self.times.len() {
            self.times.remove(index);
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days: Vec<_> = self.days.iter().map(|d| day_name(*d)).collect();
        let times: Vec<_> = self.times.iter().map(|t| t.to_string()).collect();
        write!(f, "{} at {}", days.join(", "), times.join(", "))
    }
}

/// A scheduled backend job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronJob {
    pub uuid: String,
    #[serde(default)]
    pub name: Option<String>,
    pub time_schedule: String,
    #[serde(default)]
    pub is_running: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created,
    Updated,
}

/// Client for `/cron/*`
#[derive(Debug, Clone)]
pub struct ScheduleClient {
    api: ApiClient,
}

impl ScheduleClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// The running report job, if the backend has one
    pub async fn running(&self) -> Result<Option<CronJob>, NotificationError> {
        let envelope = self.api.get("/cron/running").envelope().await?;
        if envelope.status != 200 {
            debug!("No running job (status {})", envelope.status);
            return Ok(None);
        }

        let jobs: Vec<CronJob> = match envelope.data {
            Some(data) if !data.is_null() => serde_json::from_value(data)?,
            _ => Vec::new(),
        };
        Ok(jobs.into_iter().next())
    }

    /// The running job with its parsed schedule, or the default schedule when
    /// there is no job or its expression cannot be read
    pub async fn current(&self) -> Result<(Option<CronJob>, Schedule), NotificationError> {
        let job = self.running().await?;
        let schedule = match &job {
            Some(job) => Schedule::parse(&job.time_schedule).unwrap_or_else(|e| {
                warn!("{}, using the default schedule", e);
                Schedule::default()
            }),
            None => Schedule::default(),
        };
        Ok((job, schedule))
    }

    pub async fn create(&self, schedule: &Schedule) -> Result<(), NotificationError> {
        schedule.validate()?;
        let cron = schedule.to_cron();
        let body = json!({
            "name": JOB_NAME,
            "time_schedule": cron,
            "is_running": true,
        });
        self.submit(self.api.post("/cron/create").json(&body)?, "Failed to save schedule")
            .await?;

        info!("Created report schedule {}", cron);
        Ok(())
    }

    pub async fn update(&self, uuid: &str, schedule: &Schedule) -> Result<(), NotificationError> {
        schedule.validate()?;
        let cron = schedule.to_cron();
        let body = json!({
            "uuid": uuid,
            "time_schedule": cron,
            "is_running": true,
        });
        self.submit(self.api.put("/cron/update").json(&body)?, "Failed to update schedule")
            .await?;

        info!("Updated report schedule {} to {}", uuid, cron);
        Ok(())
    }

    /// Updates the running job, or creates one when there is none
    pub async fn save(&self, schedule: &Schedule) -> Result<SaveOutcome, NotificationError> {
        match self.running().await? {
            Some(job) => {
                self.update(&job.uuid, schedule).await?;
                Ok(SaveOutcome::Updated)
            }
            None => {
                self.create(schedule).await?;
                Ok(SaveOutcome::Created)
            }
        }
    }

    async fn submit(
        &self,
        request: ApiRequest<'_>,
        fallback: &str,
    ) -> Result<(), NotificationError> {
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::Unauthorized.into());
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::api(status.as_u16(), text, fallback).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(hour: u8, minute: u8) -> ScheduleTime {
        ScheduleTime { hour, minute }
    }

    #[test]
    fn test_default_schedule() {
        let schedule = Schedule::default();
        assert_eq!(schedule.to_cron(), "00 09,15 * * 1,2,3,4,5");
        assert_eq!(
            schedule.to_string(),
            "Monday, Tuesday, Wednesday, Thursday, Friday at 09:00, 15:00"
        );
    }

    #[test]
    fn test_parse_day_forms() {
        let range = Schedule::parse("30 8,17 * * 1-5").unwrap();
        assert_eq!(range.days, vec![1, 2, 3, 4, 5]);
        assert_eq!(range.times, vec![t(8, 30), t(17, 30)]);

        let list = Schedule::parse("0 9 * * 5,1,3").unwrap();
        assert_eq!(list.days, vec![1, 3, 5]);

        let single = Schedule::parse("0 9 * * 0").unwrap();
        assert_eq!(single.days, vec![0]);

        let every = Schedule::parse("0 9 * * *").unwrap();
        assert_eq!(every.days, vec![0, 1, 2, 3, 4, 5, 6]);

        // 7 is Sunday too
        let sunday = Schedule::parse("0 9 * * 6-7").unwrap();
        assert_eq!(sunday.days, vec![0, 6]);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Schedule::parse("0 9 * *").is_err());
        assert!(Schedule::parse("61 9 * * 1").is_err());
        assert!(Schedule::parse("0 24 * * 1").is_err());
        assert!(Schedule::parse("0 9 * * mon").is_err());
    }

    #[test]
    fn test_to_cron_collapses_minutes_and_hours() {
        let schedule = Schedule::new(vec![5, 1, 1], vec![t(9, 15), t(9, 45), t(14, 0)]);
        assert_eq!(schedule.to_cron(), "15 09,14 * * 1,5");

        let reparsed = Schedule::parse(&schedule.to_cron()).unwrap();
        assert_eq!(reparsed.times, vec![t(9, 15), t(14, 15)]);
    }

    #[test]
    fn test_validate_and_edit() {
        let mut schedule = Schedule::new(vec![1], vec![t(9, 0)]);
        assert!(schedule.validate().is_ok());

        schedule.remove_time(0);
        assert_eq!(schedule.times.len(), 1);

        schedule.toggle_day(1);
        assert!(schedule.validate().is_err());

        schedule.toggle_day(3);
        schedule.toggle_day(0);
        assert_eq!(schedule.days, vec![0, 3]);
    }

    #[test]
    fn test_schedule_time_parsing() {
        assert_eq!("9:05".parse::<ScheduleTime>().unwrap(), t(9, 5));
        assert_eq!(t(9, 5).to_string(), "09:05");
        assert!("25:00".parse::<ScheduleTime>().is_err());
        assert!("noon".parse::<ScheduleTime>().is_err());
    }
}
