//! Job scheduler
//!
//! Interval jobs run every N minutes from start; daily jobs run once per
//! date at a wall-clock time. The runner polls `due` on a short tick.

use anyhow::Result;
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime};
use std::fmt;

use crate::config::{parse_time, SessionConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Job {
    StandardCheck,
    LiveNewsCheck,
    CollectOptions,
    RecalculateAverages,
    CleanupHistory,
    DailySummary,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Job::StandardCheck => "standard check",
            Job::LiveNewsCheck => "live news check",
            Job::CollectOptions => "options collection",
            Job::RecalculateAverages => "average recalculation",
            Job::CleanupHistory => "history cleanup",
            Job::DailySummary => "daily summary",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
enum Trigger {
    Every { interval: Duration, next: DateTime<Local> },
    DailyAt { at: NaiveTime, last_run: Option<NaiveDate> },
}

#[derive(Debug, Clone)]
struct Entry {
    job: Job,
    trigger: Trigger,
}

#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    entries: Vec<Entry>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard schedule from the session config, anchored at `start`.
    pub fn from_config(cfg: &SessionConfig, start: DateTime<Local>) -> Result<Self> {
        let check = i64::from(cfg.check_interval_mins);
        let live = i64::from(cfg.live_news_interval_mins);

        let mut s = Self::new();
        s.every(Job::StandardCheck, Duration::minutes(check), start);
        s.every(Job::LiveNewsCheck, Duration::minutes(live), start);
        s.every(Job::CollectOptions, Duration::minutes(check), start);
        s.daily_at(Job::RecalculateAverages, parse_time(&cfg.averages_at)?, start);
        s.daily_at(Job::CleanupHistory, parse_time(&cfg.cleanup_at)?, start);
        s.daily_at(Job::DailySummary, parse_time(&cfg.summary_at)?, start);
        Ok(s)
    }

    /// First run one interval after `start`.
    pub fn every(&mut self, job: Job, interval: Duration, start: DateTime<Local>) {
        let interval = interval.max(Duration::seconds(1));
        self.entries.push(Entry {
            job,
            trigger: Trigger::Every {
                interval,
                next: start + interval,
            },
        });
    }

    /// If `start` is already past `at`, the first run is tomorrow.
    pub fn daily_at(&mut self, job: Job, at: NaiveTime, start: DateTime<Local>) {
        let last_run = if start.time() >= at {
            Some(start.date_naive())
        } else {
            None
        };
        self.entries.push(Entry {
            job,
            trigger: Trigger::DailyAt { at, last_run },
        });
    }

    /// Jobs due at `now`, in registration order. Each is marked as run.
    pub fn due(&mut self, now: DateTime<Local>) -> Vec<Job> {
        let mut jobs = Vec::new();

        for entry in &mut self.entries {
            match &mut entry.trigger {
                Trigger::Every { interval, next } => {
                    if now >= *next {
                        jobs.push(entry.job);
                        // skip slots missed while the process was busy
                        while *next <= now {
                            *next += *interval;
                        }
                    }
                }
                Trigger::DailyAt { at, last_run } => {
                    let today = now.date_naive();
                    if now.time() >= *at && *last_run != Some(today) {
                        jobs.push(entry.job);
                        *last_run = Some(today);
                    }
                }
            }
        }
        jobs
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
