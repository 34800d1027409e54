// src/engine/scheduler.rs

//! Periodic jobs.
//!
//! Each [`ScheduledJob`] is a Tokio task that sleeps until its next firing
//! and then sends one [`RuntimeEvent`] to the runtime. Jobs never touch the
//! watcher state themselves, so firing is just another event in the queue.

use std::time::Duration;

use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::ScheduleConfig;
use crate::engine::{RescanReason, RuntimeEvent};

/// When a job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Fixed period, first firing one period after arming.
    Every(Duration),
    /// Once a day at this local wall-clock time.
    DailyAt(NaiveTime),
}

impl Schedule {
    /// Time to wait from `now` (local wall-clock) until the next firing.
    pub fn delay_from(&self, now: NaiveDateTime) -> Duration {
        match *self {
            Schedule::Every(period) => period,
            Schedule::DailyAt(at) => delay_until_next(now, at),
        }
    }
}

/// Time until the next occurrence of `at` strictly after `now`.
pub fn delay_until_next(now: NaiveDateTime, at: NaiveTime) -> Duration {
    let mut target = now.date().and_time(at);
    if target <= now {
        target += TimeDelta::days(1);
    }
    (target - now).to_std().unwrap_or(Duration::ZERO)
}

/// One armed periodic trigger.
#[derive(Debug)]
pub struct ScheduledJob {
    name: &'static str,
    schedule: Schedule,
    handle: JoinHandle<()>,
}

impl ScheduledJob {
    /// Spawn the job task. It sends `event` at every firing until it is
    /// cancelled or the runtime goes away.
    pub fn spawn(
        name: &'static str,
        schedule: Schedule,
        event: RuntimeEvent,
        events_tx: mpsc::UnboundedSender<RuntimeEvent>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                let delay = schedule.delay_from(Local::now().naive_local());
                debug!(job = name, delay_secs = delay.as_secs(), "job sleeping");
                tokio::time::sleep(delay).await;

                debug!(job = name, "job fired");
                if events_tx.send(event.clone()).is_err() {
                    debug!(job = name, "runtime gone; job ending");
                    break;
                }
            }
        });

        Self {
            name,
            schedule,
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// Stop future firings. An event already sent stays in the channel.
    pub fn cancel(self) {
        self.handle.abort();
        debug!(job = self.name, "job cancelled");
    }
}

/// Owner of the flush and rescan jobs while the watcher is running.
#[derive(Debug, Default)]
pub struct Scheduler {
    jobs: Vec<ScheduledJob>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the flush job and the daily rescan job. Any jobs still armed are
    /// cancelled first, so there are never more than two.
    pub fn arm(&mut self, config: &ScheduleConfig, events_tx: mpsc::UnboundedSender<RuntimeEvent>) {
        self.cancel_all();

        self.jobs.push(ScheduledJob::spawn(
            "flush",
            Schedule::Every(config.flush_interval),
            RuntimeEvent::FlushDue,
            events_tx.clone(),
        ));
        self.jobs.push(ScheduledJob::spawn(
            "rescan",
            Schedule::DailyAt(config.rescan_at),
            RuntimeEvent::RescanDue {
                reason: RescanReason::Scheduled,
            },
            events_tx,
        ));

        info!(
            flush_every_ms = config.flush_interval.as_millis() as u64,
            rescan_at = %config.rescan_at,
            "scheduled jobs armed"
        );
    }

    pub fn cancel_all(&mut self) {
        for job in self.jobs.drain(..) {
            job.cancel();
        }
    }

    pub fn is_armed(&self) -> bool {
        !self.jobs.is_empty()
    }

    pub fn jobs(&self) -> &[ScheduledJob] {
        &self.jobs
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(h, m, s))
            .unwrap()
    }

    fn time(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn daily_time_later_today() {
        assert_eq!(
            delay_until_next(at(1, 30, 0), time(4, 0, 0)),
            Duration::from_secs(2 * 3600 + 30 * 60)
        );
    }

    #[test]
    fn daily_time_already_passed_rolls_to_tomorrow() {
        assert_eq!(
            delay_until_next(at(5, 0, 0), time(4, 0, 0)),
            Duration::from_secs(23 * 3600)
        );
    }

    #[test]
    fn firing_exactly_now_waits_a_full_day() {
        assert_eq!(
            delay_until_next(at(4, 0, 0), time(4, 0, 0)),
            Duration::from_secs(24 * 3600)
        );
    }

    #[test]
    fn fixed_period_ignores_clock() {
        let schedule = Schedule::Every(Duration::from_secs(60));
        assert_eq!(schedule.delay_from(at(23, 59, 59)), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn flush_job_fires_every_period_until_cancelled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let job = ScheduledJob::spawn(
            "flush",
            Schedule::Every(Duration::from_secs(60)),
            RuntimeEvent::FlushDue,
            tx,
        );

        assert_eq!(rx.recv().await, Some(RuntimeEvent::FlushDue));
        assert_eq!(rx.recv().await, Some(RuntimeEvent::FlushDue));

        job.cancel();
        // The aborted task drops its sender, closing the channel.
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn arm_creates_two_jobs_and_cancel_all_clears_them() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut scheduler = Scheduler::new();

        scheduler.arm(&ScheduleConfig::default(), tx.clone());
        scheduler.arm(&ScheduleConfig::default(), tx);
        let names: Vec<_> = scheduler.jobs().iter().map(ScheduledJob::name).collect();
        assert_eq!(names, vec!["flush", "rescan"]);
        let schedules: Vec<_> = scheduler.jobs().iter().map(ScheduledJob::schedule).collect();
        assert_eq!(
            schedules,
            vec![
                Schedule::Every(Duration::from_secs(60)),
                Schedule::DailyAt(time(4, 0, 0)),
            ]
        );

        scheduler.cancel_all();
        assert!(!scheduler.is_armed());
    }
}
