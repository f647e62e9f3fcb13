//! Upcoming-meeting notifications.
//!
//! Every poll the notifier looks for meetings starting within the lookahead
//! window and announces each one exactly once, with an in-app toast and, when
//! permitted, an OS notification tagged by meeting id. The "already notified"
//! set is cleared at local midnight.

use crate::config::NotificationConfig;
use crate::notifications::toast::{NotificationPermission, Notifier, OsNotification, Toast, Toaster};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// A meeting the user should be reminded of
#[derive(Debug, Clone, PartialEq)]
pub struct Meeting {
    pub id: String,
    pub room: String,
    pub date: NaiveDate,
    /// Time of day, `HH:MM` or `HH:MM:SS`
    pub start_time: String,
}

impl Meeting {
    /// Absolute local start, or None when the time string is unparsable
    pub fn starts_at(&self) -> Option<NaiveDateTime> {
        parse_time_of_day(&self.start_time).map(|time| self.date.and_time(time))
    }
}

pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub lookahead: Duration,
    pub poll_interval: std::time::Duration,
    pub icon: Option<String>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            lookahead: Duration::minutes(15),
            poll_interval: std::time::Duration::from_secs(60),
            icon: None,
        }
    }
}

impl From<&NotificationConfig> for SchedulerSettings {
    fn from(config: &NotificationConfig) -> Self {
        Self {
            lookahead: Duration::minutes(config.lookahead_minutes),
            poll_interval: std::time::Duration::from_secs(config.poll_interval_seconds),
            icon: Some(config.icon.clone()).filter(|icon| !icon.is_empty()),
        }
    }
}

struct NotifierState {
    meetings: Mutex<Vec<Meeting>>,
    notified: Mutex<HashSet<String>>,
    permission: Mutex<NotificationPermission>,
    toaster: Arc<dyn Toaster>,
    notifier: Arc<dyn Notifier>,
    settings: SchedulerSettings,
}

#[derive(Clone)]
pub struct MeetingNotifier {
    state: Arc<NotifierState>,
}

impl MeetingNotifier {
    pub fn new(
        toaster: Arc<dyn Toaster>,
        notifier: Arc<dyn Notifier>,
        settings: SchedulerSettings,
    ) -> Self {
        let permission = notifier.permission();
        Self {
            state: Arc::new(NotifierState {
                meetings: Mutex::new(Vec::new()),
                notified: Mutex::new(HashSet::new()),
                permission: Mutex::new(permission),
                toaster,
                notifier,
                settings,
            }),
        }
    }

    /// Replace the watched meetings; already-notified ids stay notified
    pub fn set_meetings(&self, meetings: Vec<Meeting>) {
        tracing::debug!("Watching {} upcoming meetings", meetings.len());
        *self.state.meetings.lock() = meetings;
    }

    pub fn permission(&self) -> NotificationPermission {
        *self.state.permission.lock()
    }

    /// Ask for OS notification permission if it was never decided
    pub async fn ensure_permission(&self) -> NotificationPermission {
        let current = self.permission();
        if current != NotificationPermission::Default {
            return current;
        }

        let answer = self.state.notifier.request_permission().await;
        tracing::info!("Notification permission: {:?}", answer);
        *self.state.permission.lock() = answer;
        answer
    }

    pub fn notified_ids(&self) -> HashSet<String> {
        self.state.notified.lock().clone()
    }

    /// Forget which meetings were announced
    pub fn reset(&self) {
        let cleared = {
            let mut notified = self.state.notified.lock();
            let count = notified.len();
            notified.clear();
            count
        };
        tracing::debug!("Cleared {} notified meetings", cleared);
    }

    pub fn check_now(&self) -> usize {
        self.check_at(Local::now().naive_local())
    }

    /// Announce meetings starting in `(0, lookahead]` from `now`.
    /// Returns how many were announced.
    pub fn check_at(&self, now: NaiveDateTime) -> usize {
        let due: Vec<(Meeting, Duration)> = {
            let meetings = self.state.meetings.lock();
            let mut notified = self.state.notified.lock();

            meetings
                .iter()
                .filter_map(|meeting| {
                    if notified.contains(&meeting.id) {
                        return None;
                    }
                    let Some(start) = meeting.starts_at() else {
                        tracing::warn!(
                            "Meeting {} has an invalid start time {:?}",
                            meeting.id,
                            meeting.start_time
                        );
                        return None;
                    };
                    let until = start - now;
                    if until > Duration::zero() && until <= self.state.settings.lookahead {
                        notified.insert(meeting.id.clone());
                        Some((meeting.clone(), until))
                    } else {
                        None
                    }
                })
                .collect()
        };

        for (meeting, until) in &due {
            self.announce(meeting, *until);
        }
        due.len()
    }

    fn announce(&self, meeting: &Meeting, until: Duration) {
        let minutes = (until.num_seconds() + 59) / 60;
        let start = parse_time_of_day(&meeting.start_time)
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_else(|| meeting.start_time.clone());

        tracing::info!("Meeting {} in {} starts in {} min", meeting.id, meeting.room, minutes);

        self.state.toaster.show(
            Toast::info("Reunião em breve")
                .with_description(format!("{} às {} (em {} min)", meeting.room, start, minutes)),
        );

        if self.permission() != NotificationPermission::Granted {
            return;
        }

        let notification = OsNotification {
            title: format!("Reunião em {} minutos", minutes),
            body: format!("{} às {}", meeting.room, start),
            icon: self.state.settings.icon.clone(),
            tag: format!("meeting-{}", meeting.id),
        };
        if let Err(e) = self.state.notifier.show(&notification) {
            tracing::warn!("Failed to show notification for meeting {}: {}", meeting.id, e);
        }
    }

    /// Check now, then every poll interval; clear the notified set at each
    /// local midnight. Timers stop when the handle is dropped.
    pub fn start(&self) -> SchedulerHandle {
        let this = self.clone();
        let poll_interval = self.state.settings.poll_interval;

        let task = tokio::spawn(async move {
            this.ensure_permission().await;

            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let midnight = tokio::time::sleep(until_midnight(Local::now().naive_local()));
            tokio::pin!(midnight);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        this.check_now();
                    }
                    _ = &mut midnight => {
                        this.reset();
                        let next = until_midnight(Local::now().naive_local());
                        midnight.as_mut().reset(Instant::now() + next);
                    }
                }
            }
        });

        tracing::info!("Meeting notifier started (every {:?})", poll_interval);
        SchedulerHandle { task: Some(task) }
    }
}

/// Time left until the next local midnight
pub fn until_midnight(now: NaiveDateTime) -> std::time::Duration {
    let next = now
        .date()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0));
    next.and_then(|next| (next - now).to_std().ok())
        .unwrap_or(std::time::Duration::from_secs(24 * 60 * 60))
}

/// Owns the notifier's timers
#[derive(Debug)]
pub struct SchedulerHandle {
    task: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn stop(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::info!("Meeting notifier stopped");
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{settle, RecordingNotifier, RecordingToaster};

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_time(parse_time_of_day(time).unwrap())
    }

    fn meeting(id: &str, date: &str, time: &str) -> Meeting {
        Meeting {
            id: id.to_string(),
            room: "Sala Azul".to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            start_time: time.to_string(),
        }
    }

    fn notifier_with(
        notifier: Arc<RecordingNotifier>,
    ) -> (MeetingNotifier, Arc<RecordingToaster>) {
        let toaster = Arc::new(RecordingToaster::new());
        let scheduler = MeetingNotifier::new(toaster.clone(), notifier, SchedulerSettings::default());
        (scheduler, toaster)
    }

    #[test]
    fn test_meeting_in_ten_minutes_notifies_once() {
        let os = Arc::new(RecordingNotifier::granted());
        let (scheduler, toaster) = notifier_with(os.clone());
        scheduler.set_meetings(vec![meeting("m1", "2024-05-10", "10:00")]);

        assert_eq!(scheduler.check_at(at("2024-05-10", "09:50")), 1);
        assert_eq!(toaster.toasts().len(), 1);
        assert_eq!(os.shown().len(), 1);
        assert_eq!(os.shown()[0].tag, "meeting-m1");
        assert_eq!(os.shown()[0].title, "Reunião em 10 minutos");

        assert_eq!(scheduler.check_at(at("2024-05-10", "09:50")), 0);
        assert_eq!(scheduler.check_at(at("2024-05-10", "09:55")), 0);
        assert_eq!(toaster.toasts().len(), 1);
        assert_eq!(os.shown().len(), 1);
    }

    #[test]
    fn test_reset_allows_notifying_again() {
        let os = Arc::new(RecordingNotifier::granted());
        let (scheduler, toaster) = notifier_with(os);
        scheduler.set_meetings(vec![meeting("m1", "2024-05-10", "10:00:00")]);

        scheduler.check_at(at("2024-05-10", "09:50"));
        scheduler.reset();
        assert!(scheduler.notified_ids().is_empty());

        assert_eq!(scheduler.check_at(at("2024-05-10", "09:52")), 1);
        assert_eq!(toaster.toasts().len(), 2);
    }

    #[test]
    fn test_window_is_half_open() {
        let os = Arc::new(RecordingNotifier::granted());
        let (scheduler, _toaster) = notifier_with(os);
        scheduler.set_meetings(vec![
            meeting("starts-now", "2024-05-10", "10:00"),
            meeting("too-far", "2024-05-10", "10:16"),
            meeting("edge", "2024-05-10", "10:15"),
            meeting("passed", "2024-05-10", "09:30"),
            meeting("broken", "2024-05-10", "soon"),
        ]);

        assert_eq!(scheduler.check_at(at("2024-05-10", "10:00")), 1);
        assert_eq!(
            scheduler.notified_ids(),
            HashSet::from(["edge".to_string()])
        );
    }

    #[test]
    fn test_passed_meetings_are_never_notified_retroactively() {
        let os = Arc::new(RecordingNotifier::granted());
        let (scheduler, toaster) = notifier_with(os);
        scheduler.set_meetings(vec![meeting("m1", "2024-05-10", "10:00")]);

        // Poller was asleep through the whole window
        assert_eq!(scheduler.check_at(at("2024-05-10", "10:01")), 0);
        assert!(toaster.toasts().is_empty());
    }

    #[test]
    fn test_denied_permission_still_toasts() {
        let os = Arc::new(RecordingNotifier::new(
            NotificationPermission::Denied,
            NotificationPermission::Denied,
        ));
        let (scheduler, toaster) = notifier_with(os.clone());
        scheduler.set_meetings(vec![meeting("m1", "2024-05-10", "10:00")]);

        scheduler.check_at(at("2024-05-10", "09:58"));
        assert_eq!(toaster.toasts().len(), 1);
        assert!(os.shown().is_empty());
    }

    #[test]
    fn test_until_midnight() {
        let left = until_midnight(at("2024-05-10", "23:30"));
        assert_eq!(left, std::time::Duration::from_secs(30 * 60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_requests_permission_once_and_polls() {
        let os = Arc::new(RecordingNotifier::new(
            NotificationPermission::Default,
            NotificationPermission::Granted,
        ));
        let (scheduler, toaster) = notifier_with(os.clone());

        let soon = Local::now().naive_local() + Duration::minutes(10);
        scheduler.set_meetings(vec![Meeting {
            id: "m1".to_string(),
            room: "Sala Azul".to_string(),
            date: soon.date(),
            start_time: soon.time().format("%H:%M:%S").to_string(),
        }]);

        let handle = scheduler.start();
        settle().await;
        assert_eq!(os.requests(), 1);
        assert_eq!(toaster.toasts().len(), 1);
        assert_eq!(os.shown().len(), 1);

        tokio::time::advance(std::time::Duration::from_secs(61)).await;
        settle().await;
        assert_eq!(os.requests(), 1);
        assert_eq!(toaster.toasts().len(), 1);

        handle.stop();
        settle().await;
    }
}
