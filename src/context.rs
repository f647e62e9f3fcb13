//! Shared collaborators of one hub instance.
//!
//! A HubContext is built once (by the daemon or by tests) and passed down to
//! every service. Cloning is cheap; clones share the same stores, session and
//! loading registry.

use crate::db::schema::RESERVATIONS;
use crate::db::{ChangeFeed, RemoteStore};
use crate::loading::LoadingRegistry;
use crate::local::{namespaced_key, KeyValueStore};
use crate::notifications::{
    MeetingNotifier, Notifier, SchedulerHandle, SchedulerSettings, Toaster, TracingNotifier,
    TracingToaster,
};
use crate::services::{
    AnnouncementsService, AuditLogsService, BirthdaysService, CalendarEventsService,
    ProfileCompletionService, ProfileService, ReservationsService, ToolsService, UserBinding,
};
use std::sync::Arc;

pub const DEFAULT_KEY_PREFIX: &str = "hub";

#[derive(Clone)]
pub struct HubContext {
    pub remote: Arc<dyn RemoteStore>,
    pub feed: ChangeFeed,
    pub local: Arc<dyn KeyValueStore>,
    pub session: crate::session::Session,
    pub loading: LoadingRegistry,
    pub toaster: Arc<dyn Toaster>,
    pub notifier: Arc<dyn Notifier>,
    pub scheduler: SchedulerSettings,
    key_prefix: String,
}

impl HubContext {
    /// Context with log-backed toasts and notifications
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        feed: ChangeFeed,
        local: Arc<dyn KeyValueStore>,
        session: crate::session::Session,
    ) -> Self {
        Self {
            remote,
            feed,
            local,
            session,
            loading: LoadingRegistry::new(),
            toaster: Arc::new(TracingToaster),
            notifier: Arc::new(TracingNotifier),
            scheduler: SchedulerSettings::default(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    pub fn with_toaster(mut self, toaster: Arc<dyn Toaster>) -> Self {
        self.toaster = toaster;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_scheduler_settings(mut self, settings: SchedulerSettings) -> Self {
        self.scheduler = settings;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Local store key under this hub's prefix
    pub fn local_key(&self, name: &str) -> String {
        namespaced_key(&self.key_prefix, name)
    }

    // ========================================================================
    // Services
    // ========================================================================

    pub fn tools(&self) -> ToolsService {
        ToolsService::new(self)
    }

    pub fn announcements(&self) -> AnnouncementsService {
        AnnouncementsService::new(self)
    }

    pub fn calendar_events(&self) -> CalendarEventsService {
        CalendarEventsService::new(self)
    }

    pub fn birthdays(&self) -> BirthdaysService {
        BirthdaysService::new(self)
    }

    pub fn reservations(&self) -> ReservationsService {
        ReservationsService::new(self)
    }

    pub fn audit_logs(&self) -> AuditLogsService {
        AuditLogsService::new(self)
    }

    pub fn profile(&self) -> ProfileService {
        ProfileService::new(self)
    }

    pub fn profile_completion(&self) -> ProfileCompletionService {
        ProfileCompletionService::new(self)
    }

    pub fn meeting_notifier(&self) -> MeetingNotifier {
        MeetingNotifier::new(
            self.toaster.clone(),
            self.notifier.clone(),
            self.scheduler.clone(),
        )
    }
}

impl HubContext {
    /// Mount the session-bound services and start meeting notifications.
    ///
    /// Reservations are re-read whenever the user's `reservas` rows change
    /// and the notifier is fed the fresh list.
    pub async fn start(&self) -> RunningHub {
        let profile = self.profile();
        let completion = self.profile_completion();
        let reservations = self.reservations();
        let notifier = self.meeting_notifier();

        profile.mount().await;
        completion.mount().await;
        reservations.mount().await;
        notifier.set_meetings(reservations.meetings());

        let reservations_binding = {
            let reservations = reservations.clone();
            let notifier = notifier.clone();
            UserBinding::bind(&self.session, &self.feed, RESERVATIONS, "user_id", move || {
                let reservations = reservations.clone();
                let notifier = notifier.clone();
                async move {
                    reservations.refresh().await;
                    notifier.set_meetings(reservations.meetings());
                }
            })
        };

        let scheduler = notifier.start();
        tracing::info!(
            "Hub started ({} upcoming reservations)",
            reservations.reservations().len()
        );

        RunningHub {
            profile,
            completion,
            reservations,
            notifier,
            reservations_binding,
            scheduler,
        }
    }
}

/// Services and timers owned by a started hub
pub struct RunningHub {
    pub profile: ProfileService,
    pub completion: ProfileCompletionService,
    pub reservations: ReservationsService,
    pub notifier: MeetingNotifier,
    reservations_binding: UserBinding,
    scheduler: SchedulerHandle,
}

impl RunningHub {
    /// Stop timers, drop subscriptions and close every mounted resource
    pub fn shutdown(self) {
        let RunningHub {
            profile,
            completion,
            reservations,
            reservations_binding,
            scheduler,
            ..
        } = self;

        scheduler.stop();
        drop(reservations_binding);
        profile.unmount();
        completion.unmount();
        reservations.unmount();
        tracing::info!("Hub stopped");
    }
}
