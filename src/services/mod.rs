//! Remote data services, one per hub resource.
//!
//! Every service follows the same contract: `mount`/`refresh` read from the
//! remote store under the service's loading key and replace the cached value;
//! mutations write, re-fetch, then toast the outcome; `unmount` closes the
//! resource so late results are discarded.

pub mod announcements;
pub mod audit_logs;
pub mod birthdays;
pub mod calendar;
pub mod live;
pub mod profile;
pub mod reservations;
pub mod tools;

pub use announcements::AnnouncementsService;
pub use audit_logs::AuditLogsService;
pub use birthdays::BirthdaysService;
pub use calendar::CalendarEventsService;
pub use live::UserBinding;
pub use profile::{ProfileCompletionService, ProfileService};
pub use reservations::ReservationsService;
pub use tools::ToolsService;

use crate::errors::Result;
use crate::notifications::{Toast, Toaster};
use parking_lot::RwLock;
use std::sync::Arc;

/// Loading keys, one per service
pub mod keys {
    pub const TOOLS: &str = "tools";
    pub const ANNOUNCEMENTS: &str = "announcements";
    pub const CALENDAR_EVENTS: &str = "calendar_events";
    pub const BIRTHDAYS: &str = "birthdays";
    pub const RESERVATIONS: &str = "reservations";
    pub const AUDIT_LOGS: &str = "audit_logs";
    pub const PROFILE: &str = "profile";
    pub const PROFILE_COMPLETION: &str = "profile_completion";
}

struct ResourceState<T> {
    value: T,
    open: bool,
}

/// Cached value of a mounted service.
///
/// Once closed, `replace` is a no-op so fetches finishing after unmount do
/// not resurrect state.
pub struct Resource<T> {
    state: Arc<RwLock<ResourceState<T>>>,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: Clone + Default> Default for Resource<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone> Resource<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: Arc::new(RwLock::new(ResourceState { value, open: true })),
        }
    }

    pub fn get(&self) -> T {
        self.state.read().value.clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.state.read().value)
    }

    /// Store `value` unless the resource was closed. Returns whether it was stored.
    pub fn replace(&self, value: T) -> bool {
        let mut state = self.state.write();
        if !state.open {
            return false;
        }
        state.value = value;
        true
    }

    pub fn is_open(&self) -> bool {
        self.state.read().open
    }

    pub fn close(&self) {
        self.state.write().open = false;
    }
}

/// Toast the outcome of a mutation and hand the result back
pub(crate) fn report<T>(
    toaster: &dyn Toaster,
    outcome: Result<T>,
    success: &str,
    failure: &str,
) -> Result<T> {
    match outcome {
        Ok(value) => {
            toaster.show(Toast::success(success));
            Ok(value)
        }
        Err(e) => {
            tracing::error!("{}: {}", failure, e);
            toaster.show(Toast::error(failure).with_description(e.user_message()));
            Err(e)
        }
    }
}
