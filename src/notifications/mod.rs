pub mod scheduler;
pub mod toast;

pub use scheduler::{Meeting, MeetingNotifier, SchedulerHandle, SchedulerSettings};
pub use toast::{
    NotificationPermission, Notifier, OsNotification, Toast, ToastKind, Toaster,
    TracingNotifier, TracingToaster, UnsupportedNotifier,
};
