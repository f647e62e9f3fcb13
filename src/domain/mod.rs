pub mod announcement;
pub mod audit;
pub mod birthday;
pub mod calendar;
pub mod profile;
pub mod reservation;
pub mod tool;

pub use announcement::{
    Announcement, AnnouncementDraft, AnnouncementUpdate, PollKind, PollOption, PopupMode,
    TemplateKind,
};
pub use audit::{AuditAction, AuditEntry, AuditLog, AuditLogFilters, EntityType};
pub use birthday::Birthday;
pub use calendar::{CalendarEvent, EventDraft, EventUpdate};
pub use profile::{ProfileCompletion, ProfileUpdate, RequiredField, UserProfile};
pub use reservation::{CalendarEntry, UserReservation};
pub use tool::{Favorite, RecentAccess, Tool, ToolDraft, ToolStatus, ToolUpdate};
