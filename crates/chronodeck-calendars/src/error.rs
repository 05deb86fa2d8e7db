use thiserror::Error;

/// Operational failures of the calendar subsystem.
///
/// Bad user input is never reported here; it is collected into a
/// [`crate::validate::ValidationResult`] instead.
#[derive(Debug, Error)]
pub enum CalendarError {
    /// No calendar is stored under the given name.
    #[error("Calendar not found: {name}")]
    NotFound { name: String },

    /// `add_calendar` was called without `replace` for a name already in use.
    #[error("Calendar already exists: {name}")]
    AlreadyExists { name: String },

    /// The calendar is still referenced by triggers and cannot be removed.
    #[error("Calendar {name} is referenced by triggers: {}", .triggers.join(", "))]
    InUse { name: String, triggers: Vec<String> },

    /// The store refused to delete the calendar.
    #[error("Cannot delete calendar {name}")]
    DeleteFailed { name: String },

    /// Editor defaults could not be derived from configuration.
    #[error("Invalid editor configuration: {0}")]
    Config(String),

    /// Any other failure reported by the backing store.
    #[error("Calendar store error: {0}")]
    Store(String),

    /// The caller cancelled the operation before it completed.
    #[error("Operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, CalendarError>;
