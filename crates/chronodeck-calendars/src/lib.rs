//! `chronodeck-calendars` — editing exclusion-calendar chains.
//!
//! # Overview
//!
//! A scheduler calendar is a chain: each link excludes some instants and may
//! point at a base link that is consulted as well. The dashboard edits a
//! chain as an ordered list of [`SegmentDescriptor`]s, one per link.
//!
//! Saving runs [`CalendarService::commit`]: trailing blank form rows are
//! trimmed, every segment is validated (errors are collected, never
//! fail-fast), the chain is rebuilt with [`chain::build`] and the named
//! calendar is replaced in the [`CalendarStore`] with trigger recomputation.
//!
//! # Segment types
//!
//! | Type      | Excludes                                          |
//! |-----------|---------------------------------------------------|
//! | `cron`    | Instants matched by a cron expression             |
//! | `daily`   | A time-of-day range (or everything outside it)    |
//! | `weekly`  | Whole weekdays                                    |
//! | `monthly` | Days of the month                                 |
//! | `annual`  | The same `MM-DD` dates every year                 |
//! | `holiday` | Specific `YYYY-MM-DD` dates                       |
//! | `custom`  | Whatever the stored link at that depth excludes   |
//!
//! `custom` segments are never rebuilt: the link stored at the same depth
//! is carried over as-is, so calendar implementations registered outside
//! the dashboard survive an edit.

pub mod calendar;
pub mod chain;
pub mod error;
pub mod segment;
pub mod service;
pub mod store;
pub mod validate;

pub use calendar::{Calendar, CalendarKind, CustomCalendar, OpaqueCalendar};
pub use chain::{build, flatten, CalendarEntity};
pub use error::{CalendarError, Result};
pub use segment::{SegmentDescriptor, SegmentType};
pub use service::{CalendarListItem, CalendarService, ChainEdit, EditorDefaults};
pub use store::{CalendarStore, MemoryCalendarStore};
pub use validate::{validate, validate_chain, ValidationError, ValidationResult};
