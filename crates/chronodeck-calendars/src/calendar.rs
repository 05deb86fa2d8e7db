use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

/// A calendar implementation registered outside the editor's known kinds.
///
/// The editor never inspects or rebuilds these; it only carries the handle
/// forward from whatever the store returned.
pub trait CustomCalendar: fmt::Debug + Send + Sync {
    /// Name the implementation is registered under.
    fn type_name(&self) -> &str;

    /// Whether `at` is a valid fire time according to this calendar alone.
    fn is_time_included(&self, at: DateTime<Utc>) -> bool;
}

/// Shared handle to a [`CustomCalendar`]. Equality is pointer identity.
#[derive(Debug, Clone)]
pub struct OpaqueCalendar(Arc<dyn CustomCalendar>);

impl OpaqueCalendar {
    pub fn new(inner: Arc<dyn CustomCalendar>) -> Self {
        Self(inner)
    }

    pub fn inner(&self) -> &Arc<dyn CustomCalendar> {
        &self.0
    }

    /// True when both handles point at the same implementation instance.
    pub fn ptr_eq(&self, other: &OpaqueCalendar) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for OpaqueCalendar {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// Excludes every instant matched by a cron expression.
#[derive(Debug, Clone)]
pub struct CronCalendar {
    /// Expression as entered, kept for editing.
    expression: String,
    schedule: cron::Schedule,
}

impl CronCalendar {
    pub fn new(expression: impl Into<String>, schedule: cron::Schedule) -> Self {
        Self {
            expression: expression.into(),
            schedule,
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }
}

impl PartialEq for CronCalendar {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

/// Excludes a time-of-day range on every day, or everything outside it when
/// `invert` is set. Both ends are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyCalendar {
    pub starting_time: NaiveTime,
    pub ending_time: NaiveTime,
    pub invert: bool,
}

/// Excludes whole weekdays. Index 0 is Monday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyCalendar {
    pub excluded: [bool; 7],
}

/// Excludes days of the month. Index 0 is the 1st.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyCalendar {
    pub excluded: [bool; 31],
}

/// A month/day pair with no year attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

/// Excludes the same dates every year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnualCalendar {
    pub excluded: BTreeSet<MonthDay>,
}

/// Excludes specific calendar dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolidayCalendar {
    pub excluded: BTreeSet<NaiveDate>,
}

/// Concrete kind of a chain link.
#[derive(Debug, Clone, PartialEq)]
pub enum CalendarKind {
    Cron(CronCalendar),
    Daily(DailyCalendar),
    Weekly(WeeklyCalendar),
    Monthly(MonthlyCalendar),
    Annual(AnnualCalendar),
    Holiday(HolidayCalendar),
    Opaque(OpaqueCalendar),
}

impl CalendarKind {
    /// Discriminator shown in listings. Opaque kinds report their registered name.
    pub fn type_name(&self) -> &str {
        match self {
            CalendarKind::Cron(_) => "cron",
            CalendarKind::Daily(_) => "daily",
            CalendarKind::Weekly(_) => "weekly",
            CalendarKind::Monthly(_) => "monthly",
            CalendarKind::Annual(_) => "annual",
            CalendarKind::Holiday(_) => "holiday",
            CalendarKind::Opaque(opaque) => opaque.inner().type_name(),
        }
    }
}

/// One link of a calendar chain.
///
/// A link owns its `base`, so a chain is a singly linked list that cannot
/// contain a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Calendar {
    description: String,
    time_zone: Option<Tz>,
    kind: CalendarKind,
    base: Option<Box<Calendar>>,
}

impl Calendar {
    pub fn new(kind: CalendarKind) -> Self {
        Self {
            description: String::new(),
            time_zone: None,
            kind,
            base: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_time_zone(mut self, time_zone: Option<Tz>) -> Self {
        self.time_zone = time_zone;
        self
    }

    pub fn with_base(mut self, base: Calendar) -> Self {
        self.base = Some(Box::new(base));
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Zone local rules are evaluated in; `None` means UTC.
    pub fn time_zone(&self) -> Option<Tz> {
        self.time_zone
    }

    pub fn kind(&self) -> &CalendarKind {
        &self.kind
    }

    pub fn base(&self) -> Option<&Calendar> {
        self.base.as_deref()
    }

    pub(crate) fn base_slot(&mut self) -> &mut Option<Box<Calendar>> {
        &mut self.base
    }

    /// Copy of this link without its base. Opaque handles are shared, not cloned.
    pub fn detached(&self) -> Calendar {
        Calendar {
            description: self.description.clone(),
            time_zone: self.time_zone,
            kind: self.kind.clone(),
            base: None,
        }
    }

    /// Walks the chain from this link to the leaf.
    pub fn iter(&self) -> ChainIter<'_> {
        ChainIter { next: Some(self) }
    }

    /// Number of links from this one to the leaf, inclusive.
    pub fn depth(&self) -> usize {
        self.iter().count()
    }

    /// Whether `at` is allowed by this link and every link below it.
    pub fn is_time_included(&self, at: DateTime<Utc>) -> bool {
        self.iter().all(|link| link.includes_locally(at))
    }

    fn includes_locally(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.time_zone.unwrap_or(Tz::UTC));
        match &self.kind {
            CalendarKind::Cron(cal) => !cal.schedule.includes(local),
            CalendarKind::Daily(cal) => {
                let t = local.time();
                let in_range = cal.starting_time <= t && t <= cal.ending_time;
                in_range == cal.invert
            }
            CalendarKind::Weekly(cal) => {
                !cal.excluded[local.weekday().num_days_from_monday() as usize]
            }
            CalendarKind::Monthly(cal) => !cal.excluded[local.day0() as usize],
            CalendarKind::Annual(cal) => !cal.excluded.contains(&MonthDay {
                month: local.month(),
                day: local.day(),
            }),
            CalendarKind::Holiday(cal) => !cal.excluded.contains(&local.date_naive()),
            CalendarKind::Opaque(opaque) => opaque.inner().is_time_included(at),
        }
    }
}

/// Root-to-leaf iterator over a chain.
pub struct ChainIter<'a> {
    next: Option<&'a Calendar>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = &'a Calendar;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.base();
        Some(current)
    }
}
