use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime, Timelike, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::calendar::{
    AnnualCalendar, Calendar, CalendarKind, CronCalendar, DailyCalendar, HolidayCalendar,
    MonthDay, MonthlyCalendar, WeeklyCalendar,
};
use crate::chain::CalendarEntity;

/// Which concrete calendar a segment builds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    #[default]
    Cron,
    Daily,
    Weekly,
    Monthly,
    Annual,
    Holiday,
    /// Placeholder for a link the editor cannot build; reused from the stored chain.
    Custom,
}

impl std::fmt::Display for SegmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SegmentType::Cron => "cron",
            SegmentType::Daily => "daily",
            SegmentType::Weekly => "weekly",
            SegmentType::Monthly => "monthly",
            SegmentType::Annual => "annual",
            SegmentType::Holiday => "holiday",
            SegmentType::Custom => "custom",
        };
        write!(f, "{s}")
    }
}

impl FromStr for SegmentType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "cron" => Ok(SegmentType::Cron),
            "daily" => Ok(SegmentType::Daily),
            "weekly" => Ok(SegmentType::Weekly),
            "monthly" => Ok(SegmentType::Monthly),
            "annual" => Ok(SegmentType::Annual),
            "holiday" => Ok(SegmentType::Holiday),
            "custom" => Ok(SegmentType::Custom),
            other => Err(format!("unknown segment type: {other}")),
        }
    }
}

/// One link of a calendar chain as edited in the dashboard.
///
/// Only the fields relevant to `segment_type` are read; the rest stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentDescriptor {
    /// Store key on the root segment; the link description everywhere.
    pub name: String,
    pub is_root: bool,
    #[serde(rename = "type")]
    pub segment_type: SegmentType,
    /// IANA zone id. Empty means UTC.
    pub time_zone: String,
    pub cron_expression: String,
    pub starting_time: String,
    pub ending_time: String,
    pub invert_time_range: bool,
    /// Weekday names for `weekly`, day numbers for `monthly`.
    pub days: Vec<String>,
    /// `MM-DD` for `annual`, `YYYY-MM-DD` for `holiday`.
    pub dates: Vec<String>,
}

impl SegmentDescriptor {
    pub fn new(segment_type: SegmentType) -> Self {
        Self {
            segment_type,
            ..Default::default()
        }
    }

    /// Drop the blank rows the editing form leaves at the end of its lists.
    pub fn trim_trailing_empty(&mut self) {
        trim_trailing_empty(&mut self.days);
        trim_trailing_empty(&mut self.dates);
    }

    /// Map a flattened chain entry back to an editable descriptor.
    ///
    /// Known kinds come back in canonical form; opaque kinds become a
    /// `custom` placeholder carrying only the link description.
    pub fn from_entity(entity: &CalendarEntity<'_>) -> Self {
        let mut descriptor = Self::from_calendar(entity.calendar);
        descriptor.is_root = entity.depth == 0;
        descriptor
    }

    /// Map a single link (its base is ignored) to a descriptor with `is_root` unset.
    pub fn from_calendar(calendar: &Calendar) -> Self {
        let mut d = SegmentDescriptor {
            name: calendar.description().to_string(),
            time_zone: calendar
                .time_zone()
                .map(|tz| tz.name().to_string())
                .unwrap_or_default(),
            ..Default::default()
        };

        match calendar.kind() {
            CalendarKind::Cron(cal) => {
                d.segment_type = SegmentType::Cron;
                d.cron_expression = cal.expression().to_string();
            }
            CalendarKind::Daily(cal) => {
                d.segment_type = SegmentType::Daily;
                d.starting_time = format_time(cal.starting_time);
                d.ending_time = format_time(cal.ending_time);
                d.invert_time_range = cal.invert;
            }
            CalendarKind::Weekly(cal) => {
                d.segment_type = SegmentType::Weekly;
                d.days = WEEK
                    .iter()
                    .zip(cal.excluded)
                    .filter(|(_, excluded)| *excluded)
                    .map(|(day, _)| day.to_string())
                    .collect();
            }
            CalendarKind::Monthly(cal) => {
                d.segment_type = SegmentType::Monthly;
                d.days = (1..=31)
                    .zip(cal.excluded)
                    .filter(|(_, excluded)| *excluded)
                    .map(|(day, _)| day.to_string())
                    .collect();
            }
            CalendarKind::Annual(cal) => {
                d.segment_type = SegmentType::Annual;
                d.dates = cal
                    .excluded
                    .iter()
                    .map(|md| format!("{:02}-{:02}", md.month, md.day))
                    .collect();
            }
            CalendarKind::Holiday(cal) => {
                d.segment_type = SegmentType::Holiday;
                d.dates = cal
                    .excluded
                    .iter()
                    .map(|date| date.format("%Y-%m-%d").to_string())
                    .collect();
            }
            CalendarKind::Opaque(_) => {
                d.segment_type = SegmentType::Custom;
                d.time_zone.clear();
            }
        }
        d
    }

    /// Construct the concrete calendar this descriptor describes, without a base.
    ///
    /// `custom` segments cannot be constructed; the chain builder reuses the
    /// stored link for them instead.
    pub fn to_calendar(&self) -> std::result::Result<Calendar, String> {
        let kind = match self.segment_type {
            SegmentType::Cron => {
                let schedule = parse_cron(&self.cron_expression)?;
                CalendarKind::Cron(CronCalendar::new(self.cron_expression.clone(), schedule))
            }
            SegmentType::Daily => {
                let starting_time = parse_time(&self.starting_time)?;
                let ending_time = parse_time(&self.ending_time)?;
                if starting_time >= ending_time {
                    return Err("starting time must be before ending time".to_string());
                }
                CalendarKind::Daily(DailyCalendar {
                    starting_time,
                    ending_time,
                    invert: self.invert_time_range,
                })
            }
            SegmentType::Weekly => {
                let mut excluded = [false; 7];
                for day in &self.days {
                    excluded[parse_weekday(day)?.num_days_from_monday() as usize] = true;
                }
                CalendarKind::Weekly(WeeklyCalendar { excluded })
            }
            SegmentType::Monthly => {
                let mut excluded = [false; 31];
                for day in &self.days {
                    excluded[(parse_month_day_number(day)? - 1) as usize] = true;
                }
                CalendarKind::Monthly(MonthlyCalendar { excluded })
            }
            SegmentType::Annual => CalendarKind::Annual(AnnualCalendar {
                excluded: self
                    .dates
                    .iter()
                    .map(|s| parse_annual_date(s))
                    .collect::<std::result::Result<BTreeSet<_>, _>>()?,
            }),
            SegmentType::Holiday => CalendarKind::Holiday(HolidayCalendar {
                excluded: self
                    .dates
                    .iter()
                    .map(|s| parse_holiday_date(s))
                    .collect::<std::result::Result<BTreeSet<_>, _>>()?,
            }),
            SegmentType::Custom => {
                return Err("custom segments have no editable definition".to_string())
            }
        };

        Ok(Calendar::new(kind)
            .with_description(self.name.clone())
            .with_time_zone(parse_time_zone(&self.time_zone)?))
    }
}

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

fn trim_trailing_empty(list: &mut Vec<String>) {
    while list.last().is_some_and(|s| s.trim().is_empty()) {
        list.pop();
    }
}

fn format_time(t: NaiveTime) -> String {
    if t.second() == 0 && t.nanosecond() == 0 {
        t.format("%H:%M").to_string()
    } else {
        t.format("%H:%M:%S").to_string()
    }
}

// --- field parsers, shared by validation and construction -----------------

/// Parse a cron expression. Standard 5-field Unix expressions get a leading
/// seconds field and their day-of-week field translated; 6 and 7 field
/// expressions are used as-is.
pub(crate) fn parse_cron(expression: &str) -> std::result::Result<cron::Schedule, String> {
    let expression = expression.trim();
    let fields: Vec<&str> = expression.split_whitespace().collect();
    let normalized = if fields.len() == 5 {
        let day_of_week = unix_day_of_week(fields[4])
            .map_err(|e| format!("invalid cron expression: {e}"))?;
        format!("0 {} {day_of_week}", fields[..4].join(" "))
    } else {
        expression.to_string()
    };
    cron::Schedule::from_str(&normalized).map_err(|e| format!("invalid cron expression: {e}"))
}

/// Unix numbering: 0 and 7 are Sunday.
const UNIX_DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Rewrite numeric Unix day-of-week items (`0`-`7`, ranges, steps) as day
/// names, which the `cron` crate numbers differently. Named items pass
/// through untouched.
fn unix_day_of_week(field: &str) -> std::result::Result<String, String> {
    let mut items = Vec::new();
    for item in field.split(',') {
        if item == "*" || item == "?" || item.chars().any(|c| c.is_ascii_alphabetic()) {
            items.push(item.to_string());
            continue;
        }

        let (range, step) = match item.split_once('/') {
            Some((range, step)) => match step.parse::<usize>() {
                Ok(step) if step > 0 => (range, Some(step)),
                _ => return Err(format!("'{item}' has an invalid step")),
            },
            None => (item, None),
        };
        let number = |s: &str| match s.parse::<usize>() {
            Ok(n) if n <= 7 => Ok(n),
            _ => Err(format!("'{s}' is not a day of the week (0-7)")),
        };
        let (low, high) = match (range, range.split_once('-')) {
            ("*", _) => (0, 7),
            (_, Some((low, high))) => (number(low)?, number(high)?),
            (single, None) if step.is_some() => (number(single)?, 7),
            (single, None) => (number(single)?, number(single)?),
        };
        if low > high {
            return Err(format!("'{item}' is a descending range"));
        }

        let days: BTreeSet<usize> = (low..=high)
            .step_by(step.unwrap_or(1))
            .map(|n| n % 7)
            .collect();
        let names: Vec<&str> = days.into_iter().map(|n| UNIX_DAY_NAMES[n]).collect();
        items.push(names.join(","));
    }
    Ok(items.join(","))
}

/// `HH:MM` or `HH:MM:SS`.
pub(crate) fn parse_time(s: &str) -> std::result::Result<NaiveTime, String> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| format!("'{s}' is not a valid time (expected HH:MM or HH:MM:SS)"))
}

pub(crate) fn parse_weekday(s: &str) -> std::result::Result<Weekday, String> {
    s.trim()
        .parse::<Weekday>()
        .map_err(|_| format!("'{}' is not a weekday", s.trim()))
}

pub(crate) fn parse_month_day_number(s: &str) -> std::result::Result<u32, String> {
    match s.trim().parse::<u32>() {
        Ok(n) if (1..=31).contains(&n) => Ok(n),
        _ => Err(format!("'{}' is not a day of the month (1-31)", s.trim())),
    }
}

/// `MM-DD`. February 29th is accepted.
pub(crate) fn parse_annual_date(s: &str) -> std::result::Result<MonthDay, String> {
    let s = s.trim();
    // 2000 is a leap year, so every real month/day pair parses.
    NaiveDate::parse_from_str(&format!("2000-{s}"), "%Y-%m-%d")
        .map(|d| MonthDay {
            month: chrono::Datelike::month(&d),
            day: chrono::Datelike::day(&d),
        })
        .map_err(|_| format!("'{s}' is not a valid date (expected MM-DD)"))
}

/// `YYYY-MM-DD`.
pub(crate) fn parse_holiday_date(s: &str) -> std::result::Result<NaiveDate, String> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("'{s}' is not a valid date (expected YYYY-MM-DD)"))
}

/// Empty means UTC and yields `None`.
pub(crate) fn parse_time_zone(s: &str) -> std::result::Result<Option<Tz>, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    s.parse::<Tz>()
        .map(Some)
        .map_err(|_| format!("'{s}' is not a known time zone"))
}
