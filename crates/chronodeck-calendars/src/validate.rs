use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::segment::{
    parse_annual_date, parse_cron, parse_holiday_date, parse_month_day_number, parse_time,
    parse_time_zone, parse_weekday, SegmentDescriptor, SegmentType,
};

/// One problem with one field of one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
    /// Chain position of the offending segment.
    pub segment_index: usize,
}

impl ValidationError {
    pub fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
            segment_index: 0,
        }
    }

    pub fn empty_field(field: &str) -> Self {
        Self::new(field, "Field is required.")
    }

    pub fn at(mut self, segment_index: usize) -> Self {
        self.segment_index = segment_index;
        self
    }
}

/// Every error found in a chain, in discovery order.
///
/// Serialises as `{ "success": bool, "errors": [...] }`; `success` is
/// derived from `errors` and ignored when reading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Serialize for ValidationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ValidationResult", 2)?;
        state.serialize_field("success", &self.success())?;
        state.serialize_field("errors", &self.errors)?;
        state.end()
    }
}

/// Declared upper bound on a free-text field.
struct FieldLimit {
    field: &'static str,
    max_chars: usize,
    value: fn(&SegmentDescriptor) -> &str,
}

fn name_of(d: &SegmentDescriptor) -> &str {
    &d.name
}
fn time_zone_of(d: &SegmentDescriptor) -> &str {
    &d.time_zone
}
fn cron_expression_of(d: &SegmentDescriptor) -> &str {
    &d.cron_expression
}

const FIELD_LIMITS: &[FieldLimit] = &[
    FieldLimit {
        field: "name",
        max_chars: 200,
        value: name_of,
    },
    FieldLimit {
        field: "time_zone",
        max_chars: 64,
        value: time_zone_of,
    },
    FieldLimit {
        field: "cron_expression",
        max_chars: 512,
        value: cron_expression_of,
    },
];

/// Validate a whole chain.
///
/// The root-name check runs once, before any per-segment check. Nothing
/// short-circuits: every segment and every field is inspected.
pub fn validate_chain(descriptors: &[SegmentDescriptor]) -> ValidationResult {
    let mut result = ValidationResult::default();

    if descriptors.first().map_or(true, |root| root.name.trim().is_empty()) {
        result.errors.push(ValidationError::empty_field("name"));
    }

    for (index, descriptor) in descriptors.iter().enumerate() {
        validate(descriptor, &mut result.errors, index);
    }

    result
}

/// Validate one segment, appending every problem found to `errors` tagged
/// with `segment_index`.
pub fn validate(
    descriptor: &SegmentDescriptor,
    errors: &mut Vec<ValidationError>,
    segment_index: usize,
) {
    let start = errors.len();

    for limit in FIELD_LIMITS {
        let len = (limit.value)(descriptor).chars().count();
        if len > limit.max_chars {
            errors.push(ValidationError::new(
                limit.field,
                format!("Must be at most {} characters.", limit.max_chars),
            ));
        }
    }

    if descriptor.is_root != (segment_index == 0) {
        errors.push(ValidationError::new(
            "is_root",
            "Only the first segment may be the root.",
        ));
    }

    if descriptor.segment_type != SegmentType::Custom {
        if let Err(reason) = parse_time_zone(&descriptor.time_zone) {
            errors.push(ValidationError::new("time_zone", reason));
        }
    }

    match descriptor.segment_type {
        SegmentType::Cron => {
            if descriptor.cron_expression.trim().is_empty() {
                errors.push(ValidationError::empty_field("cron_expression"));
            } else if let Err(reason) = parse_cron(&descriptor.cron_expression) {
                errors.push(ValidationError::new("cron_expression", reason));
            }
        }
        SegmentType::Daily => validate_daily(descriptor, errors),
        SegmentType::Weekly => {
            validate_entries(&descriptor.days, "days", errors, parse_weekday);
            let distinct: std::collections::HashSet<_> = descriptor
                .days
                .iter()
                .filter_map(|d| parse_weekday(d).ok())
                .collect();
            if distinct.len() == 7 {
                errors.push(ValidationError::new(
                    "days",
                    "At least one day of the week must stay included.",
                ));
            }
        }
        SegmentType::Monthly => {
            validate_entries(&descriptor.days, "days", errors, parse_month_day_number);
            let distinct: std::collections::HashSet<_> = descriptor
                .days
                .iter()
                .filter_map(|d| parse_month_day_number(d).ok())
                .collect();
            if distinct.len() == 31 {
                errors.push(ValidationError::new(
                    "days",
                    "At least one day of the month must stay included.",
                ));
            }
        }
        SegmentType::Annual => validate_entries(&descriptor.dates, "dates", errors, parse_annual_date),
        SegmentType::Holiday => {
            validate_entries(&descriptor.dates, "dates", errors, parse_holiday_date)
        }
        SegmentType::Custom => {}
    }

    for error in &mut errors[start..] {
        error.segment_index = segment_index;
    }
}

fn validate_daily(descriptor: &SegmentDescriptor, errors: &mut Vec<ValidationError>) {
    let mut parse_field = |field: &str, value: &str| {
        if value.trim().is_empty() {
            errors.push(ValidationError::empty_field(field));
            return None;
        }
        parse_time(value)
            .map_err(|reason| errors.push(ValidationError::new(field, reason)))
            .ok()
    };

    let starting = parse_field("starting_time", &descriptor.starting_time);
    let ending = parse_field("ending_time", &descriptor.ending_time);

    if let (Some(starting), Some(ending)) = (starting, ending) {
        if starting >= ending {
            errors.push(ValidationError::new(
                "ending_time",
                "Ending time must be after starting time.",
            ));
        }
    }
}

/// Requires at least one entry and reports every entry that fails `parse`.
fn validate_entries<T>(
    entries: &[String],
    field: &str,
    errors: &mut Vec<ValidationError>,
    parse: fn(&str) -> std::result::Result<T, String>,
) {
    if entries.is_empty() {
        errors.push(ValidationError::empty_field(field));
        return;
    }
    for entry in entries {
        if let Err(reason) = parse(entry) {
            errors.push(ValidationError::new(field, reason));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(name: &str, segment_type: SegmentType) -> SegmentDescriptor {
        SegmentDescriptor {
            name: name.to_string(),
            is_root: true,
            ..SegmentDescriptor::new(segment_type)
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn valid_weekly_root_passes() {
        let mut d = root("Weekends", SegmentType::Weekly);
        d.days = strings(&["Sat", "Sun"]);
        assert!(validate_chain(&[d]).success());
    }

    #[test]
    fn empty_chain_reports_missing_name() {
        let result = validate_chain(&[]);
        assert_eq!(result.errors, vec![ValidationError::empty_field("name")]);
    }

    #[test]
    fn root_name_reported_once_even_if_other_segments_unnamed() {
        let mut first = root("", SegmentType::Weekly);
        first.days = strings(&["Mon"]);
        let mut second = SegmentDescriptor::new(SegmentType::Holiday);
        second.dates = strings(&["2024-12-25"]);

        let result = validate_chain(&[first, second]);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field, "name");
        assert_eq!(result.errors[0].segment_index, 0);
    }

    #[test]
    fn cron_requires_parseable_expression() {
        let mut errors = Vec::new();
        validate(&root("c", SegmentType::Cron), &mut errors, 0);
        assert_eq!(errors[0].field, "cron_expression");
        assert_eq!(errors[0].reason, "Field is required.");

        let mut bad = root("c", SegmentType::Cron);
        bad.cron_expression = "every tuesday".into();
        let mut errors = Vec::new();
        validate(&bad, &mut errors, 0);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].reason.contains("invalid cron expression"));
    }

    #[test]
    fn weekly_needs_a_day_and_not_all_of_them() {
        let mut errors = Vec::new();
        validate(&root("w", SegmentType::Weekly), &mut errors, 0);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "days");

        let mut all = root("w", SegmentType::Weekly);
        all.days = strings(&["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]);
        let mut errors = Vec::new();
        validate(&all, &mut errors, 0);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].reason.contains("must stay included"));
    }

    #[test]
    fn every_bad_entry_is_reported() {
        let mut d = root("h", SegmentType::Holiday);
        d.dates = strings(&["2024-12-25", "tomorrow", "2024-02-30"]);
        let mut errors = Vec::new();
        validate(&d, &mut errors, 0);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.field == "dates"));
    }

    #[test]
    fn daily_checks_both_times_and_order() {
        let mut errors = Vec::new();
        validate(&root("d", SegmentType::Daily), &mut errors, 0);
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["starting_time", "ending_time"]);

        let mut reversed = root("d", SegmentType::Daily);
        reversed.starting_time = "18:00".into();
        reversed.ending_time = "08:00".into();
        let mut errors = Vec::new();
        validate(&reversed, &mut errors, 0);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "ending_time");
    }

    #[test]
    fn unknown_time_zone_is_rejected_except_for_custom() {
        let mut d = root("m", SegmentType::Monthly);
        d.days = strings(&["1"]);
        d.time_zone = "Mars/Olympus_Mons".into();
        let mut errors = Vec::new();
        validate(&d, &mut errors, 0);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "time_zone");

        let mut custom = root("legacy", SegmentType::Custom);
        custom.time_zone = "Mars/Olympus_Mons".into();
        let mut errors = Vec::new();
        validate(&custom, &mut errors, 0);
        assert!(errors.is_empty());
    }

    #[test]
    fn declared_length_limits_apply() {
        let mut d = root(&"x".repeat(201), SegmentType::Custom);
        d.cron_expression = "y".repeat(513);
        let mut errors = Vec::new();
        validate(&d, &mut errors, 0);
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "cron_expression"]);
    }

    #[test]
    fn errors_are_tagged_with_their_segment() {
        let mut d = SegmentDescriptor::new(SegmentType::Annual);
        d.dates = strings(&["13-01"]);
        let mut errors = vec![ValidationError::empty_field("name")];
        validate(&d, &mut errors, 3);
        // pre-existing entries keep their index
        assert_eq!(errors[0].segment_index, 0);
        assert_eq!(errors[1].segment_index, 3);
    }

    #[test]
    fn misplaced_root_flag_is_reported() {
        let mut d = root("x", SegmentType::Monthly);
        d.days = strings(&["15"]);
        let mut errors = Vec::new();
        validate(&d, &mut errors, 2);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "is_root");
    }

    #[test]
    fn result_json_carries_success_flag() {
        let failed = validate_chain(&[]);
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({
                "success": false,
                "errors": [{ "field": "name", "reason": "Field is required.", "segment_index": 0 }],
            })
        );

        let mut d = root("Weekends", SegmentType::Weekly);
        d.days = strings(&["Sat", "Sun"]);
        let passed = validate_chain(&[d]);
        let json = serde_json::to_string(&passed).unwrap();
        assert_eq!(json, r#"{"success":true,"errors":[]}"#);
        let back: ValidationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, passed);
    }
}
