use tracing::{debug, warn};

use crate::calendar::Calendar;
use crate::segment::{SegmentDescriptor, SegmentType};

/// One link of a flattened chain together with its depth (root = 0).
#[derive(Debug, Clone, Copy)]
pub struct CalendarEntity<'a> {
    pub depth: usize,
    pub calendar: &'a Calendar,
}

/// List the links of `chain` root first.
pub fn flatten(chain: &Calendar) -> Vec<CalendarEntity<'_>> {
    chain
        .iter()
        .enumerate()
        .map(|(depth, calendar)| CalendarEntity { depth, calendar })
        .collect()
}

/// Assemble a chain from `descriptors`, in order.
///
/// A `custom` segment at depth `i` reuses the link found at depth `i` of
/// `existing`; the walk over `existing` advances one link per descriptor
/// whether or not it was used, so matching is by depth only.
///
/// Returns `None` for an empty list, for a `custom` segment with nothing to
/// reuse, or when a descriptor cannot be constructed.
pub fn build(descriptors: &[SegmentDescriptor], existing: Option<&Calendar>) -> Option<Calendar> {
    let mut root: Option<Box<Calendar>> = None;
    let mut tail = &mut root;
    let mut cursor = existing;

    for (index, descriptor) in descriptors.iter().enumerate() {
        let link = if descriptor.segment_type == SegmentType::Custom {
            match cursor {
                Some(stored) => {
                    debug!(segment = index, kind = %stored.kind().type_name(), "reusing stored link");
                    stored.detached()
                }
                None => {
                    warn!(segment = index, "custom segment has no stored link to reuse");
                    return None;
                }
            }
        } else {
            match descriptor.to_calendar() {
                Ok(calendar) => calendar,
                Err(reason) => {
                    warn!(segment = index, %reason, "cannot construct segment");
                    return None;
                }
            }
        };

        // Append at the tail only; earlier links are never revisited.
        tail = tail.insert(Box::new(link)).base_slot();
        cursor = cursor.and_then(Calendar::base);
    }

    root.map(|link| *link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{CalendarKind, CustomCalendar, OpaqueCalendar};
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Everything;

    impl CustomCalendar for Everything {
        fn type_name(&self) -> &str {
            "everything"
        }

        fn is_time_included(&self, _at: DateTime<Utc>) -> bool {
            true
        }
    }

    fn holiday(name: &str, date: &str) -> SegmentDescriptor {
        SegmentDescriptor {
            name: name.to_string(),
            dates: vec![date.to_string()],
            ..SegmentDescriptor::new(SegmentType::Holiday)
        }
    }

    fn custom() -> SegmentDescriptor {
        SegmentDescriptor::new(SegmentType::Custom)
    }

    fn opaque_link(description: &str) -> (Calendar, OpaqueCalendar) {
        let handle = OpaqueCalendar::new(Arc::new(Everything));
        (
            Calendar::new(CalendarKind::Opaque(handle.clone())).with_description(description),
            handle,
        )
    }

    #[test]
    fn empty_list_builds_nothing() {
        assert!(build(&[], None).is_none());
    }

    #[test]
    fn links_follow_descriptor_order() {
        let chain = build(
            &[holiday("a", "2024-01-01"), holiday("b", "2024-01-02"), holiday("c", "2024-01-03")],
            None,
        )
        .unwrap();

        let names: Vec<_> = flatten(&chain)
            .iter()
            .map(|e| (e.depth, e.calendar.description()))
            .collect();
        assert_eq!(names, vec![(0, "a"), (1, "b"), (2, "c")]);
    }

    #[test]
    fn custom_without_existing_chain_fails() {
        assert!(build(&[holiday("a", "2024-01-01"), custom()], None).is_none());
    }

    #[test]
    fn custom_deeper_than_existing_chain_fails() {
        let (stored, _) = opaque_link("legacy");
        assert!(build(&[custom(), custom()], Some(&stored)).is_none());
    }

    #[test]
    fn unconstructible_segment_fails_whole_build() {
        let broken = SegmentDescriptor::new(SegmentType::Cron);
        assert!(build(&[holiday("a", "2024-01-01"), broken], None).is_none());
    }

    #[test]
    fn custom_reuses_link_at_same_depth() {
        let (deep, handle) = opaque_link("legacy");
        let stored = build(&[holiday("root", "2024-01-01")], None)
            .unwrap()
            .with_base(deep);

        // Root is re-edited, depth 1 stays custom, a new leaf is appended.
        let chain = build(
            &[holiday("root", "2025-01-01"), custom(), holiday("leaf", "2025-12-25")],
            Some(&stored),
        )
        .unwrap();

        assert_eq!(chain.depth(), 3);
        let links = flatten(&chain);
        match links[1].calendar.kind() {
            CalendarKind::Opaque(reused) => assert!(reused.ptr_eq(&handle)),
            other => panic!("expected opaque link, got {other:?}"),
        }
        assert_eq!(links[1].calendar.description(), "legacy");
        assert_eq!(links[2].calendar.description(), "leaf");
    }

    #[test]
    fn reordering_changes_which_link_is_reused() {
        let (first, first_handle) = opaque_link("first");
        let (second, second_handle) = opaque_link("second");
        let stored = first.with_base(second);

        // A known segment now occupies depth 0, so the custom slot at depth 1
        // picks up the second stored link, not the first.
        let chain = build(&[holiday("root", "2024-01-01"), custom()], Some(&stored)).unwrap();
        match flatten(&chain)[1].calendar.kind() {
            CalendarKind::Opaque(h) => {
                assert!(h.ptr_eq(&second_handle));
                assert!(!h.ptr_eq(&first_handle));
            }
            other => panic!("expected opaque link, got {other:?}"),
        }
    }
}
