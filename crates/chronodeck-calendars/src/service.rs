use std::future::Future;

use chronodeck_core::config::EditorConfig;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::chain::{build, flatten};
use crate::error::{CalendarError, Result};
use crate::segment::{parse_time_zone, SegmentDescriptor, SegmentType};
use crate::store::CalendarStore;
use crate::validate::{validate_chain, ValidationError, ValidationResult};

/// Summary row for the calendar index page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarListItem {
    pub name: String,
    pub description: String,
    /// Kind of the root link; opaque kinds report their registered name.
    pub kind: String,
}

/// A chain as handed to and received from the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEdit {
    /// `true` when no calendar is stored under the root name yet.
    pub is_new: bool,
    pub segments: Vec<SegmentDescriptor>,
}

/// Validated editor defaults derived from [`EditorConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorDefaults {
    pub segment_type: SegmentType,
    pub time_zone: String,
}

impl EditorDefaults {
    pub fn from_config(config: &EditorConfig) -> Result<Self> {
        let segment_type: SegmentType = config
            .default_segment_type
            .parse()
            .map_err(CalendarError::Config)?;
        if segment_type == SegmentType::Custom {
            return Err(CalendarError::Config(
                "custom cannot be the default segment type".to_string(),
            ));
        }
        parse_time_zone(&config.default_time_zone).map_err(CalendarError::Config)?;

        Ok(Self {
            segment_type,
            time_zone: config.default_time_zone.clone(),
        })
    }

    /// A one-segment chain ready to be filled in.
    pub fn new_chain(&self) -> ChainEdit {
        ChainEdit {
            is_new: true,
            segments: vec![SegmentDescriptor {
                is_root: true,
                time_zone: self.time_zone.clone(),
                ..SegmentDescriptor::new(self.segment_type)
            }],
        }
    }
}

impl Default for EditorDefaults {
    fn default() -> Self {
        Self {
            segment_type: SegmentType::Cron,
            time_zone: chronodeck_core::config::DEFAULT_TIME_ZONE.to_string(),
        }
    }
}

/// Editing-form cleanup applied before validation: trailing blank rows are
/// dropped and `is_root` is aligned with position.
pub fn prepare_segments(segments: &mut [SegmentDescriptor]) {
    for (index, segment) in segments.iter_mut().enumerate() {
        segment.trim_trailing_empty();
        segment.is_root = index == 0;
    }
}

/// Calendar operations exposed to the dashboard.
///
/// Holds no per-request state; concurrent commits to the same name are
/// serialised only by the store (last writer wins).
pub struct CalendarService<S> {
    store: S,
    defaults: EditorDefaults,
}

impl<S: CalendarStore> CalendarService<S> {
    pub fn new(store: S, defaults: EditorDefaults) -> Self {
        Self { store, defaults }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Every stored calendar with the description and kind of its root link.
    pub async fn list(&self, cancel: &CancellationToken) -> Result<Vec<CalendarListItem>> {
        let names = cancellable(cancel, self.store.calendar_names()).await?;
        let mut items = Vec::with_capacity(names.len());
        for name in names {
            // A calendar deleted between the two calls is simply skipped.
            if let Some(calendar) = cancellable(cancel, self.store.get_calendar(&name)).await? {
                items.push(CalendarListItem {
                    description: calendar.description().to_string(),
                    kind: calendar.kind().type_name().to_string(),
                    name,
                });
            }
        }
        Ok(items)
    }

    pub fn new_chain(&self) -> ChainEdit {
        self.defaults.new_chain()
    }

    /// Fetch `name` and flatten it into editable segments.
    #[instrument(skip(self, cancel), fields(calendar = %name))]
    pub async fn load_for_edit(&self, name: &str, cancel: &CancellationToken) -> Result<ChainEdit> {
        let calendar = cancellable(cancel, self.store.get_calendar(name))
            .await?
            .ok_or_else(|| CalendarError::NotFound {
                name: name.to_string(),
            })?;

        let mut segments: Vec<SegmentDescriptor> = flatten(&calendar)
            .iter()
            .map(SegmentDescriptor::from_entity)
            .collect();
        if let Some(root) = segments.first_mut() {
            root.name = name.to_string();
        }

        Ok(ChainEdit {
            is_new: false,
            segments,
        })
    }

    /// Validate, rebuild and store a chain under its root segment's name.
    ///
    /// Bad input comes back as a failed [`ValidationResult`] and nothing is
    /// written. Store failures and cancellation are returned as `Err`.
    #[instrument(skip_all, fields(is_new = edit.is_new, segments = edit.segments.len()))]
    pub async fn commit(
        &self,
        edit: ChainEdit,
        cancel: &CancellationToken,
    ) -> Result<ValidationResult> {
        let ChainEdit {
            is_new,
            mut segments,
        } = edit;

        prepare_segments(&mut segments);

        let mut result = validate_chain(&segments);
        if !result.success() {
            info!(errors = result.errors.len(), "calendar chain rejected");
            return Ok(result);
        }

        // Validation guarantees a non-empty root name.
        let name = segments[0].name.clone();

        let existing = if is_new {
            None
        } else {
            cancellable(cancel, self.store.get_calendar(&name)).await?
        };

        let Some(root) = build(&segments, existing.as_ref()) else {
            warn!(calendar = %name, "calendar chain could not be built");
            result
                .errors
                .push(ValidationError::new("type", "Cannot create calendar.").at(0));
            return Ok(result);
        };

        let depth = root.depth();
        cancellable(cancel, self.store.add_calendar(&name, root, true, true)).await?;
        info!(calendar = %name, depth, "calendar chain saved");
        Ok(result)
    }

    /// Remove `name` from the store.
    #[instrument(skip(self, cancel), fields(calendar = %name))]
    pub async fn delete(&self, name: &str, cancel: &CancellationToken) -> Result<()> {
        if !cancellable(cancel, self.store.delete_calendar(name)).await? {
            return Err(CalendarError::DeleteFailed {
                name: name.to_string(),
            });
        }
        info!("calendar deleted");
        Ok(())
    }
}

/// Race a store call against cancellation. A cancelled call is dropped
/// before it completes.
async fn cancellable<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CalendarError::Cancelled),
        res = call => res,
    }
}
