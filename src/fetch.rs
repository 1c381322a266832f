//! Incremental fetch cycle.
//!
//! Drives one poll: resolve the persisted cursor, build the activity filter,
//! request one bounded ascending page, normalize the records into host
//! events, and compute the next cursor from the maximum activity timestamp
//! observed. A failed poll returns before any cursor is produced, so the
//! host's persisted state is only ever advanced by a fully successful cycle.

use crate::client::{HoxhuntApi, IncidentFilter, IncidentQueryParams, MAX_PAGE_SIZE};
use crate::dates;
use crate::error::{ConnectorError, ConnectorResult};
use crate::models::{EventRecord, Incident, LastRun, DATE_FORMAT};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Which upstream timestamp orders the incremental fetch.
///
/// One policy per deployment: the same field feeds both the query filter and
/// the cursor computation. Mixing them loses or duplicates records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActivityField {
    /// Fetch incidents created since the cursor (new incidents only).
    #[default]
    CreatedAt,
    /// Fetch incidents updated since the cursor (new and changed).
    UpdatedAt,
}

impl ActivityField {
    fn ascending_sort(self) -> &'static str {
        match self {
            ActivityField::CreatedAt => "createdAt_ASC",
            ActivityField::UpdatedAt => "updatedAt_ASC",
        }
    }

    fn apply_lower_bound(self, filter: &mut IncidentFilter, cursor: DateTime<Utc>) {
        match self {
            ActivityField::CreatedAt => filter.created_at_gt = Some(cursor),
            ActivityField::UpdatedAt => filter.updated_at_gt = Some(cursor),
        }
    }

    fn of(self, incident: &Incident) -> Option<DateTime<Utc>> {
        match self {
            ActivityField::CreatedAt => incident.created_at,
            ActivityField::UpdatedAt => incident.updated_at,
        }
    }
}

/// Static configuration for the polling command.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Upper bound on records per poll; clamped to [`MAX_PAGE_SIZE`].
    pub page_size: i64,
    /// Cursor seed for the very first poll. `None` means unbounded.
    pub first_fetch: Option<String>,
    /// Timestamp policy for the filter and the cursor.
    pub activity_field: ActivityField,
    /// Base filter; the activity lower bound is layered on top per poll.
    pub filter: IncidentFilter,
    /// Optional free-text search (e.g. `is:escalated`).
    pub search: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            first_fetch: None,
            activity_field: ActivityField::default(),
            filter: IncidentFilter::phishing_defaults(),
            search: None,
        }
    }
}

/// Runs one incremental poll and returns the next cursor plus the events to
/// emit. The caller persists the cursor only after it has accepted the
/// events, keeping the cycle atomic from the host's point of view.
pub async fn poll(
    api: &dyn HoxhuntApi,
    config: &FetchConfig,
    last_run: &LastRun,
    now: DateTime<Utc>,
) -> ConnectorResult<(LastRun, Vec<EventRecord>)> {
    let cursor = effective_cursor(config, last_run, now)?;
    debug!(?cursor, "resolved effective cursor");

    let mut filter = config.filter.clone();
    if let Some(cursor) = cursor {
        config.activity_field.apply_lower_bound(&mut filter, cursor);
    }

    let params = IncidentQueryParams {
        search: config.search.clone(),
        filter,
        sort: config.activity_field.ascending_sort().to_string(),
        first: config.page_size.clamp(1, MAX_PAGE_SIZE),
        skip: 0,
    };

    let raw_incidents = api.incidents(&params).await?;
    if raw_incidents.is_empty() {
        debug!("empty page, cursor unchanged");
        return Ok((last_run.clone(), Vec::new()));
    }

    // Seed the maximum from the cursor so it never regresses, and compute
    // it explicitly rather than trusting the requested sort order.
    let mut max_seen = cursor;
    let mut events = Vec::with_capacity(raw_incidents.len());

    for raw in &raw_incidents {
        let incident: Incident = serde_json::from_value(raw.clone()).map_err(|e| {
            ConnectorError::InvalidResponse(format!("malformed incident record: {e}"))
        })?;

        let activity = config.activity_field.of(&incident);
        if let Some(ts) = activity {
            if max_seen.map_or(true, |max| ts > max) {
                max_seen = Some(ts);
            }
        }

        let name = incident
            .human_readable_id
            .or(incident.id)
            .unwrap_or_default();
        let occurred = activity.or(incident.created_at).ok_or_else(|| {
            ConnectorError::InvalidResponse(format!(
                "incident record \"{name}\" carries no activity timestamp"
            ))
        })?;
        events.push(EventRecord {
            name,
            occurred: occurred.format(DATE_FORMAT).to_string(),
            raw_json: raw.to_string(),
        });
    }

    let next_run = match max_seen {
        Some(max) => LastRun::at(max.format(DATE_FORMAT).to_string()),
        None => last_run.clone(),
    };

    info!(
        fetched = events.len(),
        cursor = next_run.last_fetch.as_deref().unwrap_or("<unbounded>"),
        "poll complete"
    );
    Ok((next_run, events))
}

/// Persisted cursor if present, else the configured first-fetch time, else
/// unbounded. A cursor that fails to parse is a configuration error; the
/// poll never proceeds with a silently dropped lower bound.
fn effective_cursor(
    config: &FetchConfig,
    last_run: &LastRun,
    now: DateTime<Utc>,
) -> ConnectorResult<Option<DateTime<Utc>>> {
    if let Some(raw) = last_run.last_fetch.as_deref() {
        return dates::parse_time(raw, now).map(Some);
    }
    if let Some(raw) = config.first_fetch.as_deref() {
        return dates::parse_time(raw, now).map(Some);
    }
    Ok(None)
}
