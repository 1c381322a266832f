//! Host-facing command surface.
//!
//! The host's dispatch runtime owns scheduling and persistence; these
//! functions own everything between "arguments in" and "records out".

use crate::args::Args;
use crate::client::{HoxhuntApi, IncidentFilter, IncidentQueryParams, DEFAULT_SORT, MAX_PAGE_SIZE};
use crate::error::{ConnectorError, ConnectorResult};
use crate::fetch::{self, FetchConfig};
use crate::models::{CommandOutput, EventRecord, Incident, LastRun, Threat};
use crate::normalize::{incident_context, threat_context};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::instrument;

/// Command names as registered with the host.
pub const TEST_MODULE: &str = "test-module";
pub const FETCH_INCIDENTS: &str = "hoxhunt-fetch-incidents";
pub const GET_INCIDENTS: &str = "hoxhunt-get-incidents";
pub const GET_INCIDENT_THREATS: &str = "hoxhunt-get-incident-threats";

/// Output namespaces in the host context.
pub const INCIDENT_OUTPUT_PREFIX: &str = "Hoxhunt.Incident";
pub const THREAT_OUTPUT_PREFIX: &str = "Hoxhunt.Threat";

/// Connectivity check: one authenticated `currentUser` round trip.
#[instrument(skip(api))]
pub async fn test_module(api: &dyn HoxhuntApi) -> ConnectorResult<&'static str> {
    api.current_user().await?;
    Ok("ok")
}

/// The polling command: one incremental fetch cycle. The caller persists
/// the returned cursor and emits the events.
#[instrument(skip(api, config, last_run))]
pub async fn fetch_incidents(
    api: &dyn HoxhuntApi,
    config: &FetchConfig,
    last_run: &LastRun,
) -> ConnectorResult<(LastRun, Vec<EventRecord>)> {
    fetch::poll(api, config, last_run, Utc::now()).await
}

/// On-demand incident listing with escalation toggle, reported-at bounds,
/// sorting, and page/page-size paging.
#[instrument(skip(api, args))]
pub async fn get_incidents(
    api: &dyn HoxhuntApi,
    args: &Args,
    now: DateTime<Utc>,
) -> ConnectorResult<CommandOutput> {
    let search = args
        .boolean("is_escalated")?
        .map(|escalated| format!("{}:escalated", if escalated { "is" } else { "not" }));

    let mut filter = IncidentFilter::phishing_defaults();
    filter.first_reported_at_gte = args.datetime("first_reported_at", now)?;
    filter.last_reported_at_gte = args.datetime("last_reported_at", now)?;

    let sort = args
        .sort("sort_by")?
        .unwrap_or_else(|| DEFAULT_SORT.to_string());
    let page_size = bounded_page_size(args)?;
    let page = args.integer("page")?.unwrap_or(1);
    if page < 1 {
        return Err(ConnectorError::Config(format!(
            "Invalid number: \"page\"={page} (expected 1 or greater)"
        )));
    }
    let skip = (page - 1).checked_mul(page_size).ok_or_else(|| {
        ConnectorError::Config(format!("Invalid number: \"page\"={page} (out of range)"))
    })?;

    let params = IncidentQueryParams {
        search,
        filter,
        sort,
        first: page_size,
        skip,
    };
    let raw_incidents = api.incidents(&params).await?;

    let outputs = raw_incidents
        .iter()
        .map(|raw| {
            let incident: Incident = serde_json::from_value(raw.clone()).map_err(|e| {
                ConnectorError::InvalidResponse(format!("malformed incident record: {e}"))
            })?;
            incident_context(&incident)
        })
        .collect::<ConnectorResult<Vec<_>>>()?;

    Ok(CommandOutput {
        outputs_prefix: INCIDENT_OUTPUT_PREFIX,
        key_field: "HumanReadableId",
        outputs,
        raw_response: Value::Array(raw_incidents),
    })
}

/// On-demand threat listing for one incident, addressed by its
/// human-readable id.
#[instrument(skip(api, args))]
pub async fn get_incident_threats(
    api: &dyn HoxhuntApi,
    args: &Args,
) -> ConnectorResult<CommandOutput> {
    let incident_id = args.required_string("incident_id")?;
    let page_size = bounded_page_size(args)?;

    let raw_threats = api.incident_threats(&incident_id, page_size).await?;

    let outputs = raw_threats
        .iter()
        .map(|raw| {
            let threat: Threat = serde_json::from_value(raw.clone()).map_err(|e| {
                ConnectorError::InvalidResponse(format!("malformed threat record: {e}"))
            })?;
            threat_context(&threat)
        })
        .collect::<ConnectorResult<Vec<_>>>()?;

    Ok(CommandOutput {
        outputs_prefix: THREAT_OUTPUT_PREFIX,
        key_field: "Id",
        outputs,
        raw_response: Value::Array(raw_threats),
    })
}

/// Paging arguments come from the host unvalidated; anything outside
/// `1..=MAX_PAGE_SIZE` is a configuration error, not something to clamp.
fn bounded_page_size(args: &Args) -> ConnectorResult<i64> {
    let page_size = args.integer("page_size")?.unwrap_or(MAX_PAGE_SIZE);
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(ConnectorError::Config(format!(
            "Invalid number: \"page_size\"={page_size} (expected 1..={MAX_PAGE_SIZE})"
        )));
    }
    Ok(page_size)
}
