//! Hoxhunt GraphQL transport and query building.
//!
//! One explicit client per configured integration instance; no module-level
//! session state. Each operation issues a single HTTPS POST of
//! `{query, variables}` with an `Authorization: Authtoken <key>` header and
//! classifies the response envelope into exactly one of: data payload,
//! transport failure (HTTP status >= 400), or query failure (GraphQL
//! `errors` array on an otherwise successful response).

use crate::error::{ConnectorError, ConnectorResult};
use crate::models::{IncidentPolicy, IncidentSeverity, IncidentState};
use crate::token::ApiToken;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

/// Hard page-size ceiling; also the default when the caller does not bound
/// the page.
pub const MAX_PAGE_SIZE: i64 = 200;

/// Default activity ordering for incident queries.
pub const DEFAULT_SORT: &str = "createdAt_ASC";

const CURRENT_USER_QUERY: &str = r#"
query getMe {
    currentUser {
        emails {
            address
        }
    }
}
"#;

const INCIDENTS_QUERY: &str = r#"
query getIncidents(
        $search: String,
        $filter: Incident_filter,
        $first: Int,
        $sort: [Incident_sort],
        $skip: Int
) {
    incidents(
            search: $search,
            filter: $filter,
            first: $first,
            sort: $sort,
            skip: $skip
    ) {
        _id
        createdAt
        updatedAt
        firstReportedAt
        lastReportedAt
        humanReadableId
        policyName
        severity
        state
        threatCount
        escalation {
            escalatedAt
            creationThreshold
        }
    }
}
"#;

const INCIDENT_THREATS_QUERY: &str = r#"
query getIncidentThreatsWithEnrichmentsAndModifiers(
        $filter: Incident_filter,
        $first: Int,
        $sort: [Incident_sort]
) {
    incidents(filter: $filter, first: $first, sort: $sort) {
        _id
        humanReadableId
        threats {
            _id
            createdAt
            updatedAt
            severity
            email {
                from {
                    address
                    name
                }
                attachments {
                    name
                    type
                    hash
                    size
                }
            }
            enrichments {
                hops {
                    from
                    by
                }
                links {
                    href
                    label
                }
            }
            userModifiers {
                userActedOnThreat
                repliedToEmail
                downloadedFile
                openedAttachment
                visitedLink
                enteredCredentials
                userMarkedAsSpam
                other
            }
        }
    }
}
"#;

/// ISO-8601 encoding for datetime filter values. The upstream filter
/// grammar wants second-precision UTC timestamps with a `Z` suffix, which
/// is not what the default serialization of a datetime produces.
mod iso8601 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => {
                serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            None => serializer.serialize_none(),
        }
    }
}

/// Structured `Incident_filter` object. Only populated members are sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IncidentFilter {
    #[serde(rename = "policyName_in", skip_serializing_if = "Option::is_none")]
    pub policy_name_in: Option<Vec<IncidentPolicy>>,
    #[serde(rename = "severity_in", skip_serializing_if = "Option::is_none")]
    pub severity_in: Option<Vec<IncidentSeverity>>,
    #[serde(rename = "state_eq", skip_serializing_if = "Option::is_none")]
    pub state_eq: Option<IncidentState>,
    #[serde(
        rename = "createdAt_gt",
        skip_serializing_if = "Option::is_none",
        serialize_with = "iso8601::serialize"
    )]
    pub created_at_gt: Option<DateTime<Utc>>,
    #[serde(
        rename = "updatedAt_gt",
        skip_serializing_if = "Option::is_none",
        serialize_with = "iso8601::serialize"
    )]
    pub updated_at_gt: Option<DateTime<Utc>>,
    #[serde(
        rename = "firstReportedAt_gte",
        skip_serializing_if = "Option::is_none",
        serialize_with = "iso8601::serialize"
    )]
    pub first_reported_at_gte: Option<DateTime<Utc>>,
    #[serde(
        rename = "lastReportedAt_gte",
        skip_serializing_if = "Option::is_none",
        serialize_with = "iso8601::serialize"
    )]
    pub last_reported_at_gte: Option<DateTime<Utc>>,
    #[serde(rename = "humanReadableId_eq", skip_serializing_if = "Option::is_none")]
    pub human_readable_id_eq: Option<String>,
}

impl IncidentFilter {
    /// The stock allow-list for phishing-relevant incidents: the policy and
    /// severity classes worth surfacing to an analyst, open incidents only.
    pub fn phishing_defaults() -> Self {
        Self {
            policy_name_in: Some(vec![
                IncidentPolicy::BusinessEmailCompromise,
                IncidentPolicy::Campaign,
                IncidentPolicy::UserActedOnThreat,
            ]),
            severity_in: Some(vec![
                IncidentSeverity::Phish,
                IncidentSeverity::Spear,
                IncidentSeverity::CompromisedEmail,
            ]),
            state_eq: Some(IncidentState::Open),
            ..Self::default()
        }
    }
}

/// Parameters for one `incidents` query page.
#[derive(Debug, Clone)]
pub struct IncidentQueryParams {
    /// Free-text search, e.g. `is:escalated` / `not:escalated`.
    pub search: Option<String>,
    pub filter: IncidentFilter,
    /// Sort expression such as `createdAt_ASC`; see [`crate::args`].
    pub sort: String,
    pub first: i64,
    pub skip: i64,
}

impl Default for IncidentQueryParams {
    fn default() -> Self {
        Self {
            search: None,
            filter: IncidentFilter::default(),
            sort: DEFAULT_SORT.to_string(),
            first: MAX_PAGE_SIZE,
            skip: 0,
        }
    }
}

/// Seam between commands and the wire. Production code talks to
/// [`HoxhuntClient`]; tests substitute a mock.
#[async_trait]
pub trait HoxhuntApi: Send + Sync {
    /// Connectivity check; returns the `currentUser` payload.
    async fn current_user(&self) -> ConnectorResult<Value>;

    /// One bounded page of incidents, as raw upstream records.
    async fn incidents(&self, params: &IncidentQueryParams) -> ConnectorResult<Vec<Value>>;

    /// Threats of the incident with the given human-readable id, as raw
    /// upstream records.
    async fn incident_threats(
        &self,
        incident_id: &str,
        first: i64,
    ) -> ConnectorResult<Vec<Value>>;
}

/// GraphQL client for the Hoxhunt API.
pub struct HoxhuntClient {
    http: reqwest::Client,
    api_url: String,
    api_key: ApiToken,
}

impl HoxhuntClient {
    pub fn new(api_url: impl Into<String>, api_key: ApiToken) -> ConnectorResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ConnectorError::Config(e.to_string()))?;
        Ok(Self {
            http,
            api_url: api_url.into(),
            api_key,
        })
    }

    #[instrument(skip(self, variables), fields(url = %self.api_url))]
    async fn post(&self, query: &str, variables: Value) -> ConnectorResult<Value> {
        debug!("issuing GraphQL request");
        let response = self
            .http
            .post(&self.api_url)
            .header("Authorization", format!("Authtoken {}", self.api_key.expose()))
            .json(&serde_json::json!({
                "query": query,
                "variables": variables,
            }))
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));
        parse_envelope(status, body)
    }
}

/// Classifies one response envelope. Pure so the error taxonomy is
/// testable without a live endpoint.
fn parse_envelope(status: u16, body: Value) -> ConnectorResult<Value> {
    if status >= 400 {
        return Err(ConnectorError::Transport { status, body });
    }

    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let messages = errors
                .iter()
                .map(|err| {
                    err.get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown GraphQL error")
                        .lines()
                        .next()
                        .unwrap_or_default()
                        .to_string()
                })
                .collect();
            return Err(ConnectorError::Query(messages));
        }
    }

    match body.get("data") {
        Some(data) if !data.is_null() => Ok(data.clone()),
        _ => Err(ConnectorError::InvalidResponse(
            "response envelope carries neither data nor errors".to_string(),
        )),
    }
}

#[async_trait]
impl HoxhuntApi for HoxhuntClient {
    async fn current_user(&self) -> ConnectorResult<Value> {
        let data = self.post(CURRENT_USER_QUERY, serde_json::json!({})).await?;
        Ok(data.get("currentUser").cloned().unwrap_or(Value::Null))
    }

    async fn incidents(&self, params: &IncidentQueryParams) -> ConnectorResult<Vec<Value>> {
        let first = params.first.clamp(1, MAX_PAGE_SIZE);
        let variables = serde_json::json!({
            "search": params.search,
            "filter": params.filter,
            "sort": params.sort,
            "first": first,
            "skip": params.skip,
        });
        let data = self.post(INCIDENTS_QUERY, variables).await?;
        incidents_from(data)
    }

    async fn incident_threats(
        &self,
        incident_id: &str,
        first: i64,
    ) -> ConnectorResult<Vec<Value>> {
        let filter = IncidentFilter {
            human_readable_id_eq: Some(incident_id.to_string()),
            ..IncidentFilter::default()
        };
        let variables = serde_json::json!({
            "filter": filter,
            "first": first.clamp(1, MAX_PAGE_SIZE),
            "sort": "updatedAt_ASC",
        });
        let data = self.post(INCIDENT_THREATS_QUERY, variables).await?;
        threats_from(data, incident_id)
    }
}

fn incidents_from(data: Value) -> ConnectorResult<Vec<Value>> {
    match data.get("incidents") {
        Some(Value::Array(incidents)) => Ok(incidents.clone()),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(other) => Err(ConnectorError::InvalidResponse(format!(
            "expected an incident list, got: {other}"
        ))),
    }
}

/// Extracts the threat list for a single-incident response. An empty
/// incident list means the id does not exist upstream.
fn threats_from(data: Value, incident_id: &str) -> ConnectorResult<Vec<Value>> {
    let incidents = incidents_from(data)?;
    let incident = incidents.first().ok_or_else(|| {
        ConnectorError::NotFound(format!(
            "no Hoxhunt incident found with id \"{incident_id}\""
        ))
    })?;
    match incident.get("threats") {
        Some(Value::Array(threats)) => Ok(threats.clone()),
        _ => Ok(Vec::new()),
    }
}
