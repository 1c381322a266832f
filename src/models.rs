//! Typed upstream entities and host-facing record types.
//!
//! Upstream shapes are deliberately lenient: every non-identifying field is
//! optional, because the Hoxhunt GraphQL API returns null for anything the
//! reporting mailbox did not capture. The normalizer in [`crate::normalize`]
//! is responsible for turning these into a stable output schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed timestamp format for host-facing event records.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Incident lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentState {
    Open,
    Resolved,
}

/// Incident policy/type classifications used in fetch filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentPolicy {
    BusinessEmailCompromise,
    Campaign,
    UserActedOnThreat,
}

/// Incident severity classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentSeverity {
    Inconclusive,
    FalsePositive,
    Spam,
    Phish,
    Spear,
    CompromisedEmail,
}

/// A phishing incident as returned by the `incidents` query.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub human_readable_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub first_reported_at: Option<DateTime<Utc>>,
    pub last_reported_at: Option<DateTime<Utc>>,
    pub policy_name: Option<String>,
    pub severity: Option<String>,
    pub state: Option<String>,
    pub threat_count: Option<i64>,
    pub escalation: Option<Escalation>,
}

/// Escalation sub-record; absent when the incident never crossed its
/// creation threshold.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Escalation {
    pub escalated_at: Option<DateTime<Utc>>,
    pub creation_threshold: Option<i64>,
}

/// A reported threat belonging to an incident.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Threat {
    // Older API revisions return `id`, newer ones `_id`.
    #[serde(rename = "_id", alias = "id")]
    pub id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub severity: Option<String>,
    pub email: Option<ThreatEmail>,
    pub enrichments: Option<Enrichments>,
    pub user_modifiers: Option<UserModifiers>,
}

/// Email metadata captured for a threat.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreatEmail {
    /// Upstream models this as a list; at most one entry is meaningful.
    pub from: Option<Vec<Sender>>,
    pub attachments: Option<Vec<Attachment>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sender {
    pub address: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub mime_type: Option<String>,
    pub hash: Option<String>,
    pub size: Option<u64>,
}

/// Network-derived enrichment data for a threat.
#[derive(Debug, Clone, Deserialize)]
pub struct Enrichments {
    pub hops: Option<Vec<Hop>>,
    pub links: Option<Vec<Link>>,
}

// Hop and link keys have shipped in both casings upstream.
#[derive(Debug, Clone, Deserialize)]
pub struct Hop {
    #[serde(alias = "From")]
    pub from: Option<String>,
    #[serde(alias = "By")]
    pub by: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    #[serde(alias = "Href")]
    pub href: Option<String>,
    #[serde(alias = "Label")]
    pub label: Option<String>,
}

/// End-user interaction flags for a threat. Every field is nullable
/// upstream; the normalizer defaults absent values to `false`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserModifiers {
    pub user_acted_on_threat: Option<bool>,
    pub replied_to_email: Option<bool>,
    pub downloaded_file: Option<bool>,
    pub opened_attachment: Option<bool>,
    pub visited_link: Option<bool>,
    pub entered_credentials: Option<bool>,
    pub user_marked_as_spam: Option<bool>,
    pub other: Option<bool>,
}

/// Persisted incremental-fetch cursor. Opaque to the host: it is handed
/// back unchanged on the next poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastRun {
    #[serde(rename = "lastFetch", skip_serializing_if = "Option::is_none")]
    pub last_fetch: Option<String>,
}

impl LastRun {
    pub fn at(timestamp: impl Into<String>) -> Self {
        Self {
            last_fetch: Some(timestamp.into()),
        }
    }
}

/// One "new incident" event emitted to the host per polled incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    /// Human-readable incident id, used as the event title.
    pub name: String,
    /// Activity timestamp formatted as [`DATE_FORMAT`].
    pub occurred: String,
    /// The raw upstream record, serialized verbatim.
    #[serde(rename = "rawJSON")]
    pub raw_json: String,
}

/// Result of an on-demand query command: normalized records plus the raw
/// upstream payload, tagged with an output namespace and unique key field.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput {
    pub outputs_prefix: &'static str,
    pub key_field: &'static str,
    pub outputs: Vec<serde_json::Map<String, serde_json::Value>>,
    pub raw_response: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incident_deserializes_from_upstream_shape() {
        let raw = serde_json::json!({
            "_id": "zxc12rregsdf",
            "humanReadableId": "hox-dangerous-incident-1",
            "createdAt": "2020-06-04T13:42:26.173Z",
            "updatedAt": "2020-06-04T13:42:26.173Z",
            "firstReportedAt": "2020-06-04T13:42:26.173Z",
            "lastReportedAt": "2020-06-04T13:42:26.173Z",
            "policyName": "CAMPAIGN",
            "severity": "PHISH",
            "state": "OPEN",
            "threatCount": 10,
            "escalation": {
                "escalatedAt": "2020-06-04T13:42:26.173Z",
                "creationThreshold": 5
            }
        });

        let incident: Incident = serde_json::from_value(raw).unwrap();
        assert_eq!(incident.id.as_deref(), Some("zxc12rregsdf"));
        assert_eq!(
            incident.human_readable_id.as_deref(),
            Some("hox-dangerous-incident-1")
        );
        assert_eq!(incident.threat_count, Some(10));
        let escalation = incident.escalation.unwrap();
        assert_eq!(escalation.creation_threshold, Some(5));
    }

    #[test]
    fn incident_ignores_nested_threats_payload() {
        // The threats query returns incidents with an embedded threat list;
        // those are extracted from the raw value, never through Incident.
        let incident: Incident = serde_json::from_value(serde_json::json!({
            "_id": "a",
            "threats": [{"_id": "t1"}]
        }))
        .unwrap();
        assert_eq!(incident.id.as_deref(), Some("a"));
    }

    #[test]
    fn threat_accepts_both_id_spellings() {
        let with_underscore: Threat =
            serde_json::from_value(serde_json::json!({"_id": "a"})).unwrap();
        let without: Threat = serde_json::from_value(serde_json::json!({"id": "b"})).unwrap();
        assert_eq!(with_underscore.id.as_deref(), Some("a"));
        assert_eq!(without.id.as_deref(), Some("b"));
    }

    #[test]
    fn hop_accepts_capitalized_keys() {
        let hop: Hop = serde_json::from_value(serde_json::json!({
            "From": "malware-server.com:1234",
            "By": "other-malware-server.com:4321"
        }))
        .unwrap();
        assert_eq!(hop.from.as_deref(), Some("malware-server.com:1234"));
    }

    #[test]
    fn last_run_omits_absent_cursor() {
        let empty = serde_json::to_value(LastRun::default()).unwrap();
        assert_eq!(empty, serde_json::json!({}));

        let set = serde_json::to_value(LastRun::at("2020-06-04T13:42:26Z")).unwrap();
        assert_eq!(set, serde_json::json!({"lastFetch": "2020-06-04T13:42:26Z"}));
    }

    #[test]
    fn filter_enums_serialize_to_upstream_constants() {
        assert_eq!(
            serde_json::to_value(IncidentPolicy::BusinessEmailCompromise).unwrap(),
            serde_json::json!("BUSINESS_EMAIL_COMPROMISE")
        );
        assert_eq!(
            serde_json::to_value(IncidentSeverity::Spear).unwrap(),
            serde_json::json!("SPEAR")
        );
        assert_eq!(
            serde_json::to_value(IncidentState::Open).unwrap(),
            serde_json::json!("OPEN")
        );
    }
}
