//! Test doubles and sample payload builders.
//!
//! [`MockHoxhuntApi`] stands in for the wire in controller and command
//! tests, recording the query parameters it was given.

use crate::client::{HoxhuntApi, IncidentQueryParams};
use crate::error::{ConnectorError, ConnectorResult};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

enum Failure {
    Status(u16),
    Query(String),
}

/// In-memory [`HoxhuntApi`] double.
pub struct MockHoxhuntApi {
    incidents: Vec<Value>,
    /// `None` makes threat lookups report the incident as unknown.
    threats: Option<Vec<Value>>,
    failure: Option<Failure>,
    params: Mutex<Vec<IncidentQueryParams>>,
    threat_requests: Mutex<Vec<(String, i64)>>,
}

impl MockHoxhuntApi {
    pub fn with_incidents(incidents: Vec<Value>) -> Self {
        Self {
            incidents,
            threats: None,
            failure: None,
            params: Mutex::new(Vec::new()),
            threat_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_threats(threats: Vec<Value>) -> Self {
        Self {
            threats: Some(threats),
            ..Self::with_incidents(Vec::new())
        }
    }

    pub fn failing_with_status(status: u16) -> Self {
        Self {
            failure: Some(Failure::Status(status)),
            ..Self::with_incidents(Vec::new())
        }
    }

    pub fn failing_with_query(message: impl Into<String>) -> Self {
        Self {
            failure: Some(Failure::Query(message.into())),
            ..Self::with_incidents(Vec::new())
        }
    }

    /// Incident query parameters seen so far, in call order.
    pub fn recorded_params(&self) -> Vec<IncidentQueryParams> {
        self.params.lock().expect("params lock").clone()
    }

    /// `(incident_id, first)` pairs from threat lookups, in call order.
    pub fn recorded_threat_requests(&self) -> Vec<(String, i64)> {
        self.threat_requests.lock().expect("requests lock").clone()
    }

    fn check_failure(&self) -> ConnectorResult<()> {
        match &self.failure {
            Some(Failure::Status(status)) => Err(ConnectorError::Transport {
                status: *status,
                body: serde_json::json!({"message": "simulated upstream failure"}),
            }),
            Some(Failure::Query(message)) => {
                Err(ConnectorError::Query(vec![message.clone()]))
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl HoxhuntApi for MockHoxhuntApi {
    async fn current_user(&self) -> ConnectorResult<Value> {
        self.check_failure()?;
        Ok(serde_json::json!({
            "emails": [{"address": "test_user@example.com"}]
        }))
    }

    async fn incidents(&self, params: &IncidentQueryParams) -> ConnectorResult<Vec<Value>> {
        self.check_failure()?;
        self.params.lock().expect("params lock").push(params.clone());
        Ok(self.incidents.clone())
    }

    async fn incident_threats(
        &self,
        incident_id: &str,
        first: i64,
    ) -> ConnectorResult<Vec<Value>> {
        self.check_failure()?;
        self.threat_requests
            .lock()
            .expect("requests lock")
            .push((incident_id.to_string(), first));
        self.threats.clone().ok_or_else(|| {
            ConnectorError::NotFound(format!(
                "no Hoxhunt incident found with id \"{incident_id}\""
            ))
        })
    }
}

/// A minimal raw incident with the given human-readable id, created and
/// updated at `timestamp`.
pub fn sample_incident(human_readable_id: &str, timestamp: &str) -> Value {
    serde_json::json!({
        "_id": format!("oid-{human_readable_id}"),
        "humanReadableId": human_readable_id,
        "createdAt": timestamp,
        "updatedAt": timestamp,
        "firstReportedAt": timestamp,
        "lastReportedAt": timestamp,
        "policyName": "CAMPAIGN",
        "severity": "PHISH",
        "state": "OPEN",
        "threatCount": 1,
        "escalation": null
    })
}

/// A fully populated raw threat, shaped like the upstream fixture data.
pub fn sample_threat(id: &str, timestamp: &str) -> Value {
    serde_json::json!({
        "_id": id,
        "createdAt": timestamp,
        "updatedAt": timestamp,
        "severity": "PHISH",
        "email": {
            "from": [{
                "name": "Bad Guy",
                "address": "suspicious.email@example.com"
            }],
            "attachments": [{
                "name": "this-is-definitely-not-a-virus.zip",
                "type": "application/zip",
                "hash": "f87c4bd3b606b34fdcef2b3f01bc0e9f",
                "size": 32
            }]
        },
        "enrichments": {
            "hops": [{"from": "malware-server.com:1234", "by": "other-malware-server.com:4321"}],
            "links": [{"href": "https://free-cat-pictures.xyz/register", "label": "CLICK HERE"}]
        },
        "userModifiers": {
            "userActedOnThreat": true,
            "repliedToEmail": true,
            "downloadedFile": true,
            "openedAttachment": true,
            "visitedLink": true,
            "enteredCredentials": true,
            "userMarkedAsSpam": false,
            "other": true
        }
    })
}
