//! # hoxhunt-connector
//!
//! Integration adapter for the Hoxhunt security-awareness platform. Polls
//! the Hoxhunt GraphQL API for phishing incidents and their reported
//! threats, normalizes the nested, nullable upstream shapes into a stable
//! context schema, and surfaces them to a security-orchestration host as
//! structured records and periodic "new incident" events.
//!
//! The host owns scheduling, last-run persistence, and record sinks; this
//! crate owns the incremental-fetch cursor protocol, the normalization
//! layer, and the GraphQL transport.

pub mod args;
pub mod client;
pub mod commands;
pub mod dates;
pub mod error;
pub mod fetch;
pub mod models;
pub mod normalize;
pub mod testing;
pub mod token;

pub use args::Args;
pub use client::{
    HoxhuntApi, HoxhuntClient, IncidentFilter, IncidentQueryParams, DEFAULT_SORT, MAX_PAGE_SIZE,
};
pub use error::{ConnectorError, ConnectorResult};
pub use fetch::{ActivityField, FetchConfig};
pub use models::{
    Attachment, CommandOutput, Enrichments, Escalation, EventRecord, Hop, Incident,
    IncidentPolicy, IncidentSeverity, IncidentState, LastRun, Link, Sender, Threat, ThreatEmail,
    UserModifiers, DATE_FORMAT,
};
pub use normalize::{incident_context, threat_context, to_context_key, to_upstream_key};
pub use token::ApiToken;
