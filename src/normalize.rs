//! Normalization of upstream records into the host context schema.
//!
//! Upstream key casing and nesting are inconsistent across API revisions, so
//! every output key is derived from the logical upstream key by one fixed,
//! total transform: capitalize the first character. The output key set is
//! identical for every record of a kind, regardless of which optional fields
//! the upstream happened to return. Normalization fails only when a record
//! is missing its identifying field.

use crate::error::{ConnectorError, ConnectorResult};
use crate::models::{Escalation, Incident, Threat, UserModifiers};
use serde_json::{Map, Value};

type ContextMap = Map<String, Value>;

/// Recases an upstream key for context output by capitalizing its first
/// character. Total for every non-empty key; an empty key is a hard error
/// rather than a silently empty output key.
pub fn to_context_key(key: &str) -> ConnectorResult<String> {
    flip_first(key, char::to_uppercase)
}

/// Inverse of [`to_context_key`] for camelCase upstream keys.
pub fn to_upstream_key(key: &str) -> ConnectorResult<String> {
    flip_first(key, char::to_lowercase)
}

fn flip_first<I>(key: &str, flip: impl Fn(char) -> I) -> ConnectorResult<String>
where
    I: Iterator<Item = char>,
{
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => Ok(flip(first).chain(chars).collect()),
        None => Err(ConnectorError::InvalidResponse(
            "cannot recase an empty key".to_string(),
        )),
    }
}

/// Strips the `user` prefix from an interaction-modifier key, yielding the
/// flag's logical name (`userMarkedAsSpam` -> `markedAsSpam`).
fn modifier_name(upstream: &str) -> ConnectorResult<String> {
    match upstream.strip_prefix("user") {
        Some(rest) if !rest.is_empty() => to_upstream_key(rest),
        _ => Ok(upstream.to_string()),
    }
}

fn put(map: &mut ContextMap, upstream_key: &str, value: Value) -> ConnectorResult<()> {
    map.insert(to_context_key(upstream_key)?, value);
    Ok(())
}

fn json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Maps one incident into the flat context schema.
pub fn incident_context(incident: &Incident) -> ConnectorResult<ContextMap> {
    let id = incident
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            ConnectorError::InvalidResponse("incident record is missing its id".to_string())
        })?;

    let mut out = ContextMap::new();
    put(&mut out, "id", Value::String(id.to_string()))?;
    put(&mut out, "humanReadableId", json(&incident.human_readable_id))?;
    put(&mut out, "createdAt", json(&incident.created_at))?;
    put(&mut out, "updatedAt", json(&incident.updated_at))?;
    put(&mut out, "firstReportedAt", json(&incident.first_reported_at))?;
    put(&mut out, "lastReportedAt", json(&incident.last_reported_at))?;
    put(&mut out, "policyName", json(&incident.policy_name))?;
    put(&mut out, "severity", json(&incident.severity))?;
    put(&mut out, "state", json(&incident.state))?;
    put(&mut out, "threatCount", json(&incident.threat_count))?;

    // Escalation keys are always present so the schema does not depend on
    // whether the incident escalated.
    let (escalated_at, threshold) = match &incident.escalation {
        Some(Escalation {
            escalated_at,
            creation_threshold,
        }) => (json(escalated_at), json(creation_threshold)),
        None => (Value::Null, Value::Null),
    };
    put(&mut out, "escalatedAt", escalated_at)?;
    put(&mut out, "creationThreshold", threshold)?;

    Ok(out)
}

/// Maps one threat into the flat context schema.
pub fn threat_context(threat: &Threat) -> ConnectorResult<ContextMap> {
    let id = threat
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            ConnectorError::InvalidResponse("threat record is missing its id".to_string())
        })?;

    let mut out = ContextMap::new();
    put(&mut out, "id", Value::String(id.to_string()))?;
    put(&mut out, "createdAt", json(&threat.created_at))?;
    put(&mut out, "updatedAt", json(&threat.updated_at))?;
    put(&mut out, "severity", json(&threat.severity))?;

    // Sender: upstream models "from" as a list with at most one meaningful
    // entry. An empty list yields a placeholder, not an error.
    let sender = threat
        .email
        .as_ref()
        .and_then(|email| email.from.as_ref())
        .and_then(|senders| senders.first());
    let mut from = ContextMap::new();
    put(
        &mut from,
        "name",
        sender.and_then(|s| s.name.clone()).map_or(Value::Null, Value::String),
    )?;
    put(
        &mut from,
        "address",
        sender
            .and_then(|s| s.address.clone())
            .map_or(Value::Null, Value::String),
    )?;
    put(&mut out, "from", Value::Object(from))?;

    let attachments = threat
        .email
        .as_ref()
        .and_then(|email| email.attachments.as_ref())
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .map(|attachment| {
            let mut entry = ContextMap::new();
            put(&mut entry, "name", json(&attachment.name))?;
            put(&mut entry, "type", json(&attachment.mime_type))?;
            put(&mut entry, "hash", json(&attachment.hash))?;
            put(&mut entry, "size", json(&attachment.size))?;
            Ok(Value::Object(entry))
        })
        .collect::<ConnectorResult<Vec<_>>>()?;
    put(&mut out, "attachments", Value::Array(attachments))?;

    let hops = threat
        .enrichments
        .as_ref()
        .and_then(|e| e.hops.as_ref())
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .map(|hop| {
            let mut entry = ContextMap::new();
            put(&mut entry, "from", json(&hop.from))?;
            put(&mut entry, "by", json(&hop.by))?;
            Ok(Value::Object(entry))
        })
        .collect::<ConnectorResult<Vec<_>>>()?;
    put(&mut out, "hops", Value::Array(hops))?;

    let links = threat
        .enrichments
        .as_ref()
        .and_then(|e| e.links.as_ref())
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .map(|link| {
            let mut entry = ContextMap::new();
            put(&mut entry, "href", json(&link.href))?;
            put(&mut entry, "label", json(&link.label))?;
            Ok(Value::Object(entry))
        })
        .collect::<ConnectorResult<Vec<_>>>()?;
    put(&mut out, "links", Value::Array(links))?;

    let default_modifiers = UserModifiers::default();
    let modifiers = threat.user_modifiers.as_ref().unwrap_or(&default_modifiers);
    for (upstream_key, value) in [
        ("userActedOnThreat", modifiers.user_acted_on_threat),
        ("repliedToEmail", modifiers.replied_to_email),
        ("downloadedFile", modifiers.downloaded_file),
        ("openedAttachment", modifiers.opened_attachment),
        ("visitedLink", modifiers.visited_link),
        ("enteredCredentials", modifiers.entered_credentials),
        ("userMarkedAsSpam", modifiers.user_marked_as_spam),
        ("other", modifiers.other),
    ] {
        let name = modifier_name(upstream_key)?;
        put(&mut out, &name, Value::Bool(value.unwrap_or(false)))?;
    }

    Ok(out)
}
