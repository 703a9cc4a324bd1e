//! Append-only audit log embedded in an entity's JSON metadata.
//!
//! Entities keep a free-form `metadata` object; the audit trail lives under
//! its `audit_log` key as an array of entries:
//!
//! ```json
//! { "audit_log": [ { "action": "created", "user_id": "...", "user_name": "...",
//!                    "timestamp": "2026-01-01T00:00:00Z" } ] }
//! ```
//!
//! [`append`] never mutates its input. It copies the map and the log array and
//! returns the new container, so persistence layers that compare the old and
//! new value always observe the change.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Actor, UserId};

/// Key of the audit array inside [`Metadata`].
pub const AUDIT_LOG_KEY: &str = "audit_log";

/// JSON metadata attached to CRM records.
///
/// Every constructor allocates its own map; instances never share storage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy of this metadata with `key` set to `value`.
    pub fn with(&self, key: impl Into<String>, value: Value) -> Self {
        let mut map = self.0.clone();
        map.insert(key.into(), value);
        Self(map)
    }

    /// Decoded audit entries, oldest first. Malformed entries are skipped.
    pub fn audit_log(&self) -> Vec<AuditEntry> {
        match self.0.get(AUDIT_LOG_KEY) {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(|e| serde_json::from_value(e.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// One who-did-what-when record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: String,
    #[serde(rename = "user_id")]
    pub actor_id: UserId,
    #[serde(rename = "user_name")]
    pub actor_name: String,
    pub timestamp: DateTime<Utc>,
    /// Names of the fields touched by an update (never their values).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>, actor: &Actor, timestamp: DateTime<Utc>) -> Self {
        Self {
            action: action.into(),
            actor_id: actor.id,
            actor_name: actor.name.clone(),
            timestamp,
            changes: None,
            detail: None,
        }
    }

    pub fn with_changes(mut self, changes: Vec<String>) -> Self {
        self.changes = Some(changes);
        self
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    /// JSON form stored in the log. Built field by field so it cannot fail.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("action".into(), Value::String(self.action.clone()));
        object.insert("user_id".into(), Value::String(self.actor_id.to_string()));
        object.insert("user_name".into(), Value::String(self.actor_name.clone()));
        object.insert(
            "timestamp".into(),
            Value::String(self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        );
        if let Some(changes) = &self.changes {
            object.insert("changes".into(), Value::from(changes.clone()));
        }
        if let Some(detail) = &self.detail {
            object.insert("detail".into(), detail.clone());
        }
        Value::Object(object)
    }
}

/// Return a copy of `metadata` with `entry` appended to its audit log.
///
/// A missing or non-array `audit_log` value starts a new log.
pub fn append(metadata: &Metadata, entry: AuditEntry) -> Metadata {
    let mut map = metadata.0.clone();

    let mut log = match map.get(AUDIT_LOG_KEY) {
        Some(Value::Array(entries)) => entries.clone(),
        _ => Vec::new(),
    };
    log.push(entry.to_value());

    map.insert(AUDIT_LOG_KEY.to_string(), Value::Array(log));
    Metadata(map)
}

/// Convenience wrapper over [`append`] for the common created/updated/deleted
/// entries.
pub fn record(
    metadata: &Metadata,
    action: &str,
    actor: &Actor,
    timestamp: DateTime<Utc>,
    changes: Option<Vec<String>>,
) -> Metadata {
    let mut entry = AuditEntry::new(action, actor, timestamp);
    entry.changes = changes;
    append(metadata, entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn actor() -> Actor {
        Actor::new(UserId::new(), "Ada Admin")
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn append_twice_yields_two_entries_and_keeps_the_first() {
        let actor = actor();
        let empty = Metadata::new();

        let once = record(&empty, "created", &actor, at(9), None);
        let first = once.audit_log()[0].clone();

        let twice = record(&once, "updated", &actor, at(10), Some(vec!["notes".into()]));
        let log = twice.audit_log();

        assert_eq!(log.len(), 2);
        assert_eq!(log[0], first);
        assert_eq!(log[1].action, "updated");
        assert_eq!(log[1].changes.as_deref(), Some(&["notes".to_string()][..]));
    }

    #[test]
    fn append_does_not_mutate_its_input() {
        let actor = actor();
        let base = record(&Metadata::new(), "created", &actor, at(9), None);
        let snapshot = base.clone();

        let _next = record(&base, "updated", &actor, at(10), None);

        assert_eq!(base, snapshot);
        assert_eq!(base.audit_log().len(), 1);
    }

    #[test]
    fn fresh_metadata_instances_never_alias() {
        let actor = actor();
        let a = Metadata::default();
        let b = Metadata::default();

        let a2 = record(&a, "created", &actor, at(9), None);

        assert!(a.is_empty());
        assert!(b.is_empty());
        assert_eq!(a2.audit_log().len(), 1);
    }

    #[test]
    fn preserves_unrelated_keys_and_replaces_malformed_log() {
        let actor = actor();
        let meta = Metadata::new()
            .with("notes", json!("vip"))
            .with(AUDIT_LOG_KEY, json!("garbage"));

        let next = record(&meta, "created", &actor, at(9), None);

        assert_eq!(next.get("notes"), Some(&json!("vip")));
        assert_eq!(next.audit_log().len(), 1);
    }

    #[test]
    fn serialized_entry_uses_user_keys() {
        let actor = actor();
        let meta = record(&Metadata::new(), "deleted", &actor, at(9), None);
        let raw = &meta.get(AUDIT_LOG_KEY).unwrap()[0];

        assert_eq!(raw["action"], json!("deleted"));
        assert_eq!(raw["user_name"], json!("Ada Admin"));
        assert_eq!(raw["user_id"], json!(actor.id.to_string()));
        assert_eq!(raw["timestamp"], json!("2026-03-01T09:00:00Z"));
        assert!(raw.get("changes").is_none());
    }

    #[test]
    fn stored_value_matches_serde_form_and_reads_back() {
        let actor = actor();
        let entry = AuditEntry::new("converted", &actor, at(11))
            .with_changes(vec!["status".into(), "stage".into()])
            .with_detail(json!({ "client_id": "c-1" }));

        assert_eq!(entry.to_value(), serde_json::to_value(&entry).unwrap());

        let meta = append(&Metadata::new(), entry.clone());
        assert_eq!(meta.audit_log(), vec![entry]);
    }
}
