// ── Operation domain type ──
//
// The canonical alarm record. A parser creates it empty and fills it
// field by field; the store assigns the id exactly once.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::location::PropertyLocation;

// ── OperationId ─────────────────────────────────────────────────────

/// Identifier assigned by an [`OperationStore`](crate::store::OperationStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(pub u64);

impl OperationId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for OperationId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ── Keywords & resources ────────────────────────────────────────────

/// Emergency keyword classification ("Stichworte").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationKeywords {
    pub keyword: Option<String>,
    pub emergency_keyword: Option<String>,
    /// Fire ("Brand") keyword.
    pub b: Option<String>,
    /// Rescue keyword.
    pub r: Option<String>,
    /// Special ("Sonstiges") keyword.
    pub s: Option<String>,
    /// Technical-assistance keyword.
    pub t: Option<String>,
}

impl fmt::Display for OperationKeywords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [
            &self.keyword,
            &self.emergency_keyword,
            &self.b,
            &self.r,
            &self.s,
            &self.t,
        ]
        .into_iter()
        .filter_map(|k| k.as_deref())
        .filter(|k| !k.trim().is_empty())
        .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// A unit or vehicle requested by the dispatch center.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResource {
    pub full_name: String,
    pub timestamp: Option<String>,
    #[serde(default)]
    pub requested_equipment: Vec<String>,
}

// ── Operation ───────────────────────────────────────────────────────

/// A parsed alarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Store-assigned id; `None` until the first successful store.
    pub id: Option<OperationId>,
    /// Globally unique id, assigned at construction.
    pub guid: Uuid,
    /// Dispatch-center number ("Einsatznummer").
    pub operation_number: Option<String>,
    /// Alarm time. `None` is the unset sentinel; see [`ensure_timestamp`](Self::ensure_timestamp).
    pub timestamp: Option<NaiveDateTime>,
    /// When the operation materialized in this process.
    pub timestamp_income: NaiveDateTime,
    pub messenger: Option<String>,
    pub priority: Option<String>,
    /// Place of action.
    #[serde(default)]
    pub einsatzort: PropertyLocation,
    /// Destination location, usually empty.
    #[serde(default)]
    pub zielort: PropertyLocation,
    pub comment: Option<String>,
    /// Incident picture ("Meldebild").
    pub picture: Option<String>,
    pub operation_plan: Option<String>,
    #[serde(default)]
    pub keywords: OperationKeywords,
    #[serde(default)]
    pub resources: Vec<OperationResource>,
    /// Parser-specific extra fields.
    #[serde(default)]
    pub custom_data: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub is_acknowledged: bool,
}

impl Operation {
    pub fn new() -> Self {
        Self {
            id: None,
            guid: Uuid::new_v4(),
            operation_number: None,
            timestamp: None,
            timestamp_income: Local::now().naive_local(),
            messenger: None,
            priority: None,
            einsatzort: PropertyLocation::default(),
            zielort: PropertyLocation::default(),
            comment: None,
            picture: None,
            operation_plan: None,
            keywords: OperationKeywords::default(),
            resources: Vec::new(),
            custom_data: BTreeMap::new(),
            is_acknowledged: false,
        }
    }

    /// Replace an unset timestamp with the current local time.
    ///
    /// A timestamp in year 1 is a placeholder and counts as unset.
    /// Returns `true` if a substitution happened.
    pub fn ensure_timestamp(&mut self) -> bool {
        if self.timestamp.is_some_and(|ts| !is_placeholder(ts)) {
            return false;
        }
        self.timestamp = Some(Local::now().naive_local());
        true
    }

    /// The location crews should drive to.
    pub fn destination_location(&self) -> &PropertyLocation {
        &self.einsatzort
    }

    pub fn custom_data(&self, key: &str) -> Option<&serde_json::Value> {
        self.custom_data.get(key)
    }
}

impl Default for Operation {
    fn default() -> Self {
        Self::new()
    }
}

/// Parsers leave "year 1" behind when no alarm time was found.
fn is_placeholder(ts: NaiveDateTime) -> bool {
    ts.year() <= 1
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let number = self.operation_number.as_deref().unwrap_or("");
        match self.timestamp {
            Some(ts) => write!(f, "({number}) {}", ts.format("%Y-%m-%d %H:%M:%S"))?,
            None => write!(f, "({number}) -")?,
        }
        let location = self.destination_location().to_string();
        if !location.is_empty() {
            write!(f, ", {location}")?;
        }
        Ok(())
    }
}
