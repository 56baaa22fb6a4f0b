//! Entry model

use crate::error::{Error, Result};
use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for an entry, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Create a new unique entry ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The closed set of entry kinds for this deployment.
///
/// Serialized on the wire under the `type` key, lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Income,
    Payment,
    Debt,
    Receivable,
}

impl EntryKind {
    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Payment => "payment",
            Self::Debt => "debt",
            Self::Receivable => "receivable",
        }
    }

    /// Normalize a free-text type column into the closed kind set.
    ///
    /// Exact wire names match first, then prefix rules carried over from the
    /// spreadsheet import (`ing*` income, `pag*`/`gas*` payment, `deu*` debt,
    /// `cob*` receivable). Anything else falls back to `Payment`.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        let text = raw.trim().to_lowercase();
        if let Ok(kind) = text.parse() {
            return kind;
        }
        if text.starts_with("ing") || text.starts_with("inc") {
            Self::Income
        } else if text.starts_with("deu") || text.starts_with("deb") {
            Self::Debt
        } else if text.starts_with("cob") || text.starts_with("rec") {
            Self::Receivable
        } else {
            // pag*/gas*/pay* and everything unrecognized
            Self::Payment
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "income" => Ok(Self::Income),
            "payment" => Ok(Self::Payment),
            "debt" => Ok(Self::Debt),
            "receivable" => Ok(Self::Receivable),
            other => Err(Error::InvalidInput(format!("Unknown entry type '{other}'"))),
        }
    }
}

/// A single financial record.
///
/// `updated_at` (epoch milliseconds) is the sole reconciliation tie-breaker;
/// every local mutation replaces the entry wholesale with a fresh timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Unique identifier, stable across merges
    pub id: EntryId,
    /// Entry kind (`type` on the wire)
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Non-negative magnitude, currency-agnostic
    pub amount: Decimal,
    /// Debt original principal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Decimal>,
    /// Effective date of the entry
    pub date: NaiveDate,
    /// Date a scheduled obligation falls due (debts/receivables)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub who: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub account: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tags: String,
    /// Last update timestamp (Unix ms); absent on the wire reads as 0
    #[serde(default)]
    pub updated_at: i64,
}

impl Entry {
    /// Create a new entry with a fresh id and `updated_at = now`
    #[must_use]
    pub fn new(kind: EntryKind, amount: Decimal, date: NaiveDate) -> Self {
        Self {
            id: EntryId::new(),
            kind,
            amount,
            principal: None,
            date,
            due_date: None,
            note: String::new(),
            who: String::new(),
            category: String::new(),
            account: String::new(),
            tags: String::new(),
            updated_at: now_ms(),
        }
    }

    #[must_use]
    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    #[must_use]
    pub fn with_who(mut self, who: impl Into<String>) -> Self {
        self.who = who.into();
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    #[must_use]
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = account.into();
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }

    /// Stamp the entry as locally mutated now.
    pub fn touch(&mut self) {
        self.updated_at = now_ms();
    }
}

/// Current time as epoch milliseconds.
#[must_use]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Split a debt of `total` into `installments` monthly debt entries starting
/// at `first_due`.
///
/// Each installment is `floor(total / installments)`; the remainder lands on
/// the last one. Due dates advance one month at a time, clamped to the last
/// day of shorter months (Jan 31 -> Feb 28/29).
pub fn debt_installments(
    total: Decimal,
    installments: u32,
    first_due: NaiveDate,
) -> Result<Vec<Entry>> {
    if installments == 0 {
        return Err(Error::InvalidInput(
            "Installment count must be at least 1".to_string(),
        ));
    }
    if total <= Decimal::ZERO {
        return Err(Error::InvalidInput(
            "Debt amount must be positive".to_string(),
        ));
    }

    let count = Decimal::from(installments);
    let base = (total / count).floor();
    let remainder = total - base * count;

    let mut entries = Vec::with_capacity(installments as usize);
    for i in 0..installments {
        let part = if i == installments - 1 {
            base + remainder
        } else {
            base
        };
        let due = first_due
            .checked_add_months(Months::new(i))
            .ok_or_else(|| Error::InvalidInput("Due date out of range".to_string()))?;
        entries.push(
            Entry::new(EntryKind::Debt, part, due)
                .with_due_date(due),
        );
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_entry_id_unique() {
        let id1 = EntryId::new();
        let id2 = EntryId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_entry_id_parse() {
        let id = EntryId::new();
        let parsed: EntryId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_entry_new_stamps_updated_at() {
        let entry = Entry::new(EntryKind::Income, Decimal::from(50), date(2024, 3, 1));
        assert!(entry.updated_at > 0);
        assert_eq!(entry.kind, EntryKind::Income);
        assert!(entry.note.is_empty());
    }

    #[test]
    fn test_kind_normalize_prefixes() {
        assert_eq!(EntryKind::normalize("ingreso"), EntryKind::Income);
        assert_eq!(EntryKind::normalize("Ingresos "), EntryKind::Income);
        assert_eq!(EntryKind::normalize("income"), EntryKind::Income);
        assert_eq!(EntryKind::normalize("pago"), EntryKind::Payment);
        assert_eq!(EntryKind::normalize("gasto"), EntryKind::Payment);
        assert_eq!(EntryKind::normalize("deuda"), EntryKind::Debt);
        assert_eq!(EntryKind::normalize("cobro"), EntryKind::Receivable);
        assert_eq!(EntryKind::normalize("???"), EntryKind::Payment);
    }

    #[test]
    fn test_kind_from_str_rejects_unknown() {
        assert!("income".parse::<EntryKind>().is_ok());
        assert!("ingreso".parse::<EntryKind>().is_err());
    }

    #[test]
    fn test_wire_shape_camel_case() {
        let entry = Entry {
            id: "018f2f48-0000-7000-8000-000000000001".parse().unwrap(),
            kind: EntryKind::Debt,
            amount: Decimal::from(120),
            principal: Some(Decimal::from(360)),
            date: date(2024, 1, 15),
            due_date: Some(date(2024, 2, 15)),
            note: "cable".to_string(),
            who: String::new(),
            category: String::new(),
            account: String::new(),
            tags: String::new(),
            updated_at: 1_700_000_000_000,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"type\":\"debt\""));
        assert!(json.contains("\"dueDate\":\"2024-02-15\""));
        assert!(json.contains("\"updatedAt\":1700000000000"));
        assert!(!json.contains("\"who\""));
    }

    #[test]
    fn test_wire_shape_defaults_on_missing_fields() {
        let json = r#"{"id":"018f2f48-0000-7000-8000-000000000002","type":"income","amount":10,"date":"2024-05-01"}"#;
        let entry: Entry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.updated_at, 0);
        assert!(entry.note.is_empty());
        assert!(entry.due_date.is_none());
    }

    #[test]
    fn test_debt_installments_remainder_on_last() {
        let parts = debt_installments(Decimal::from(100), 3, date(2024, 1, 15)).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].amount, Decimal::from(33));
        assert_eq!(parts[1].amount, Decimal::from(33));
        assert_eq!(parts[2].amount, Decimal::from(34));
        assert_eq!(parts[0].due_date, Some(date(2024, 1, 15)));
        assert_eq!(parts[1].due_date, Some(date(2024, 2, 15)));
        assert_eq!(parts[2].due_date, Some(date(2024, 3, 15)));
        // effective date tracks the due date
        assert_eq!(parts[2].date, date(2024, 3, 15));
        assert!(parts.iter().all(|e| e.kind == EntryKind::Debt));
    }

    #[test]
    fn test_debt_installments_clamp_to_month_end() {
        let parts = debt_installments(Decimal::from(90), 3, date(2024, 1, 31)).unwrap();
        assert_eq!(parts[0].due_date, Some(date(2024, 1, 31)));
        assert_eq!(parts[1].due_date, Some(date(2024, 2, 29)));
        assert_eq!(parts[2].due_date, Some(date(2024, 3, 31)));
    }

    #[test]
    fn test_debt_installments_rejects_bad_input() {
        assert!(debt_installments(Decimal::from(100), 0, date(2024, 1, 1)).is_err());
        assert!(debt_installments(Decimal::ZERO, 2, date(2024, 1, 1)).is_err());
    }
}
