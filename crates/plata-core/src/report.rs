//! Summary and period reports

use crate::error::{Error, Result};
use crate::models::{Entry, EntryKind};
use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Account label used when an entry has no account set
const DEFAULT_ACCOUNT: &str = "Otros";

/// Totals per kind over an entry set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub income: Decimal,
    pub payments: Decimal,
    pub debts: Decimal,
    pub receivables: Decimal,
    pub count: usize,
}

impl Summary {
    /// Income minus payments
    #[must_use]
    pub fn balance(&self) -> Decimal {
        self.income - self.payments
    }
}

/// Compute totals per kind.
#[must_use]
pub fn summarize(entries: &[Entry]) -> Summary {
    let mut summary = Summary {
        count: entries.len(),
        ..Summary::default()
    };
    for entry in entries {
        match entry.kind {
            EntryKind::Income => summary.income += entry.amount,
            EntryKind::Payment => summary.payments += entry.amount,
            EntryKind::Debt => summary.debts += entry.amount,
            EntryKind::Receivable => summary.receivables += entry.amount,
        }
    }
    summary
}

/// Per-account balance: income adds, payments subtract.
///
/// Entries without an account group under "Otros". Debts and receivables
/// don't move account balances until they are settled as payments/income.
#[must_use]
pub fn account_balances(entries: &[Entry]) -> BTreeMap<String, Decimal> {
    let mut balances = BTreeMap::new();
    for entry in entries {
        let delta = match entry.kind {
            EntryKind::Income => entry.amount,
            EntryKind::Payment => -entry.amount,
            EntryKind::Debt | EntryKind::Receivable => continue,
        };
        let account = if entry.account.is_empty() {
            DEFAULT_ACCOUNT.to_string()
        } else {
            entry.account.clone()
        };
        *balances.entry(account).or_insert(Decimal::ZERO) += delta;
    }
    balances
}

/// Report grouping granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

impl Period {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
        }
    }

    /// Start of the period containing `date` (weeks start on Monday)
    fn start_of(self, date: NaiveDate) -> NaiveDate {
        match self {
            Self::Daily => date,
            Self::Weekly => {
                date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
            }
            Self::Monthly => date.with_day(1).unwrap_or(date),
            Self::Quarterly => {
                let quarter_month = ((date.month0() / 3) * 3) + 1;
                date.with_day(1)
                    .and_then(|d| d.with_month(quarter_month))
                    .unwrap_or(date)
            }
        }
    }

    /// Human key for the period starting at `start`
    fn key_of(self, start: NaiveDate) -> String {
        match self {
            Self::Daily => start.to_string(),
            Self::Weekly => format!("W{start}"),
            Self::Monthly => format!("{:04}-{:02}", start.year(), start.month()),
            Self::Quarterly => format!("{:04}-Q{}", start.year(), start.month0() / 3 + 1),
        }
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "day" => Ok(Self::Daily),
            "weekly" | "week" => Ok(Self::Weekly),
            "monthly" | "month" => Ok(Self::Monthly),
            "quarterly" | "quarter" => Ok(Self::Quarterly),
            other => Err(Error::InvalidInput(format!("Unknown period '{other}'"))),
        }
    }
}

/// One row of a period report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodRow {
    pub key: String,
    pub start: NaiveDate,
    pub income: Decimal,
    pub payments: Decimal,
    pub debts: Decimal,
    pub balance: Decimal,
    pub count: usize,
}

/// Group entries by period of their effective date, newest period first.
#[must_use]
pub fn period_report(entries: &[Entry], period: Period) -> Vec<PeriodRow> {
    let mut groups: BTreeMap<NaiveDate, PeriodRow> = BTreeMap::new();

    for entry in entries {
        let start = period.start_of(entry.date);
        let row = groups.entry(start).or_insert_with(|| PeriodRow {
            key: period.key_of(start),
            start,
            income: Decimal::ZERO,
            payments: Decimal::ZERO,
            debts: Decimal::ZERO,
            balance: Decimal::ZERO,
            count: 0,
        });
        match entry.kind {
            EntryKind::Income => row.income += entry.amount,
            EntryKind::Payment => row.payments += entry.amount,
            EntryKind::Debt => row.debts += entry.amount,
            EntryKind::Receivable => {}
        }
        row.count += 1;
    }

    let mut rows: Vec<PeriodRow> = groups.into_values().collect();
    for row in &mut rows {
        row.balance = row.income - row.payments;
    }
    rows.reverse();
    rows
}

/// Debts ordered by due date (entries without one sort by effective date).
#[must_use]
pub fn debt_schedule(entries: &[Entry]) -> Vec<Entry> {
    let mut debts: Vec<Entry> = entries
        .iter()
        .filter(|e| e.kind == EntryKind::Debt)
        .cloned()
        .collect();
    debts.sort_by_key(|e| e.due_date.unwrap_or(e.date));
    debts
}
