//! Spreadsheet CSV import
//!
//! Header-mapped and tolerant: column order is free, header names match a
//! small alias table (English and Spanish), the type column goes through
//! prefix normalization, missing ids get fresh ones, and a missing date
//! falls back to the due date and then to today. Rows without a readable
//! amount are skipped.

use crate::error::Result;
use crate::models::{now_ms, Entry, EntryId, EntryKind};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Column roles recognized in an imported sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Column {
    Id,
    Kind,
    Amount,
    Principal,
    Date,
    DueDate,
    Note,
    Who,
    Category,
    Account,
    Tags,
    UpdatedAt,
}

fn column_for(header: &str) -> Option<Column> {
    let key: String = header
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();

    match key.as_str() {
        "id" => Some(Column::Id),
        "type" | "tipo" => Some(Column::Kind),
        "amount" | "monto" | "importe" => Some(Column::Amount),
        "principal" | "capital" => Some(Column::Principal),
        "date" | "fecha" => Some(Column::Date),
        "duedate" | "vence" | "vencimiento" => Some(Column::DueDate),
        "note" | "nota" | "detalle" => Some(Column::Note),
        "who" | "quien" => Some(Column::Who),
        "category" | "categoria" => Some(Column::Category),
        "account" | "cuenta" => Some(Column::Account),
        "tags" | "etiquetas" => Some(Column::Tags),
        "updatedat" => Some(Column::UpdatedAt),
        _ => None,
    }
}

fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    raw.parse()
        .ok()
        .or_else(|| NaiveDate::parse_from_str(raw, "%d/%m/%Y").ok())
}

/// Parse CSV text into entries.
///
/// Imported rows are meant to be upserted; rows without an `updatedAt`
/// column value are stamped with the current time.
pub fn entries_from_csv(data: &str) -> Result<Vec<Entry>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data.as_bytes());

    let columns: HashMap<Column, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .filter_map(|(index, header)| column_for(header).map(|column| (column, index)))
        .collect();

    let field = |record: &csv::StringRecord, column: Column| -> String {
        columns
            .get(&column)
            .and_then(|&index| record.get(index))
            .unwrap_or_default()
            .trim()
            .to_string()
    };

    let mut entries = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;

        let Some(amount) = parse_amount(&field(&record, Column::Amount)) else {
            tracing::warn!(row = row + 2, "Skipping row without a readable amount");
            continue;
        };

        let kind = EntryKind::normalize(&field(&record, Column::Kind));
        let due_date = parse_date(&field(&record, Column::DueDate));
        let date = parse_date(&field(&record, Column::Date))
            .or(due_date)
            .unwrap_or_else(|| chrono::Utc::now().date_naive());

        let id = field(&record, Column::Id)
            .parse::<EntryId>()
            .unwrap_or_default();
        let updated_at = field(&record, Column::UpdatedAt)
            .parse::<i64>()
            .unwrap_or_else(|_| now_ms());

        entries.push(Entry {
            id,
            kind,
            amount,
            principal: parse_amount(&field(&record, Column::Principal)),
            date,
            due_date,
            note: field(&record, Column::Note),
            who: field(&record, Column::Who),
            category: field(&record, Column::Category),
            account: field(&record, Column::Account),
            tags: field(&record, Column::Tags),
            updated_at,
        });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_import_header_mapped_any_order() {
        let data = "date,amount,type,note\n2024-05-01,12.50,income,salary\n";
        let entries = entries_from_csv(data).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::Income);
        assert_eq!(entries[0].amount, "12.50".parse().unwrap());
        assert_eq!(entries[0].note, "salary");
        assert_eq!(
            entries[0].date,
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
        );
    }

    #[test]
    fn test_import_spanish_headers_and_type_prefixes() {
        let data = "fecha,monto,tipo,cuenta\n2024-05-01,100,Ingreso,Banco\n2024-05-02,30,gasto,\n";
        let entries = entries_from_csv(data).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, EntryKind::Income);
        assert_eq!(entries[0].account, "Banco");
        assert_eq!(entries[1].kind, EntryKind::Payment);
    }

    #[test]
    fn test_import_missing_id_gets_fresh_one() {
        let data = "id,date,amount,type\n,2024-05-01,5,payment\nnot-a-uuid,2024-05-01,6,payment\n";
        let entries = entries_from_csv(data).unwrap();
        assert_eq!(entries.len(), 2);
        assert_ne!(entries[0].id, entries[1].id);
    }

    #[test]
    fn test_import_keeps_provided_id_and_timestamp() {
        let data = "id,date,amount,type,updatedAt\n018f2f48-0000-7000-8000-000000000001,2024-05-01,5,payment,42\n";
        let entries = entries_from_csv(data).unwrap();
        assert_eq!(
            entries[0].id.as_str(),
            "018f2f48-0000-7000-8000-000000000001"
        );
        assert_eq!(entries[0].updated_at, 42);
    }

    #[test]
    fn test_import_missing_date_falls_back_to_due_date() {
        let data = "date,dueDate,amount,type\n,2024-06-15,80,deuda\n";
        let entries = entries_from_csv(data).unwrap();
        assert_eq!(entries[0].kind, EntryKind::Debt);
        assert_eq!(
            entries[0].date,
            NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
        );
        assert_eq!(entries[0].due_date, entries[0].date.into());
    }

    #[test]
    fn test_import_skips_rows_without_amount() {
        let data = "date,amount,type\n2024-05-01,abc,payment\n2024-05-02,10,payment\n";
        let entries = entries_from_csv(data).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, Decimal::from(10));
    }

    #[test]
    fn test_import_strips_currency_symbols() {
        let data = "date,amount,type\n2024-05-01,\"$1,250.75\",payment\n";
        let entries = entries_from_csv(data).unwrap();
        assert_eq!(entries[0].amount, "1250.75".parse().unwrap());
    }

    #[test]
    fn test_import_slash_dates() {
        let data = "date,amount,type\n15/01/2024,10,payment\n";
        let entries = entries_from_csv(data).unwrap();
        assert_eq!(
            entries[0].date,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
    }
}
