use thiserror::Error;

use tidybank_core::{CanonicalRecord, ColumnRole, ColumnRoleMap, RejectedRow, RunSummary};

use crate::csv::RawTable;
use crate::normalize::{parse_amount, parse_date, AmountOptions, DateOptions};
use crate::rules::CategoryEngine;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Role map has no amount column")]
    MissingAmountColumn,
}

#[derive(Debug)]
pub struct BuildOutput {
    pub records: Vec<CanonicalRecord>,
    pub summary: RunSummary,
}

/// Compose normalizers and categorizer into one canonical record per
/// accepted input row.
///
/// Rows whose amount fails to parse are rejected and reported, never
/// zeroed; accepted rows get contiguous 1-based master_row values in input
/// order. An unparseable date keeps the row with a null date and bumps the
/// warning count.
pub fn build_records(
    table: &RawTable,
    roles: &ColumnRoleMap,
    engine: &CategoryEngine,
    amount_opts: &AmountOptions,
    date_opts: &DateOptions,
) -> Result<BuildOutput, BuildError> {
    let amount_col = roles
        .column(ColumnRole::Amount)
        .ok_or(BuildError::MissingAmountColumn)?;
    let date_col = roles.column(ColumnRole::Date);
    let category_col = roles.column(ColumnRole::Category);

    let mut records = Vec::with_capacity(table.rows.len());
    let mut summary = RunSummary {
        input_rows: table.rows.len(),
        ..RunSummary::default()
    };

    for (row_index, row) in table.rows.iter().enumerate() {
        let raw_amount = row.get(amount_col).unwrap_or("");
        let amount = match parse_amount(raw_amount, amount_opts) {
            Ok(amount) => amount,
            Err(_) => {
                summary.rejected.push(RejectedRow {
                    row_index,
                    raw_amount: raw_amount.to_string(),
                });
                continue;
            }
        };

        let raw_date = date_col.and_then(|c| row.get(c)).unwrap_or("").trim();
        let date = parse_date(raw_date, roles.date_format.as_deref(), date_opts);
        if date.is_none() && !raw_date.is_empty() {
            summary.unparseable_dates += 1;
        }

        let details = combine_details(row, roles);
        let raw_category = category_col
            .and_then(|c| row.get(c))
            .map(str::trim)
            .unwrap_or("");
        let category = if raw_category.is_empty() {
            engine.categorize(&details, amount)
        } else {
            // The export's own label wins over the rule engine.
            raw_category.to_string()
        };

        records.push(CanonicalRecord {
            master_row: records.len() as u32 + 1,
            date,
            amount,
            details,
            category,
        });
    }

    summary.accepted = records.len();
    Ok(BuildOutput { records, summary })
}

/// Description plus memo when both exist and differ; a memo repeating the
/// description verbatim is dropped.
fn combine_details(row: &tidybank_core::RawRow, roles: &ColumnRoleMap) -> String {
    let description = roles
        .column(ColumnRole::Description)
        .and_then(|c| row.get(c))
        .unwrap_or("")
        .trim();
    let memo = roles
        .column(ColumnRole::Memo)
        .and_then(|c| row.get(c))
        .unwrap_or("")
        .trim();

    if memo.is_empty() || memo == description {
        description.to_string()
    } else if description.is_empty() {
        memo.to_string()
    } else {
        format!("{description} {memo}")
    }
}
