use tidybank_core::{CanonicalRecord, View, ViewKind};

/// Canonical column order for every materialized view.
pub const BASE_HEADER: [&str; 4] = ["Date", "Amount", "Details", "Category"];
pub const SOURCE_HEADER: &str = "Source";
/// Sheets are 1-indexed and carry one header row above the data.
pub const HEADER_ROWS: u32 = 1;

/// How the Source back-reference is rendered. The join key itself
/// (master_row) is the data-model guarantee; formula-vs-text is purely a
/// rendering choice of the output target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStyle {
    /// Live reference the remote store re-evaluates (`=Master!A2`).
    Formula,
    /// Static text for offline snapshots (`Master!A2`).
    PlainText,
}

/// Cell address of a record's row in the master sheet.
pub fn source_reference(master_row: u32) -> String {
    format!("Master!A{}", master_row + HEADER_ROWS)
}

pub fn header_for(kind: &ViewKind) -> Vec<String> {
    let mut header: Vec<String> = BASE_HEADER.iter().map(|s| s.to_string()).collect();
    if !kind.is_master() {
        header.push(SOURCE_HEADER.to_string());
    }
    header
}

fn render_record(record: &CanonicalRecord, kind: &ViewKind, style: SourceStyle) -> Vec<String> {
    let mut cells = vec![
        record.date.map(|d| d.to_string()).unwrap_or_default(),
        record.amount.to_string(),
        record.details.clone(),
        record.category.clone(),
    ];
    if !kind.is_master() {
        let reference = source_reference(record.master_row);
        cells.push(match style {
            SourceStyle::Formula => format!("={reference}"),
            SourceStyle::PlainText => reference,
        });
    }
    cells
}

/// Render a view as (header, data rows), records in master_row order.
pub fn render_view(
    view: &View,
    records: &[CanonicalRecord],
    style: SourceStyle,
) -> (Vec<String>, Vec<Vec<String>>) {
    let header = header_for(&view.kind);
    let rows = view
        .records(records)
        .map(|r| render_record(r, &view.kind, style))
        .collect();
    (header, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn records() -> Vec<CanonicalRecord> {
        vec![
            CanonicalRecord {
                master_row: 1,
                date: NaiveDate::from_ymd_opt(2024, 3, 1),
                amount: Decimal::new(-450, 2),
                details: "COFFEE SHOP".into(),
                category: "Expense".into(),
            },
            CanonicalRecord {
                master_row: 2,
                date: None,
                amount: Decimal::new(-1999, 2),
                details: "EBAY PURCHASE".into(),
                category: "eBay".into(),
            },
        ]
    }

    #[test]
    fn master_view_has_no_source_column() {
        let records = records();
        let view = View::project(ViewKind::Master, &records);
        let (header, rows) = render_view(&view, &records, SourceStyle::Formula);
        assert_eq!(header, vec!["Date", "Amount", "Details", "Category"]);
        assert_eq!(rows[0], vec!["2024-03-01", "-4.50", "COFFEE SHOP", "Expense"]);
    }

    #[test]
    fn filtered_view_source_points_past_the_header_row() {
        let records = records();
        let view = View::project(ViewKind::Merchant("eBay".into()), &records);
        let (header, rows) = render_view(&view, &records, SourceStyle::Formula);
        assert_eq!(header.last().map(String::as_str), Some("Source"));
        // master_row 2 lands on sheet row 3.
        assert_eq!(rows[0].last().map(String::as_str), Some("=Master!A3"));
    }

    #[test]
    fn plain_text_source_drops_the_equals_sign() {
        let records = records();
        let view = View::project(ViewKind::Outgoing, &records);
        let (_, rows) = render_view(&view, &records, SourceStyle::PlainText);
        assert_eq!(rows[0].last().map(String::as_str), Some("Master!A2"));
    }

    #[test]
    fn null_date_renders_as_empty_cell() {
        let records = records();
        let view = View::project(ViewKind::Master, &records);
        let (_, rows) = render_view(&view, &records, SourceStyle::Formula);
        assert_eq!(rows[1][0], "");
    }
}
