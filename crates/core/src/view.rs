use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::record::CanonicalRecord;

/// Identity of a derived view over the canonical record sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewKind {
    Master,
    Incoming,
    Outgoing,
    /// Records whose category equals this merchant label (case-insensitive).
    Merchant(String),
}

impl ViewKind {
    /// Sheet/file name used when the view is materialized.
    pub fn sheet_name(&self) -> &str {
        match self {
            ViewKind::Master => "Master",
            ViewKind::Incoming => "Incoming",
            ViewKind::Outgoing => "Outgoing",
            ViewKind::Merchant(label) => label,
        }
    }

    pub fn is_master(&self) -> bool {
        matches!(self, ViewKind::Master)
    }

    /// Membership predicate. Pure over (amount, category); zero-amount
    /// records belong to master only.
    pub fn includes(&self, record: &CanonicalRecord) -> bool {
        match self {
            ViewKind::Master => true,
            ViewKind::Incoming => record.amount > Decimal::ZERO,
            ViewKind::Outgoing => record.amount < Decimal::ZERO,
            ViewKind::Merchant(label) => record.category.eq_ignore_ascii_case(label),
        }
    }
}

/// A named, ordered subsequence of canonical records, held by index so the
/// record sequence stays the single source of truth.
#[derive(Debug, Clone)]
pub struct View {
    pub kind: ViewKind,
    indices: Vec<usize>,
}

impl View {
    pub fn project(kind: ViewKind, records: &[CanonicalRecord]) -> Self {
        let indices = records
            .iter()
            .enumerate()
            .filter(|(_, r)| kind.includes(r))
            .map(|(i, _)| i)
            .collect();
        Self { kind, indices }
    }

    pub fn records<'a>(
        &'a self,
        all: &'a [CanonicalRecord],
    ) -> impl Iterator<Item = &'a CanonicalRecord> + 'a {
        self.indices.iter().map(move |&i| &all[i])
    }

    pub fn master_rows(&self, all: &[CanonicalRecord]) -> Vec<u32> {
        self.records(all).map(|r| r.master_row).collect()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Project the standard views: master, incoming, outgoing, then one view per
/// merchant label, in that order.
pub fn project_views(records: &[CanonicalRecord], merchants: &[String]) -> Vec<View> {
    let mut views = vec![
        View::project(ViewKind::Master, records),
        View::project(ViewKind::Incoming, records),
        View::project(ViewKind::Outgoing, records),
    ];
    for label in merchants {
        views.push(View::project(ViewKind::Merchant(label.clone()), records));
    }
    views
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(master_row: u32, amount: &str, category: &str) -> CanonicalRecord {
        CanonicalRecord {
            master_row,
            date: NaiveDate::from_ymd_opt(2024, 3, master_row),
            amount: amount.parse().unwrap(),
            details: format!("TX {master_row}"),
            category: category.to_string(),
        }
    }

    #[test]
    fn master_keeps_every_record_in_order() {
        let records = vec![rec(1, "-4.50", "Expense"), rec(2, "2500.00", "Income")];
        let master = View::project(ViewKind::Master, &records);
        assert_eq!(master.master_rows(&records), vec![1, 2]);
    }

    #[test]
    fn zero_amount_is_in_master_but_neither_incoming_nor_outgoing() {
        let records = vec![
            rec(1, "0.00", "Uncategorized"),
            rec(2, "10.00", "Income"),
            rec(3, "-3.00", "Expense"),
        ];
        let incoming = View::project(ViewKind::Incoming, &records);
        let outgoing = View::project(ViewKind::Outgoing, &records);
        let master = View::project(ViewKind::Master, &records);

        assert_eq!(incoming.master_rows(&records), vec![2]);
        assert_eq!(outgoing.master_rows(&records), vec![3]);
        assert_eq!(master.master_rows(&records), vec![1, 2, 3]);
    }

    #[test]
    fn merchant_view_matches_category_case_insensitively() {
        let records = vec![
            rec(1, "-19.99", "eBay"),
            rec(2, "-5.00", "Dining"),
            rec(3, "-7.50", "EBAY"),
        ];
        let view = View::project(ViewKind::Merchant("ebay".into()), &records);
        assert_eq!(view.master_rows(&records), vec![1, 3]);
    }

    #[test]
    fn filtered_views_preserve_relative_order() {
        let records = vec![
            rec(1, "-1.00", "Expense"),
            rec(2, "2.00", "Income"),
            rec(3, "-3.00", "Expense"),
            rec(4, "4.00", "Income"),
        ];
        let outgoing = View::project(ViewKind::Outgoing, &records);
        assert_eq!(outgoing.master_rows(&records), vec![1, 3]);
        let incoming = View::project(ViewKind::Incoming, &records);
        assert_eq!(incoming.master_rows(&records), vec![2, 4]);
    }

    #[test]
    fn every_filtered_record_joins_back_to_exactly_one_master_record() {
        let records = vec![rec(1, "-1.00", "eBay"), rec(2, "2.00", "Income")];
        let views = project_views(&records, &["eBay".to_string()]);
        let master_rows: Vec<u32> = records.iter().map(|r| r.master_row).collect();
        for view in views.iter().filter(|v| !v.kind.is_master()) {
            for row in view.master_rows(&records) {
                assert_eq!(master_rows.iter().filter(|&&m| m == row).count(), 1);
            }
        }
    }

    #[test]
    fn project_views_yields_master_incoming_outgoing_then_merchants() {
        let records = vec![rec(1, "1.00", "Income")];
        let views = project_views(&records, &["eBay".to_string()]);
        let names: Vec<&str> = views.iter().map(|v| v.kind.sheet_name()).collect();
        assert_eq!(names, vec!["Master", "Incoming", "Outgoing", "eBay"]);
    }
}
