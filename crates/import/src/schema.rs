use std::collections::HashSet;
use thiserror::Error;

use tidybank_core::{
    ColumnRole, ColumnRoleMap, Resolution, ResolutionRequest, Resolver, RoleCandidate,
};

use crate::csv::RawTable;
use crate::normalize::{self, AmountOptions, DateOptions, FALLBACK_FORMATS};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Could not assign required role '{0}' above the confidence threshold")]
    Ambiguous(ColumnRole),
}

/// Thresholds and sampling depth for role inference. Header-name hints are
/// a bonus on top of value-shape scores, never a sole basis.
#[derive(Debug, Clone)]
pub struct InferenceOptions {
    pub leading_sample: usize,
    pub interior_sample: usize,
    pub date_threshold: f32,
    pub amount_threshold: f32,
    pub category_threshold: f32,
    pub text_threshold: f32,
    pub header_hint_bonus: f32,
    pub amount_opts: AmountOptions,
    pub date_opts: DateOptions,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            leading_sample: 20,
            interior_sample: 5,
            date_threshold: 0.6,
            amount_threshold: 0.6,
            category_threshold: 0.5,
            text_threshold: 0.2,
            header_hint_bonus: 0.15,
            amount_opts: AmountOptions::default(),
            date_opts: DateOptions::default(),
        }
    }
}

const DATE_HINTS: &[&str] = &["date", "trans", "time", "posted"];
const DESCRIPTION_HINTS: &[&str] = &["description", "desc", "details", "payee", "merchant"];
const AMOUNT_HINTS: &[&str] = &["amount", "amt", "value", "debit", "credit"];
const CATEGORY_HINTS: &[&str] = &["category", "cat", "type", "class"];
const MEMO_HINTS: &[&str] = &["note", "memo", "reference", "ref"];

fn hint_bonus(header: &str, hints: &[&str], bonus: f32) -> f32 {
    let h = header.to_lowercase();
    if hints.iter().any(|term| h.contains(term)) {
        bonus
    } else {
        0.0
    }
}

/// Value-shape statistics for one column over the sampled rows.
#[derive(Debug, Clone, Default)]
struct ColumnStats {
    non_empty: usize,
    date_fraction: f32,
    winning_format: Option<&'static str>,
    amount_fraction: f32,
    mixed_signs: bool,
    avg_len: f32,
    distinct_ratio: f32,
}

fn sample_indices(row_count: usize, opts: &InferenceOptions) -> Vec<usize> {
    let leading = opts.leading_sample.min(row_count);
    let mut indices: Vec<usize> = (0..leading).collect();
    if row_count > leading && opts.interior_sample > 0 {
        let span = row_count - leading;
        for k in 1..=opts.interior_sample {
            let idx = leading + k * span / (opts.interior_sample + 1);
            if idx < row_count && !indices.contains(&idx) {
                indices.push(idx);
            }
        }
    }
    indices
}

fn collect_stats(table: &RawTable, column: usize, samples: &[usize], opts: &InferenceOptions) -> ColumnStats {
    let mut stats = ColumnStats::default();
    let mut date_hits_any = 0usize;
    let mut format_hits = [0usize; FALLBACK_FORMATS.len()];
    let mut amount_hits = 0usize;
    let mut saw_positive = false;
    let mut saw_negative = false;
    let mut total_len = 0usize;
    let mut distinct: HashSet<String> = HashSet::new();

    for &row_idx in samples {
        let value = table.rows[row_idx].get(column).unwrap_or("").trim();
        if value.is_empty() {
            continue;
        }
        stats.non_empty += 1;
        total_len += value.chars().count();
        distinct.insert(value.to_lowercase());

        let mut any_format = false;
        for (i, fmt) in FALLBACK_FORMATS.iter().enumerate() {
            if normalize::parse_with(value, fmt, &opts.date_opts).is_some() {
                format_hits[i] += 1;
                any_format = true;
            }
        }
        if any_format {
            date_hits_any += 1;
        }

        if let Ok(amount) = normalize::parse_amount(value, &opts.amount_opts) {
            amount_hits += 1;
            if amount.is_sign_negative() && !amount.is_zero() {
                saw_negative = true;
            } else if !amount.is_zero() {
                saw_positive = true;
            }
        }
    }

    if stats.non_empty > 0 {
        let n = stats.non_empty as f32;
        stats.date_fraction = date_hits_any as f32 / n;
        stats.amount_fraction = amount_hits as f32 / n;
        stats.mixed_signs = saw_positive && saw_negative;
        stats.avg_len = total_len as f32 / n;
        stats.distinct_ratio = distinct.len() as f32 / n;
        // Ties go to the earlier format in the list (US-style first).
        let mut best: Option<(usize, usize)> = None;
        for (i, &hits) in format_hits.iter().enumerate() {
            if hits > 0 && best.map_or(true, |(_, b)| hits > b) {
                best = Some((i, hits));
            }
        }
        stats.winning_format = best.map(|(i, _)| FALLBACK_FORMATS[i]);
    }
    stats
}

// Date/amount scores are rankings, not probabilities; bonuses may push
// them past 1.0 so they can break ties between fully-parsing columns.

fn date_score(stats: &ColumnStats, header: &str, opts: &InferenceOptions) -> f32 {
    if stats.non_empty == 0 {
        return 0.0;
    }
    stats.date_fraction + hint_bonus(header, DATE_HINTS, opts.header_hint_bonus)
}

fn amount_score(stats: &ColumnStats, header: &str, opts: &InferenceOptions) -> f32 {
    if stats.non_empty == 0 || stats.amount_fraction == 0.0 {
        return 0.0;
    }
    // Bank exports encode direction in sign, so a mixed-sign column outranks
    // an all-positive one.
    let sign_bonus = if stats.mixed_signs { 0.15 } else { 0.0 };
    stats.amount_fraction + sign_bonus + hint_bonus(header, AMOUNT_HINTS, opts.header_hint_bonus)
}

fn text_score(stats: &ColumnStats, header: &str, hints: &[&str], opts: &InferenceOptions) -> f32 {
    if stats.non_empty == 0 || stats.date_fraction > 0.5 || stats.amount_fraction > 0.5 {
        return 0.0;
    }
    let len_score = stats.avg_len / (stats.avg_len + 15.0);
    (len_score + hint_bonus(header, hints, opts.header_hint_bonus)).min(1.0)
}

fn category_score(stats: &ColumnStats, header: &str, opts: &InferenceOptions) -> f32 {
    if stats.non_empty < 3 || stats.avg_len > 24.0 {
        return hint_bonus(header, CATEGORY_HINTS, opts.header_hint_bonus);
    }
    if stats.date_fraction > 0.5 || stats.amount_fraction > 0.5 {
        return 0.0;
    }
    ((1.0 - stats.distinct_ratio)
        + hint_bonus(header, CATEGORY_HINTS, opts.header_hint_bonus))
    .min(1.0)
}

#[derive(Debug, Clone)]
struct Candidate {
    role: ColumnRole,
    column: usize,
    confidence: f32,
}

/// Infer a role map from column names and sampled row values.
///
/// Scoring is per (role, column); assignment is greedy, highest confidence
/// first across all roles, with mutually exclusive column claims. Required
/// roles that stay below threshold go to the resolution channel; a skip
/// there is a schema ambiguity for the whole run.
pub fn infer_roles(
    table: &RawTable,
    opts: &InferenceOptions,
    resolver: &mut dyn Resolver,
) -> Result<ColumnRoleMap, SchemaError> {
    let samples = sample_indices(table.rows.len(), opts);
    let stats: Vec<ColumnStats> = (0..table.column_count())
        .map(|col| collect_stats(table, col, &samples, opts))
        .collect();

    let threshold = |role: ColumnRole| match role {
        ColumnRole::Date => opts.date_threshold,
        ColumnRole::Amount => opts.amount_threshold,
        ColumnRole::Category => opts.category_threshold,
        ColumnRole::Description | ColumnRole::Memo => opts.text_threshold,
    };

    let score = |role: ColumnRole, col: usize| -> f32 {
        let header = table.column_name(col);
        match role {
            ColumnRole::Date => date_score(&stats[col], header, opts),
            ColumnRole::Amount => amount_score(&stats[col], header, opts),
            ColumnRole::Description => text_score(&stats[col], header, DESCRIPTION_HINTS, opts),
            ColumnRole::Category => category_score(&stats[col], header, opts),
            ColumnRole::Memo => text_score(&stats[col], header, MEMO_HINTS, opts),
        }
    };

    // Memo is resolved after description so "second, shorter text column"
    // is well defined.
    let greedy_roles = [
        ColumnRole::Date,
        ColumnRole::Amount,
        ColumnRole::Description,
        ColumnRole::Category,
    ];
    let mut candidates: Vec<Candidate> = Vec::new();
    for &role in &greedy_roles {
        for col in 0..table.column_count() {
            let confidence = score(role, col);
            if confidence >= threshold(role) {
                candidates.push(Candidate { role, column: col, confidence });
            }
        }
    }
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.column.cmp(&b.column))
    });

    let mut map = ColumnRoleMap::new();
    for cand in &candidates {
        if map.column(cand.role).is_none() && !map.is_claimed(cand.column) {
            // Both sides checked free; assign cannot fail.
            let _ = map.assign(cand.role, cand.column);
        }
    }

    if let Some(desc_col) = map.column(ColumnRole::Description) {
        let desc_len = stats[desc_col].avg_len;
        let memo = (0..table.column_count())
            .filter(|&col| !map.is_claimed(col) && stats[col].avg_len < desc_len)
            .map(|col| (col, score(ColumnRole::Memo, col)))
            .filter(|(_, s)| *s >= opts.text_threshold)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        if let Some((col, _)) = memo {
            let _ = map.assign(ColumnRole::Memo, col);
        }
    }

    // Required roles fall back to the confirmation channel.
    for role in [ColumnRole::Date, ColumnRole::Amount] {
        if map.column(role).is_some() {
            continue;
        }
        let mut unclaimed: Vec<RoleCandidate> = (0..table.column_count())
            .filter(|&col| !map.is_claimed(col))
            .map(|col| RoleCandidate {
                column: col,
                name: table.column_name(col).to_string(),
                confidence: score(role, col),
            })
            .collect();
        unclaimed.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let request = ResolutionRequest::Role { role, candidates: unclaimed };
        match resolver.resolve(&request) {
            Resolution::Column(col) if col < table.column_count() => {
                // An explicit answer displaces an optional role's claim on
                // the column; required claims are never displaced.
                if let Some(owner) = map.role_of(col) {
                    if owner.is_required() {
                        return Err(SchemaError::Ambiguous(role));
                    }
                    map.unassign(owner);
                }
                let _ = map.assign(role, col);
            }
            _ => return Err(SchemaError::Ambiguous(role)),
        }
    }

    if let Some(col) = map.column(ColumnRole::Date) {
        map.date_format = stats[col].winning_format.map(str::to_string);
    }

    Ok(map)
}
