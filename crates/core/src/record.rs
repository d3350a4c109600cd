use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Semantic meaning assigned to a raw input column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnRole {
    Date,
    Description,
    Amount,
    Category,
    Memo,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 5] = [
        ColumnRole::Date,
        ColumnRole::Description,
        ColumnRole::Amount,
        ColumnRole::Category,
        ColumnRole::Memo,
    ];

    /// Date and amount must be assigned before any canonical record can be
    /// built; the other roles degrade gracefully when absent.
    pub fn is_required(self) -> bool {
        matches!(self, ColumnRole::Date | ColumnRole::Amount)
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRole::Date => write!(f, "date"),
            ColumnRole::Description => write!(f, "description"),
            ColumnRole::Amount => write!(f, "amount"),
            ColumnRole::Category => write!(f, "category"),
            ColumnRole::Memo => write!(f, "memo"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RoleMapError {
    #[error("role '{0}' is already assigned")]
    RoleTaken(ColumnRole),
    #[error("column {0} is already claimed by role '{1}'")]
    ColumnTaken(usize, ColumnRole),
}

/// Role → column-index assignments for one input file.
///
/// Each role maps to at most one column and each column to at most one role;
/// `assign` rejects violations instead of overwriting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnRoleMap {
    assignments: Vec<(ColumnRole, usize)>,
    /// Date format that won during schema sampling, tried first by the
    /// date normalizer.
    pub date_format: Option<String>,
}

impl ColumnRoleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, role: ColumnRole, column: usize) -> Result<(), RoleMapError> {
        if self.column(role).is_some() {
            return Err(RoleMapError::RoleTaken(role));
        }
        if let Some(owner) = self.role_of(column) {
            return Err(RoleMapError::ColumnTaken(column, owner));
        }
        self.assignments.push((role, column));
        Ok(())
    }

    /// Remove a role's claim, returning the column it held.
    pub fn unassign(&mut self, role: ColumnRole) -> Option<usize> {
        let pos = self.assignments.iter().position(|(r, _)| *r == role)?;
        Some(self.assignments.remove(pos).1)
    }

    pub fn column(&self, role: ColumnRole) -> Option<usize> {
        self.assignments
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, c)| *c)
    }

    pub fn role_of(&self, column: usize) -> Option<ColumnRole> {
        self.assignments
            .iter()
            .find(|(_, c)| *c == column)
            .map(|(r, _)| *r)
    }

    pub fn is_claimed(&self, column: usize) -> bool {
        self.role_of(column).is_some()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// One input line, cells in original column order. Immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    cells: Vec<String>,
}

impl RawRow {
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells }
    }

    pub fn get(&self, column: usize) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }
}

impl From<Vec<String>> for RawRow {
    fn from(cells: Vec<String>) -> Self {
        Self::new(cells)
    }
}

/// The normalized, schema-independent representation of one transaction.
///
/// `master_row` is the stable 1-based join key linking filtered-view rows
/// back to the master view; it is assigned once and never renumbered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub master_row: u32,
    pub date: Option<NaiveDate>,
    pub amount: Decimal,
    pub details: String,
    pub category: String,
}

impl CanonicalRecord {
    pub fn is_credit(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_debit(&self) -> bool {
        self.amount < Decimal::ZERO
    }
}
