use serde::Serialize;

/// A row dropped because its amount could not be parsed. Reported in the
/// run summary, never silently discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    /// 0-based index of the row in the input file (data rows, header excluded).
    pub row_index: usize,
    pub raw_amount: String,
}

/// Outcome of one normalization run over an input file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub input_rows: usize,
    pub accepted: usize,
    pub rejected: Vec<RejectedRow>,
    /// Rows kept with a null date because the raw value failed every format.
    pub unparseable_dates: usize,
}

impl RunSummary {
    pub fn has_rejections(&self) -> bool {
        !self.rejected.is_empty()
    }
}
