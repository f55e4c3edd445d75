//! Parsed request parameters and list-result metadata.

use crate::condition::Condition;

/// Output format of a list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
    Excel,
}

impl OutputFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "json" => Some(OutputFormat::Json),
            "csv" => Some(OutputFormat::Csv),
            "excel" => Some(OutputFormat::Excel),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Excel => "excel",
        }
    }
}

/// Everything a list query needs, decoupled from the URL syntax.
///
/// `limit == 0` means "all rows". `sorts` entries are storage names with an
/// optional ` DESC` suffix; condition fields are wire names.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectParams {
    pub format: OutputFormat,
    /// Projection whitelist of wire names; `None` selects all fields.
    pub fields: Option<Vec<String>>,
    pub conditions: Vec<Condition>,
    pub sorts: Vec<String>,
    pub limit: i64,
    pub offset: i64,
    /// Whether the caller wants the pre-paging total row count.
    pub include_total: bool,
    /// Positional arguments for a function-backed source.
    pub set_args: Vec<String>,
}

impl Default for SelectParams {
    fn default() -> Self {
        SelectParams {
            format: OutputFormat::Json,
            fields: None,
            conditions: Vec::new(),
            sorts: Vec::new(),
            limit: 0,
            offset: 0,
            include_total: false,
            set_args: Vec::new(),
        }
    }
}

/// Pre-paging row count of a list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalCount {
    pub value: i64,
    /// `true` when the value came from statistics or the planner rather
    /// than a real count.
    pub is_estimated: bool,
}

impl TotalCount {
    /// The count reported when no base table is known to count against.
    pub fn unknown() -> Self {
        TotalCount {
            value: 0,
            is_estimated: true,
        }
    }
}
