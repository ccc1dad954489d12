use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const FIELD_DATE: &str = "date";
pub const FIELD_AMOUNT: &str = "amount";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_CATEGORY: &str = "category";
pub const FIELD_TYPE: &str = "type";
pub const FIELD_MERCHANT: &str = "merchant";

/// One institution's format document (`<bank>_schema.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatConfig {
    pub bank_name: String,
    #[serde(default)]
    pub schema_mappings: Vec<SchemaMapping>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaMapping {
    pub format_name: String,
    /// canonical field -> raw column name
    pub column_mappings: BTreeMap<String, String>,
    pub amount_handling: AmountHandling,
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

impl SchemaMapping {
    /// Raw columns a file must carry for this mapping to apply.
    pub fn required_columns(&self) -> impl Iterator<Item = &str> {
        self.column_mappings.values().map(String::as_str)
    }

    pub fn raw_column(&self, canonical: &str) -> Option<&str> {
        self.column_mappings.get(canonical).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AmountHandling {
    SingleColumn {
        column: String,
        #[serde(default)]
        sign_convention: SignConvention,
    },
    SplitColumns {
        debit_column: String,
        credit_column: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignConvention {
    /// Purchases exported negative; flipped so spend becomes positive.
    #[default]
    NegativeForDebits,
    /// Purchases already positive; kept as exported.
    PositiveForPurchasesNegativeForPayments,
}

/// A record straight out of an export file, keyed by raw header name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawRow {
    pub columns: BTreeMap<String, String>,
    pub source_file: String,
}

impl RawRow {
    pub fn new(source_file: impl Into<String>) -> Self {
        Self {
            columns: BTreeMap::new(),
            source_file: source_file.into(),
        }
    }

    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.columns.insert(column.to_string(), value.to_string());
        self
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }
}

/// Intermediate representation after column mapping, before identity and
/// category resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub date: Option<NaiveDate>,
    /// Positive means money spent, negative means money received.
    pub amount: Option<Decimal>,
    pub description: String,
    pub category: Option<String>,
    /// The export's own transaction type column (Sale, Payment, Purchase...).
    pub kind: Option<String>,
    pub bank: String,
    pub source_file: String,
}

/// Canonical transaction handed to consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: String,
    pub date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub category_raw: Option<String>,
    pub category_normalized: String,
    pub description: String,
    pub bank: String,
    pub source_file: String,
    pub note: String,
}

/// Rows of an export file that no configured mapping recognised.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmatchedFile {
    pub bank: String,
    pub source_file: String,
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// The combined output of one load cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransactionTable {
    pub transactions: Vec<Transaction>,
    pub unmatched: Vec<UnmatchedFile>,
    pub payments_removed: usize,
    pub files_skipped: usize,
}
