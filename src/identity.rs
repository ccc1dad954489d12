use chrono::NaiveDate;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::models::{NormalizedRow, Transaction};

const DELIMITER: &str = "|";
const ID_LEN: usize = 16;

/// The fields a transaction id is derived from.
pub trait Identify {
    fn date(&self) -> Option<NaiveDate>;
    fn amount(&self) -> Option<Decimal>;
    fn description(&self) -> &str;
    fn bank(&self) -> &str;
    fn source_file(&self) -> &str;
}

impl Identify for NormalizedRow {
    fn date(&self) -> Option<NaiveDate> {
        self.date
    }
    fn amount(&self) -> Option<Decimal> {
        self.amount
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn bank(&self) -> &str {
        &self.bank
    }
    fn source_file(&self) -> &str {
        &self.source_file
    }
}

impl Identify for Transaction {
    fn date(&self) -> Option<NaiveDate> {
        self.date
    }
    fn amount(&self) -> Option<Decimal> {
        self.amount
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn bank(&self) -> &str {
        &self.bank
    }
    fn source_file(&self) -> &str {
        &self.source_file
    }
}

/// First 16 hex chars of SHA-256 over `date|amount|description|bank|source_file`.
/// Missing date or amount contribute an empty string.
pub fn compute_id<T: Identify + ?Sized>(txn: &T) -> String {
    let date = txn
        .date()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    let amount = txn.amount().map(|a| a.to_string()).unwrap_or_default();
    let key = [
        date.as_str(),
        amount.as_str(),
        txn.description(),
        txn.bank(),
        txn.source_file(),
    ]
    .join(DELIMITER);

    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let mut id = hex::encode(hasher.finalize());
    id.truncate(ID_LEN);
    id
}
