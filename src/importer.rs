use std::path::{Path, PathBuf};

use crate::categorizer::CategoryMap;
use crate::error::Result;
use crate::formats::FormatRegistry;
use crate::identity::compute_id;
use crate::models::{NormalizedRow, RawRow, Transaction, TransactionTable, UnmatchedFile};
use crate::normalizer::{normalize, Normalized};
use crate::notes::NoteStore;
use crate::payments::PaymentFilter;

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Bank folders directly under `data_root`, sorted by name.
pub fn detect_bank_folders(data_root: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(data_root) else {
        return Vec::new();
    };
    let mut banks: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .collect();
    banks.sort();
    banks
}

/// `.csv` files (any case) in `bank_dir`, sorted by name.
pub fn statement_files(bank_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(bank_dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();
    files
}

// ---------------------------------------------------------------------------
// CSV reading
// ---------------------------------------------------------------------------

/// Header names and rows of one export. A header that is not UTF-8 fails the
/// file. Cells that are not UTF-8 (Latin-1 exports) are decoded lossily so the
/// row is kept; records that fail to parse at all are skipped.
pub fn read_raw_rows(file_path: &Path) -> Result<(Vec<String>, Vec<RawRow>)> {
    let source_file = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string();
    let file = std::fs::File::open(file_path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();

    let mut rows = Vec::new();
    for (line, result) in rdr.byte_records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                log::warn!("{source_file}: skipping record {}: {e}", line + 1);
                continue;
            }
        };
        let cells: Vec<String> = record
            .iter()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect();
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        if std::str::from_utf8(record.as_slice()).is_err() {
            log::warn!("{source_file}: record {} is not valid UTF-8, replacing bad bytes", line + 1);
        }
        let mut row = RawRow::new(source_file.clone());
        for (header, value) in headers.iter().zip(cells) {
            row.columns.insert(header.clone(), value);
        }
        rows.push(row);
    }
    Ok((headers, rows))
}

// ---------------------------------------------------------------------------
// Per-bank load
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct BankLoad {
    pub rows: Vec<NormalizedRow>,
    pub unmatched: Vec<UnmatchedFile>,
    pub files_skipped: usize,
}

/// Read and normalize every export in `<data_root>/<bank>`. Each file is
/// matched against the bank's formats on its own; unreadable files are skipped.
pub fn read_bank_statements(data_root: &Path, bank: &str, registry: &FormatRegistry) -> BankLoad {
    let mut load = BankLoad::default();
    for path in statement_files(&data_root.join(bank)) {
        let (columns, raw) = match read_raw_rows(&path) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::error!("error reading {}: {e}", path.display());
                load.files_skipped += 1;
                continue;
            }
        };
        if raw.is_empty() {
            continue;
        }
        match normalize(registry, &columns, raw, bank) {
            Normalized::Mapped { rows, .. } => load.rows.extend(rows),
            Normalized::Unmatched(rows) => load.unmatched.push(UnmatchedFile {
                bank: bank.to_string(),
                source_file: rows.first().map(|r| r.source_file.clone()).unwrap_or_default(),
                columns,
                rows,
            }),
        }
    }
    load
}

// ---------------------------------------------------------------------------
// Combined table
// ---------------------------------------------------------------------------

pub fn to_transaction(row: NormalizedRow, categories: &CategoryMap) -> Transaction {
    let id = compute_id(&row);
    let category_normalized = categories.classify(row.category.as_deref());
    Transaction {
        id,
        date: row.date,
        amount: row.amount,
        category_raw: row.category,
        category_normalized,
        description: row.description,
        bank: row.bank,
        source_file: row.source_file,
        note: String::new(),
    }
}

/// Ingest, normalize, filter, classify, identify and annotate every bank
/// folder under `data_root`.
pub fn load_combined_transactions(
    data_root: &Path,
    registry: &FormatRegistry,
    filter: PaymentFilter,
    categories: &CategoryMap,
    notes: &NoteStore,
) -> TransactionTable {
    let mut table = TransactionTable::default();
    let mut combined = Vec::new();

    for bank in detect_bank_folders(data_root) {
        let load = read_bank_statements(data_root, &bank, registry);
        let outcome = filter.apply(load.rows);
        if outcome.removed > 0 {
            log::info!("filtered out {} credit card payment transactions for {bank}", outcome.removed);
        }
        table.payments_removed += outcome.removed;
        table.files_skipped += load.files_skipped;
        table.unmatched.extend(load.unmatched);
        combined.extend(outcome.kept);
    }

    table.transactions = combined
        .into_iter()
        .map(|row| to_transaction(row, categories))
        .collect();
    notes.merge(&mut table.transactions);
    table
}
