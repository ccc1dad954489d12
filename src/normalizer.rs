use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;

use crate::formats::FormatRegistry;
use crate::models::{
    AmountHandling, NormalizedRow, RawRow, SchemaMapping, SignConvention, FIELD_CATEGORY,
    FIELD_DATE, FIELD_DESCRIPTION, FIELD_MERCHANT, FIELD_TYPE,
};

// Export column read for the transaction type when a mapping leaves `type` out.
const RAW_TYPE_COLUMN: &str = "Type";

// Tried in order when the declared date format fails for a whole column.
const FALLBACK_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%Y/%m/%d",
    "%m-%d-%Y",
    "%d-%b-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%Y%m%d",
];

// ---------------------------------------------------------------------------
// Cell parsing
// ---------------------------------------------------------------------------

/// Parse a money cell. Accepts `$`, thousands separators, quotes and
/// parenthesized negatives. Empty or garbage gives `None`.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let s = raw.replace([',', '"', '$'], "");
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return inner.trim().parse::<Decimal>().ok().map(|d| -d);
    }
    s.parse().ok()
}

pub fn parse_date(raw: &str, format: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), format).ok()
}

/// Best-effort date parse over common export layouts.
pub fn parse_date_auto(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in FALLBACK_DATE_FORMATS {
        if let Some(date) = parse_date(raw, fmt) {
            return Some(date);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|dt| dt.date())
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Column normalization
// ---------------------------------------------------------------------------

/// Signed amount for one row; positive means money spent.
pub fn row_amount(row: &RawRow, handling: &AmountHandling) -> Option<Decimal> {
    match handling {
        AmountHandling::SingleColumn {
            column,
            sign_convention,
        } => {
            let value = parse_amount(row.get(column)?)?;
            Some(match sign_convention {
                SignConvention::PositiveForPurchasesNegativeForPayments => value,
                SignConvention::NegativeForDebits => -value,
            })
        }
        AmountHandling::SplitColumns {
            debit_column,
            credit_column,
        } => {
            let debit = row.get(debit_column);
            let credit = row.get(credit_column);
            if debit.is_none() && credit.is_none() {
                return None;
            }
            let side = |cell: Option<&str>| cell.and_then(parse_amount).unwrap_or(Decimal::ZERO);
            Some(side(debit) + side(credit))
        }
    }
}

pub fn normalize_amounts(rows: &[RawRow], handling: &AmountHandling) -> Vec<Option<Decimal>> {
    rows.iter().map(|row| row_amount(row, handling)).collect()
}

/// Parse `date_col` with `date_format`. When that fails for every row, the
/// whole column is retried with auto-detection. Failures stay `None`.
pub fn normalize_dates(rows: &[RawRow], date_col: &str, date_format: &str) -> Vec<Option<NaiveDate>> {
    let declared: Vec<Option<NaiveDate>> = rows
        .iter()
        .map(|row| row.get(date_col).and_then(|v| parse_date(v, date_format)))
        .collect();
    if rows.is_empty() || declared.iter().any(Option::is_some) {
        return declared;
    }
    log::debug!("date format '{date_format}' matched nothing in '{date_col}', auto-detecting");
    rows.iter()
        .map(|row| row.get(date_col).and_then(parse_date_auto))
        .collect()
}

// ---------------------------------------------------------------------------
// normalize
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// Rows mapped through the named format.
    Mapped {
        format_name: String,
        rows: Vec<NormalizedRow>,
    },
    /// No mapping matched; rows are returned untouched.
    Unmatched(Vec<RawRow>),
}

/// Map rows through `mapping`, stamping `bank_name` on each.
pub fn apply_mapping(rows: &[RawRow], mapping: &SchemaMapping, bank_name: &str) -> Vec<NormalizedRow> {
    let amounts = normalize_amounts(rows, &mapping.amount_handling);
    let dates = match mapping.raw_column(FIELD_DATE) {
        Some(col) => normalize_dates(rows, col, &mapping.date_format),
        None => vec![None; rows.len()],
    };
    let description_col = mapping
        .raw_column(FIELD_DESCRIPTION)
        .or_else(|| mapping.raw_column(FIELD_MERCHANT));
    let kind_col = mapping.raw_column(FIELD_TYPE).unwrap_or(RAW_TYPE_COLUMN);
    let cell = |row: &RawRow, field: &str| {
        non_empty(mapping.raw_column(field).and_then(|col| row.get(col)))
    };

    rows.iter()
        .zip(amounts)
        .zip(dates)
        .map(|((row, amount), date)| NormalizedRow {
            date,
            amount,
            description: description_col
                .and_then(|col| row.get(col))
                .map(|d| d.trim().to_string())
                .unwrap_or_default(),
            category: cell(row, FIELD_CATEGORY),
            kind: non_empty(row.get(kind_col)),
            bank: bank_name.to_string(),
            source_file: row.source_file.clone(),
        })
        .collect()
}

/// Normalize one file's rows for `bank_name`. `columns` is the file's header.
pub fn normalize<S: AsRef<str>>(
    registry: &FormatRegistry,
    columns: &[S],
    rows: Vec<RawRow>,
    bank_name: &str,
) -> Normalized {
    let Some(mapping) = registry.detect_format(columns, bank_name) else {
        log::warn!("no matching format found for {bank_name}, passing rows through");
        return Normalized::Unmatched(rows);
    };
    log::info!("using format '{}' for {bank_name}", mapping.format_name);
    Normalized::Mapped {
        format_name: mapping.format_name.clone(),
        rows: apply_mapping(&rows, mapping, bank_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FormatConfig;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn single(sign_convention: SignConvention) -> AmountHandling {
        AmountHandling::SingleColumn {
            column: "Amount".to_string(),
            sign_convention,
        }
    }

    fn amount_row(value: &str) -> RawRow {
        RawRow::new("stmt.csv").with("Amount", value)
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,234.56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("\"500.00\""), Some(dec("500.00")));
        assert_eq!(parse_amount("  -42.50  "), Some(dec("-42.50")));
        assert_eq!(parse_amount("(1,234.56)"), Some(dec("-1234.56")));
        assert_eq!(parse_amount("$1,234.56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("-$50.00"), Some(dec("-50.00")));
        assert_eq!(parse_amount("not_a_number"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn test_negative_for_debits_flips_sign() {
        let amounts = normalize_amounts(&[amount_row("-21.39"), amount_row("183.13")], &single(SignConvention::NegativeForDebits));
        assert_eq!(amounts, vec![Some(dec("21.39")), Some(dec("-183.13"))]);
    }

    #[test]
    fn test_positive_for_purchases_keeps_sign() {
        let handling = single(SignConvention::PositiveForPurchasesNegativeForPayments);
        let amounts = normalize_amounts(&[amount_row("8.00"), amount_row("-185.53")], &handling);
        assert_eq!(amounts, vec![Some(dec("8.00")), Some(dec("-185.53"))]);
    }

    #[test]
    fn test_unparsable_single_column_is_none() {
        let rows = [amount_row("n/a"), RawRow::new("stmt.csv")];
        let amounts = normalize_amounts(&rows, &single(SignConvention::NegativeForDebits));
        assert_eq!(amounts, vec![None, None]);
    }

    #[test]
    fn test_split_columns_sum_with_missing_as_zero() {
        let handling = AmountHandling::SplitColumns {
            debit_column: "Debit".to_string(),
            credit_column: "Credit".to_string(),
        };
        let rows = [
            RawRow::new("wf.csv").with("Debit", "45.10").with("Credit", ""),
            RawRow::new("wf.csv").with("Debit", "").with("Credit", "1200.00"),
            RawRow::new("wf.csv").with("Debit", "junk").with("Credit", "3.00"),
            RawRow::new("wf.csv"),
        ];
        assert_eq!(
            normalize_amounts(&rows, &handling),
            vec![Some(dec("45.10")), Some(dec("1200.00")), Some(dec("3.00")), None]
        );
    }

    #[test]
    fn test_dates_with_declared_format() {
        let rows = [
            RawRow::new("a.csv").with("Date", "07/13/2025"),
            RawRow::new("a.csv").with("Date", "garbage"),
        ];
        let dates = normalize_dates(&rows, "Date", "%m/%d/%Y");
        assert_eq!(dates, vec![NaiveDate::from_ymd_opt(2025, 7, 13), None]);
    }

    #[test]
    fn test_dates_fall_back_when_every_value_fails() {
        let rows = [
            RawRow::new("a.csv").with("Date", "2025-07-13"),
            RawRow::new("a.csv").with("Date", "Jul 14, 2025"),
            RawRow::new("a.csv").with("Date", "???"),
        ];
        let dates = normalize_dates(&rows, "Date", "%m/%d/%Y");
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2025, 7, 13),
                NaiveDate::from_ymd_opt(2025, 7, 14),
                None
            ]
        );
    }

    #[test]
    fn test_no_fallback_when_some_values_parse() {
        let rows = [
            RawRow::new("a.csv").with("Date", "07/13/2025"),
            RawRow::new("a.csv").with("Date", "2025-07-14"),
        ];
        let dates = normalize_dates(&rows, "Date", "%m/%d/%Y");
        assert_eq!(dates[1], None);
    }

    #[test]
    fn test_parse_date_auto_datetime_forms() {
        assert_eq!(parse_date_auto("2025-07-13T10:00:00Z"), NaiveDate::from_ymd_opt(2025, 7, 13));
        assert_eq!(parse_date_auto("2025-07-13 10:00:00"), NaiveDate::from_ymd_opt(2025, 7, 13));
        assert_eq!(parse_date_auto(""), None);
    }

    fn apple_registry() -> FormatRegistry {
        let config: FormatConfig = serde_json::from_str(
            r#"{
                "bank_name": "apple_card",
                "schema_mappings": [{
                    "format_name": "apple_card_export",
                    "column_mappings": {
                        "date": "Transaction Date",
                        "description": "Description",
                        "merchant": "Merchant",
                        "category": "Category",
                        "type": "Type",
                        "amount": "Amount (USD)"
                    },
                    "amount_handling": {
                        "type": "single_column",
                        "column": "Amount (USD)",
                        "sign_convention": "positive_for_purchases_negative_for_payments"
                    },
                    "date_format": "%m/%d/%Y"
                }]
            }"#,
        )
        .unwrap();
        FormatRegistry::from_configs([config])
    }

    #[test]
    fn test_normalize_maps_columns_and_stamps_bank() {
        let registry = apple_registry();
        let columns = ["Transaction Date", "Clearing Date", "Description", "Merchant", "Category", "Type", "Amount (USD)"];
        let row = RawRow::new("apple.csv")
            .with("Transaction Date", "06/27/2025")
            .with("Description", " APPLE CAFFE PL5 ")
            .with("Merchant", "Caffe Macs")
            .with("Category", "Restaurants")
            .with("Type", "Purchase")
            .with("Amount (USD)", "8.00");
        let Normalized::Mapped { format_name, rows } = normalize(&registry, &columns, vec![row], "apple_card") else {
            panic!("expected a mapped result");
        };
        assert_eq!(format_name, "apple_card_export");
        let r = &rows[0];
        assert_eq!(r.date, NaiveDate::from_ymd_opt(2025, 6, 27));
        assert_eq!(r.amount, Some(dec("8.00")));
        assert_eq!(r.description, "APPLE CAFFE PL5");
        assert_eq!(r.category.as_deref(), Some("Restaurants"));
        assert_eq!(r.kind.as_deref(), Some("Purchase"));
        assert_eq!(r.bank, "apple_card");
        assert_eq!(r.source_file, "apple.csv");
    }

    #[test]
    fn test_normalize_passes_unmatched_rows_through() {
        let registry = apple_registry();
        let row = RawRow::new("odd.csv").with("When", "x");
        let rows = vec![row.clone()];
        assert_eq!(
            normalize(&registry, &["When"], rows, "apple_card"),
            Normalized::Unmatched(vec![row])
        );
    }

    #[test]
    fn test_empty_category_becomes_none() {
        let registry = apple_registry();
        let columns = ["Transaction Date", "Description", "Merchant", "Category", "Type", "Amount (USD)"];
        let row = RawRow::new("apple.csv")
            .with("Transaction Date", "06/27/2025")
            .with("Description", "X")
            .with("Merchant", "X")
            .with("Category", "  ")
            .with("Type", "Purchase")
            .with("Amount (USD)", "1");
        let Normalized::Mapped { rows, .. } = normalize(&registry, &columns, vec![row], "apple_card") else {
            panic!("expected a mapped result");
        };
        assert_eq!(rows[0].category, None);
    }

    #[test]
    fn test_unmapped_type_falls_back_to_raw_type_column() {
        let mapping: SchemaMapping = serde_json::from_str(
            r#"{
                "format_name": "chase_lean",
                "column_mappings": {"date": "Transaction Date", "description": "Description", "amount": "Amount"},
                "amount_handling": {"type": "single_column", "column": "Amount"},
                "date_format": "%m/%d/%Y"
            }"#,
        )
        .unwrap();
        let rows = [
            RawRow::new("chase.csv")
                .with("Transaction Date", "07/13/2025")
                .with("Description", "Payment Thank You-Mobile")
                .with("Type", " Payment ")
                .with("Amount", "183.13"),
            RawRow::new("chase.csv")
                .with("Transaction Date", "07/13/2025")
                .with("Description", "H-E-B #659")
                .with("Amount", "-21.39"),
        ];
        let normalized = apply_mapping(&rows, &mapping, "chase");
        assert_eq!(normalized[0].kind.as_deref(), Some("Payment"));
        assert_eq!(normalized[1].kind, None);
    }
}
