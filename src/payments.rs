use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};

use crate::models::NormalizedRow;

const WELLS_FARGO_PATTERNS: &[&str] = &["CREDIT CARD PAYMENT", "CC PAYMENT", "CARD PAYMENT"];

const GENERIC_PATTERNS: &[&str] = &[
    "PAYMENT THANK YOU",
    "AUTOPAY",
    "ONLINE PAYMENT",
    "MOBILE PAYMENT",
    "ACH DEPOSIT INTERNET TRANSFER",
];

fn any_of(patterns: &[&str]) -> Option<Regex> {
    let alternation = patterns
        .iter()
        .map(|p| regex::escape(p))
        .collect::<Vec<_>>()
        .join("|");
    RegexBuilder::new(&alternation)
        .case_insensitive(true)
        .build()
        .ok()
}

fn contains_any(re: &OnceLock<Option<Regex>>, patterns: &[&str], text: &str) -> bool {
    re.get_or_init(|| any_of(patterns))
        .as_ref()
        .is_some_and(|re| re.is_match(text))
}

static WELLS_FARGO_RE: OnceLock<Option<Regex>> = OnceLock::new();
static GENERIC_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn field_is(value: &Option<String>, expected: &str) -> bool {
    value.as_deref().map(str::trim) == Some(expected)
}

// ---------------------------------------------------------------------------
// Institution rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentRule {
    Chase,
    AppleCard,
    WellsFargo,
}

const ALL_RULES: &[PaymentRule] = &[PaymentRule::Chase, PaymentRule::AppleCard, PaymentRule::WellsFargo];

impl PaymentRule {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Chase => "chase",
            Self::AppleCard => "apple_card",
            Self::WellsFargo => "wells_fargo",
        }
    }

    pub fn for_bank(bank: &str) -> Option<Self> {
        ALL_RULES.iter().find(|r| r.key() == bank).copied()
    }

    pub fn matches(&self, row: &NormalizedRow) -> bool {
        match self {
            Self::Chase => field_is(&row.kind, "Payment"),
            Self::AppleCard => field_is(&row.kind, "Payment") && field_is(&row.category, "Payment"),
            Self::WellsFargo => contains_any(&WELLS_FARGO_RE, WELLS_FARGO_PATTERNS, &row.description),
        }
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub kept: Vec<NormalizedRow>,
    pub removed: usize,
}

/// Drops credit-card bill payments so only real spending remains.
#[derive(Debug, Clone, Copy)]
pub struct PaymentFilter {
    enabled: bool,
}

impl PaymentFilter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// True when the row is a bill payment under its bank's rule or the
    /// generic description patterns.
    pub fn is_payment(row: &NormalizedRow) -> bool {
        let by_bank = PaymentRule::for_bank(&row.bank).is_some_and(|rule| rule.matches(row));
        by_bank || contains_any(&GENERIC_RE, GENERIC_PATTERNS, &row.description)
    }

    pub fn apply(&self, rows: Vec<NormalizedRow>) -> FilterOutcome {
        if !self.enabled {
            return FilterOutcome { kept: rows, removed: 0 };
        }
        let before = rows.len();
        let kept: Vec<NormalizedRow> = rows.into_iter().filter(|r| !Self::is_payment(r)).collect();
        let removed = before - kept.len();
        FilterOutcome { kept, removed }
    }
}
