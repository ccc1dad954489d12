use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, TallyError};

pub const OTHER: &str = "other";

// (canonical, synonyms)
const DEFAULT_MAPPING: &[(&str, &[&str])] = &[
    ("dining", &["restaurant", "restaurants", "food", "dining", "cafe", "fast food", "takeout"]),
    ("groceries", &["grocery", "groceries", "supermarket", "market", "food store"]),
    ("transportation", &["gas", "fuel", "uber", "lyft", "taxi", "bus", "train", "parking"]),
    ("shopping", &["amazon", "walmart", "target", "store", "retail", "purchase"]),
    ("entertainment", &["netflix", "spotify", "hulu", "movies", "games", "subscription"]),
    ("income", &["salary", "paycheck", "deposit", "income", "wages", "bonus"]),
    ("housing", &["rent", "mortgage", "property", "home", "apartment"]),
    ("utilities", &["electric", "water", "internet", "phone", "cable", "utilities"]),
    ("healthcare", &["medical", "doctor", "pharmacy", "hospital", "health", "dental"]),
    ("insurance", &["insurance", "coverage", "policy", "premium"]),
    ("fees", &["atm", "fee", "charge", "penalty", "service fee"]),
    ("transfer", &["transfer", "payment", "wire", "check", "deposit"]),
];

/// Canonical category -> synonyms, kept in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryMapping(pub Vec<(String, Vec<String>)>);

impl Serialize for CategoryMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (target, sources) in &self.0 {
            map.serialize_entry(target, sources)?;
        }
        map.end()
    }
}

struct CategoryMappingVisitor;

impl<'de> Visitor<'de> for CategoryMappingVisitor {
    type Value = CategoryMapping;

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("an object of category name to synonym list")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((target, sources)) = access.next_entry::<String, Vec<String>>()? {
            entries.push((target, sources));
        }
        Ok(CategoryMapping(entries))
    }
}

impl<'de> Deserialize<'de> for CategoryMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(CategoryMappingVisitor)
    }
}

pub fn default_mapping() -> CategoryMapping {
    CategoryMapping(
        DEFAULT_MAPPING
            .iter()
            .map(|(target, sources)| {
                (
                    target.to_string(),
                    sources.iter().map(|s| s.to_string()).collect(),
                )
            })
            .collect(),
    )
}

/// Synonym -> canonical category lookup.
#[derive(Debug, Clone, Default)]
pub struct CategoryMap {
    reverse: BTreeMap<String, String>,
    /// Synonyms ordered longest first, then alphabetically, for partial matches.
    partial_order: Vec<String>,
}

impl CategoryMap {
    /// Entries are applied in document order; a synonym listed again under a
    /// later category moves to that category.
    pub fn from_mapping(mapping: &CategoryMapping) -> Self {
        let mut reverse: BTreeMap<String, String> = BTreeMap::new();
        for (target, sources) in &mapping.0 {
            let target = target.trim().to_lowercase();
            for source in sources {
                let key = source.trim().to_lowercase();
                if key.is_empty() {
                    continue;
                }
                if let Some(previous) = reverse.insert(key.clone(), target.clone()) {
                    if previous != target {
                        log::warn!("synonym '{key}' listed under '{previous}' and '{target}', using '{target}'");
                    }
                }
            }
        }
        let mut partial_order: Vec<String> = reverse.keys().cloned().collect();
        partial_order.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Self {
            reverse,
            partial_order,
        }
    }

    pub fn with_defaults() -> Self {
        Self::from_mapping(&default_mapping())
    }

    /// Load `mapping_file`, writing the default mapping there first if it does
    /// not exist. A malformed file is logged and the defaults are used.
    pub fn load(mapping_file: &Path) -> Self {
        if !mapping_file.exists() {
            log::warn!("{} not found, creating default mapping", mapping_file.display());
            if let Err(e) = write_default_mapping(mapping_file) {
                log::error!("could not write default category mapping: {e}");
            }
        }
        match read_mapping(mapping_file) {
            Ok(mapping) => Self::from_mapping(&mapping),
            Err(e) => {
                log::error!("category mapping unusable, falling back to defaults: {e}");
                Self::with_defaults()
            }
        }
    }

    pub fn classify(&self, raw: Option<&str>) -> String {
        let Some(raw) = raw else {
            return OTHER.to_string();
        };
        let needle = raw.trim().to_lowercase();
        if needle.is_empty() {
            return OTHER.to_string();
        }
        if let Some(target) = self.reverse.get(&needle) {
            return target.clone();
        }
        self.partial_order
            .iter()
            .find(|key| needle.contains(key.as_str()))
            .and_then(|key| self.reverse.get(key))
            .cloned()
            .unwrap_or_else(|| OTHER.to_string())
    }

    /// Raw categories that fall through to "other", in first-seen order.
    pub fn list_unmapped<'a, I>(&self, categories: I) -> Vec<String>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        unique_categories(categories)
            .into_iter()
            .filter(|c| self.classify(Some(c)) == OTHER)
            .collect()
    }

    pub fn canonical_categories(&self) -> Vec<String> {
        let set: std::collections::BTreeSet<&String> = self.reverse.values().collect();
        set.into_iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }
}

/// Distinct non-empty categories, in first-seen order.
pub fn unique_categories<'a, I>(categories: I) -> Vec<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for category in categories.into_iter().flatten() {
        if category.trim().is_empty() {
            continue;
        }
        if seen.insert(category) {
            out.push(category.to_string());
        }
    }
    out
}

fn read_mapping(path: &Path) -> Result<CategoryMapping> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| TallyError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

pub fn write_default_mapping(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(&default_mapping())?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}
