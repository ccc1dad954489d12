use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{Result, TallyError};
use crate::models::{FormatConfig, SchemaMapping};

const SCHEMA_SUFFIX: &str = "_schema.json";

/// Per-institution format definitions, loaded once and read-only afterwards.
#[derive(Debug, Default)]
pub struct FormatRegistry {
    configs: BTreeMap<String, FormatConfig>,
    sources: BTreeMap<String, PathBuf>,
    load_errors: Vec<(PathBuf, String)>,
}

fn schema_files(config_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(config_dir)? {
        let path = entry?.path();
        let is_schema = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(SCHEMA_SUFFIX));
        if is_schema && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn parse_config(path: &Path) -> Result<FormatConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: FormatConfig = serde_json::from_str(&content).map_err(|e| TallyError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    if config.bank_name.trim().is_empty() {
        return Err(TallyError::Config {
            path: path.to_path_buf(),
            message: "bank_name is empty".to_string(),
        });
    }
    Ok(config)
}

impl FormatRegistry {
    /// Scan `config_dir` for `*_schema.json` documents. Bad documents are logged
    /// and skipped; the first document to claim a bank name keeps it.
    pub fn load(config_dir: &Path) -> Self {
        let mut registry = Self::default();
        let files = match schema_files(config_dir) {
            Ok(files) => files,
            Err(e) => {
                log::warn!("config folder {} unavailable: {e}", config_dir.display());
                return registry;
            }
        };

        for path in files {
            if let Err(e) = registry.load_file(&path) {
                log::error!("skipping format config {}: {e}", path.display());
                registry.load_errors.push((path, e.to_string()));
            }
        }
        registry
    }

    fn load_file(&mut self, path: &Path) -> Result<()> {
        let config = parse_config(path)?;
        if let Some(first) = self.sources.get(&config.bank_name) {
            return Err(TallyError::DuplicateBank {
                bank: config.bank_name,
                path: path.to_path_buf(),
                first: first.clone(),
            });
        }
        log::info!(
            "loaded format config for {} ({} formats)",
            config.bank_name,
            config.schema_mappings.len()
        );
        self.sources.insert(config.bank_name.clone(), path.to_path_buf());
        self.configs.insert(config.bank_name.clone(), config);
        Ok(())
    }

    /// Build a registry from in-memory configs. Later duplicates are dropped.
    pub fn from_configs(configs: impl IntoIterator<Item = FormatConfig>) -> Self {
        let mut registry = Self::default();
        for config in configs {
            registry
                .configs
                .entry(config.bank_name.clone())
                .or_insert(config);
        }
        registry
    }

    /// First mapping for `bank_name` whose raw columns are all present.
    pub fn detect_format<S: AsRef<str>>(
        &self,
        raw_columns: &[S],
        bank_name: &str,
    ) -> Option<&SchemaMapping> {
        let config = self.configs.get(bank_name)?;
        let present: HashSet<&str> = raw_columns.iter().map(|c| c.as_ref()).collect();
        config
            .schema_mappings
            .iter()
            .find(|m| m.required_columns().all(|col| present.contains(col)))
    }

    pub fn banks(&self) -> Vec<&str> {
        self.configs.keys().map(String::as_str).collect()
    }

    /// bank name -> format names, in declaration order.
    pub fn schema_summary(&self) -> BTreeMap<String, Vec<String>> {
        self.configs
            .iter()
            .map(|(bank, config)| {
                let formats = config
                    .schema_mappings
                    .iter()
                    .map(|m| m.format_name.clone())
                    .collect();
                (bank.clone(), formats)
            })
            .collect()
    }

    pub fn load_errors(&self) -> &[(PathBuf, String)] {
        &self.load_errors
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}
