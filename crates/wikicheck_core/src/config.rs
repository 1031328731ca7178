use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use toml::Value;

pub const DISABLED_ALGORITHMS_ENV: &str = "WIKICHECK_DISABLED";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiConfig {
    #[serde(default)]
    pub wiki: WikiSection,
    #[serde(default)]
    pub isbn: IdentifierSection,
    #[serde(default)]
    pub issn: IdentifierSection,
    /// Keyed by algorithm number as a string (`[algorithms."73"]`).
    #[serde(default)]
    pub algorithms: BTreeMap<String, AlgorithmSettings>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct WikiSection {
    pub code: Option<String>,
    #[serde(default = "default_image_namespaces")]
    pub image_namespaces: Vec<String>,
    #[serde(default)]
    pub custom_namespaces: Vec<CustomNamespace>,
}

impl Default for WikiSection {
    fn default() -> Self {
        Self {
            code: None,
            image_namespaces: default_image_namespaces(),
            custom_namespaces: Vec::new(),
        }
    }
}

fn default_image_namespaces() -> Vec<String> {
    vec!["File".to_string(), "Image".to_string()]
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CustomNamespace {
    pub name: String,
    pub id: i32,
}

/// Template names and help requests for one identifier kind.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct IdentifierSection {
    #[serde(default)]
    pub templates: Vec<IdentifierTemplate>,
    #[serde(default)]
    pub help_needed_templates: Vec<HelpNeededTemplate>,
    pub help_needed_comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct IdentifierTemplate {
    pub name: String,
    /// Parameters holding the identifier.
    #[serde(default = "default_parameters")]
    pub parameters: Vec<String>,
    /// Offered as a replacement form for plain-text identifiers.
    #[serde(default)]
    pub suggested: bool,
}

fn default_parameters() -> Vec<String> {
    vec!["1".to_string()]
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct HelpNeededTemplate {
    pub name: String,
    /// Parameter receiving the identifier; positional when absent.
    pub parameter: Option<String>,
    pub reason_parameter: Option<String>,
    /// Appended verbatim as extra parameters.
    #[serde(default)]
    pub extra: Vec<String>,
}

impl HelpNeededTemplate {
    pub fn identifier_parameter(&self) -> &str {
        self.parameter
            .as_deref()
            .filter(|parameter| !parameter.trim().is_empty())
            .unwrap_or("1")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AlgorithmSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub parameters: BTreeMap<String, String>,
}

impl Default for AlgorithmSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            parameters: BTreeMap::new(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

impl WikiConfig {
    pub fn algorithm(&self, number: u32) -> Option<&AlgorithmSettings> {
        self.algorithms.get(&number.to_string())
    }

    /// Non-blank parameter value configured for an algorithm.
    pub fn algorithm_parameter(&self, number: u32, name: &str) -> Option<&str> {
        self.algorithm(number)?
            .parameters
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Resolve whether an algorithm runs: env WIKICHECK_DISABLED > config > enabled.
    pub fn is_algorithm_enabled(&self, number: u32) -> bool {
        if disabled_algorithms_from_env().contains(&number) {
            return false;
        }
        self.algorithm(number).is_none_or(|settings| settings.enabled)
    }
}

/// Algorithm numbers listed in `WIKICHECK_DISABLED` (comma separated).
pub fn disabled_algorithms_from_env() -> BTreeSet<u32> {
    env::var(DISABLED_ALGORITHMS_ENV)
        .map(|value| parse_algorithm_list(&value))
        .unwrap_or_default()
}

fn parse_algorithm_list(value: &str) -> BTreeSet<u32> {
    value
        .split(',')
        .filter_map(|item| item.trim().parse::<u32>().ok())
        .collect()
}

/// Load and parse a WikiConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<WikiConfig> {
    if !config_path.exists() {
        return Ok(WikiConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: WikiConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

#[derive(Debug, Clone, Default)]
pub struct AlgorithmConfigPatch {
    pub enable: Vec<u32>,
    pub disable: Vec<u32>,
    pub set_parameters: Vec<(u32, String, String)>,
}

impl AlgorithmConfigPatch {
    fn is_empty(&self) -> bool {
        self.enable.is_empty() && self.disable.is_empty() && self.set_parameters.is_empty()
    }
}

/// Update selected entries under `[algorithms]` while preserving all other config sections.
/// Returns `true` when a write occurred.
pub fn patch_algorithm_config(config_path: &Path, patch: &AlgorithmConfigPatch) -> Result<bool> {
    if patch.is_empty() {
        return Ok(false);
    }

    let mut root = if config_path.exists() {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        toml::from_str::<Value>(&content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?
    } else {
        Value::Table(Default::default())
    };
    let original = root.clone();

    let root_table = root.as_table_mut().ok_or_else(|| {
        anyhow::anyhow!(
            "top-level TOML must be a table in {}",
            config_path.display()
        )
    })?;
    let algorithms_entry = root_table
        .entry("algorithms".to_string())
        .or_insert_with(|| Value::Table(Default::default()));
    let algorithms_table = algorithms_entry.as_table_mut().ok_or_else(|| {
        anyhow::anyhow!("[algorithms] must be a table in {}", config_path.display())
    })?;

    let updates = patch
        .enable
        .iter()
        .map(|number| (*number, "enabled", Value::Boolean(true)))
        .chain(
            patch
                .disable
                .iter()
                .map(|number| (*number, "enabled", Value::Boolean(false))),
        )
        .chain(
            patch
                .set_parameters
                .iter()
                .map(|(number, name, value)| (*number, name.as_str(), Value::String(value.clone()))),
        );
    for (number, key, value) in updates {
        if key.trim().is_empty() {
            bail!("algorithm {number}: parameter name cannot be empty");
        }
        let entry = algorithms_table
            .entry(number.to_string())
            .or_insert_with(|| Value::Table(Default::default()));
        let table = entry.as_table_mut().ok_or_else(|| {
            anyhow::anyhow!(
                "[algorithms.\"{number}\"] must be a table in {}",
                config_path.display()
            )
        })?;
        table.insert(key.to_string(), value);
    }

    if root == original {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let rendered = toml::to_string_pretty(&root).context("failed to serialize config TOML")?;
    fs::write(config_path, rendered)
        .with_context(|| format!("failed to write {}", config_path.display()))?;
    Ok(true)
}
