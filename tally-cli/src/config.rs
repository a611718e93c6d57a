use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use tally_core::Category;
use tally_finance::{AnalysisOptions, ChartOptions, RowPolicy, ServicePolicy};

use crate::llm::Provider;
use crate::state::ensure_tally_home;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmSection,
    pub classify: ClassifySection,
    pub analyze: AnalyzeSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// "openai" or "anthropic"
    pub provider: String,
    pub model: String,
    /// Defaults to the provider's public endpoint
    pub base_url: Option<String>,
    /// Omitted from the request when unset; some models only accept their default
    pub temperature: Option<f32>,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifySection {
    pub input: PathBuf,
    pub output: PathBuf,
    pub cache: PathBuf,
    pub on_invalid_row: RowPolicy,
    pub on_service_error: ServicePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzeSection {
    pub input: PathBuf,
    pub out_dir: PathBuf,
    pub min_confidence: f64,
    pub exclude_categories: Vec<String>,
    pub top_categories: usize,
    pub share_top: usize,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-5-mini".to_string(),
            base_url: None,
            temperature: None,
            max_tokens: 200,
            timeout_secs: 60,
        }
    }
}

impl Default for ClassifySection {
    fn default() -> Self {
        Self {
            input: PathBuf::from("mastersheet.csv"),
            output: PathBuf::from("mastersheet_classified.csv"),
            cache: PathBuf::from("classification_cache.json"),
            on_invalid_row: RowPolicy::Skip,
            on_service_error: ServicePolicy::MarkUnclassified,
        }
    }
}

impl Default for AnalyzeSection {
    fn default() -> Self {
        let options = AnalysisOptions::default();
        let charts = ChartOptions::default();
        Self {
            input: PathBuf::from("mastersheet_classified.csv"),
            out_dir: PathBuf::from("."),
            min_confidence: options.min_confidence,
            exclude_categories: options.exclude.iter().map(|c| c.to_string()).collect(),
            top_categories: charts.top_categories,
            share_top: charts.share_top,
        }
    }
}

impl LlmSection {
    pub fn provider(&self) -> Result<Provider> {
        self.provider.parse()
    }
}

impl AnalyzeSection {
    pub fn analysis_options(&self) -> Result<AnalysisOptions> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            bail!("analyze.min_confidence must be within 0..=1, got {}", self.min_confidence);
        }
        let exclude = self
            .exclude_categories
            .iter()
            .map(|s| s.parse::<Category>().map_err(anyhow::Error::msg))
            .collect::<Result<Vec<_>>>()
            .context("analyze.exclude_categories")?;
        Ok(AnalysisOptions {
            min_confidence: self.min_confidence,
            exclude,
        })
    }

    pub fn chart_options(&self) -> ChartOptions {
        ChartOptions {
            top_categories: self.top_categories.max(1),
            share_top: self.share_top.max(1),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_tally_home()?.join("config.toml"))
}

/// Load `explicit` (must exist) or the default config file (optional).
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let p = match explicit {
        Some(p) => {
            if !p.exists() {
                bail!("config file not found: {}", p.display());
            }
            p.to_path_buf()
        }
        None => {
            let p = config_path()?;
            if !p.exists() {
                return Ok(Config::default());
            }
            p
        }
    };
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    parse_config(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn parse_config(s: &str) -> Result<Config> {
    Ok(toml::from_str(s)?)
}

pub fn save_config(path: &Path, cfg: &Config) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn init_config(explicit: Option<&Path>) -> Result<()> {
    let p = match explicit {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&p, &Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}
