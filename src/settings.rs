use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use ::config::{Config, Environment, File};
use serde::Deserialize;

use crate::normalize::salary::Rates;

const ENV_PREFIX: &str = "HH";
const DEFAULT_CONFIG_FILE: &str = "hh_scraper.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Search results URL; `{page}` is replaced with the zero-based page number.
    pub base_url: String,
    pub job_limit: Option<usize>,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub country: String,
    pub source: String,
    pub headless: bool,
    pub rates: Rates,
    pub skills: Vec<String>,
    pub taxonomy: Vec<String>,
    pub classifier: ClassifierSettings,
    pub translator: TranslatorSettings,
    pub delays: Delays,
    pub timeouts: Timeouts,
    pub locators: Locators,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "https://hh.uz/search/vacancy?area=97&professional_role=96&page={page}".into(),
            job_limit: None,
            data_dir: PathBuf::from("data"),
            db_path: PathBuf::from("data/jobs.sqlite"),
            country: "Uzbekistan".into(),
            source: "hh.uz".into(),
            headless: true,
            rates: Rates::default(),
            skills: to_strings(&[
                ".NET", "SQL", "Python", "Java", "C++", "JavaScript", "React", "Angular",
                "Vue.js", "Node.js", "Docker", "Kubernetes", "AWS", "Azure", "GCP",
                "Terraform", "Git",
            ]),
            taxonomy: to_strings(&[
                "Backend Developer", "Frontend Developer", "Full Stack Developer",
                "Data Analyst", "Data Engineer", "Data Scientist", "AI Engineer",
                "Android Developer", "IOS Developer", "Game Developer", "DevOps Engineer",
                "IT Project Manager", "Network Engineer", "Cybersecurity Analyst",
                "Cloud Architect", "QA Engineer", "UI/UX Designer", "System Administrator",
                "IT Support Specialist", "Graphic Designer",
            ]),
            classifier: ClassifierSettings::default(),
            translator: TranslatorSettings::default(),
            delays: Delays::default(),
            timeouts: Timeouts::default(),
            locators: Locators::default(),
        }
    }
}

impl Settings {
    /// Defaults, then the optional TOML file, then `HH_*` environment variables
    /// (`HH_JOB_LIMIT`, `HH_CLASSIFIER__BATCH_SIZE`, ...).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let settings = Config::builder()
            .add_source(File::from(file).required(path.is_some()))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("skills")
                    .with_list_parse_key("taxonomy")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read settings from {:?}", file))?;
        settings
            .try_deserialize()
            .context("Invalid settings")
    }

    pub fn raw_snapshot_path(&self) -> PathBuf {
        self.data_dir.join("job_data_raw.csv")
    }

    pub fn cleaned_snapshot_path(&self) -> PathBuf {
        self.data_dir.join("job_data_cleaned.csv")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub model: String,
    pub endpoint: String,
    pub api_key_env: String,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_delay_ms: 5000,
            model: "gemini-1.5-flash".into(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".into(),
            api_key_env: "GEMINI_API_KEY".into(),
        }
    }
}

impl ClassifierSettings {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TranslatorSettings {
    pub endpoint: Option<String>,
}

/// Politeness delay bounds, in milliseconds.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Delays {
    pub page_min_ms: u64,
    pub page_max_ms: u64,
    pub detail_min_ms: u64,
    pub detail_max_ms: u64,
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            page_min_ms: 2000,
            page_max_ms: 4000,
            detail_min_ms: 1000,
            detail_max_ms: 2000,
        }
    }
}

#[cfg(test)]
impl Delays {
    pub fn none() -> Self {
        Self {
            page_min_ms: 0,
            page_max_ms: 0,
            detail_min_ms: 0,
            detail_max_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub element_wait_ms: u64,
    pub page_load_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            element_wait_ms: 10_000,
            page_load_ms: 30_000,
        }
    }
}

impl Timeouts {
    pub fn element_wait(&self) -> Duration {
        Duration::from_millis(self.element_wait_ms)
    }

    pub fn page_load(&self) -> Duration {
        Duration::from_millis(self.page_load_ms)
    }
}

/// CSS selectors for the search and vacancy pages.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Locators {
    pub listing_link: String,
    pub next_page: String,
    pub title: String,
    pub company: String,
    pub location_and_date: String,
    pub skills: String,
    pub salary: String,
    pub logo: String,
}

impl Default for Locators {
    fn default() -> Self {
        Self {
            listing_link: r#"a[data-qa="serp-item__title"]"#.into(),
            next_page: r#"a[data-qa="pager-next"]"#.into(),
            title: r#"h1[data-qa="vacancy-title"]"#.into(),
            company: r#"a[data-qa="vacancy-company-name"]"#.into(),
            location_and_date: r#"p.vacancy-creation-time-redesigned"#.into(),
            skills: r#"div[data-qa="vacancy-description"]"#.into(),
            salary: r#"div[data-qa="vacancy-salary"]"#.into(),
            logo: r#"img[data-qa="vacancy-company-logo"]"#.into(),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
