use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Placeholder written wherever a field could not be determined.
pub const NA: &str = "N/A";

const UNKNOWN: &str = "unknown";

/// One normalized job posting, carried through every pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "PostedDate", with = "optional_date")]
    pub posted_date: Option<NaiveDate>,
    #[serde(rename = "ClassifiedTitle")]
    pub classified_title: ClassifiedTitle,
    #[serde(rename = "RawTitle", with = "sentinel")]
    pub raw_title: Option<String>,
    #[serde(rename = "Company", with = "sentinel")]
    pub company: Option<String>,
    #[serde(rename = "LogoURL", with = "sentinel")]
    pub logo_url: Option<String>,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Location", with = "sentinel")]
    pub location: Option<String>,
    #[serde(rename = "Skills", with = "skill_list")]
    pub skills: BTreeSet<String>,
    #[serde(rename = "SalaryInfo", with = "sentinel_amount")]
    pub salary_info: Option<u64>,
    #[serde(rename = "Source")]
    pub source: String,
}

impl Listing {
    pub fn with_title(self, classified_title: ClassifiedTitle) -> Self {
        Self {
            classified_title,
            ..self
        }
    }

    /// Composite key used for deduplication.
    pub fn dedup_key(&self) -> (Option<&str>, Option<&str>, Option<&str>) {
        (
            self.company.as_deref(),
            self.raw_title.as_deref(),
            self.location.as_deref(),
        )
    }

    pub fn skills_joined(&self) -> String {
        join_skills(&self.skills)
    }
}

// ── Classified title ──

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ClassifiedTitle {
    Known(String),
    #[default]
    Unknown,
}

impl ClassifiedTitle {
    pub fn as_str(&self) -> &str {
        match self {
            ClassifiedTitle::Known(label) => label,
            ClassifiedTitle::Unknown => UNKNOWN,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, ClassifiedTitle::Known(_))
    }
}

impl Serialize for ClassifiedTitle {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

// Snapshot values are not checked against a taxonomy here; the cleaner does that.
impl<'de> Deserialize<'de> for ClassifiedTitle {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        let label = raw.trim();
        if label.is_empty() || label.eq_ignore_ascii_case(UNKNOWN) || label == NA {
            Ok(ClassifiedTitle::Unknown)
        } else {
            Ok(ClassifiedTitle::Known(label.to_string()))
        }
    }
}

// ── Taxonomy ──

/// Closed set of canonical job-title categories.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    labels: Vec<String>,
}

impl Taxonomy {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = Vec::new();
        for label in labels {
            let label: String = label.into();
            let label = label.trim().to_string();
            if label.is_empty() || label.eq_ignore_ascii_case(UNKNOWN) {
                continue;
            }
            if !seen.iter().any(|l: &String| l.eq_ignore_ascii_case(&label)) {
                seen.push(label);
            }
        }
        Self { labels: seen }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Map a free-form label onto the taxonomy (case-insensitive), anything else is `Unknown`.
    pub fn resolve(&self, raw: &str) -> ClassifiedTitle {
        let raw = raw.trim().trim_matches(|c| c == '"' || c == '\'');
        self.labels
            .iter()
            .find(|l| l.eq_ignore_ascii_case(raw))
            .map(|l| ClassifiedTitle::Known(l.clone()))
            .unwrap_or(ClassifiedTitle::Unknown)
    }

    pub fn contains(&self, title: &ClassifiedTitle) -> bool {
        match title {
            ClassifiedTitle::Known(label) => self.labels.iter().any(|l| l == label),
            ClassifiedTitle::Unknown => false,
        }
    }
}

// ── Serde helpers for sentinel columns ──

fn non_sentinel(raw: &str) -> Option<String> {
    let v = raw.trim();
    if v.is_empty() || v == NA || v.eq_ignore_ascii_case("nan") || v.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(v.to_string())
    }
}

pub fn join_skills(skills: &BTreeSet<String>) -> String {
    skills.iter().cloned().collect::<Vec<_>>().join(", ")
}

mod sentinel {
    use super::*;

    pub fn serialize<S: Serializer>(v: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(v.as_deref().unwrap_or(NA))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let raw = String::deserialize(d)?;
        Ok(non_sentinel(&raw))
    }
}

mod sentinel_amount {
    use super::*;

    pub fn serialize<S: Serializer>(v: &Option<u64>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(n) => s.serialize_str(&n.to_string()),
            None => s.serialize_str(NA),
        }
    }

    // Anything that is not a plain non-negative integer degrades to N/A.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        let raw = String::deserialize(d)?;
        Ok(non_sentinel(&raw).and_then(|v| v.parse::<u64>().ok()))
    }
}

mod optional_date {
    use super::*;

    pub fn serialize<S: Serializer>(v: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(d) => s.serialize_str(&d.format("%Y-%m-%d").to_string()),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw = String::deserialize(d)?;
        Ok(crate::normalize::date::normalize_stored_date(&raw))
    }
}

mod skill_list {
    use super::*;

    pub fn serialize<S: Serializer>(v: &BTreeSet<String>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&join_skills(v))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeSet<String>, D::Error> {
        let raw = String::deserialize(d)?;
        Ok(raw
            .split(',')
            .filter_map(non_sentinel)
            .collect())
    }
}
