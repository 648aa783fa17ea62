pub mod company;
pub mod date;
pub mod location;
pub mod salary;
pub mod skills;
pub mod translate;

use tracing::debug;

use crate::listing::{ClassifiedTitle, Listing, NA};
use location::RegionLookup;
use salary::Rates;
use translate::Translator;

/// Outcome of a best-effort text conversion: callers can see when it degraded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Converted(String),
    Unchanged(String),
}

impl Rendered {
    pub fn into_inner(self) -> String {
        match self {
            Rendered::Converted(s) | Rendered::Unchanged(s) => s,
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, Rendered::Converted(_))
    }
}

/// Raw text read off a listing page, `None` wherever the element was missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFields {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location_and_date: Option<String>,
    pub skills: Option<String>,
    pub salary: Option<String>,
    pub logo_url: Option<String>,
}

/// Turns raw page text into a `Listing`.
pub struct Normalizer {
    translator: Box<dyn Translator>,
    regions: Box<dyn RegionLookup>,
    vocabulary: Vec<String>,
    rates: Rates,
    country: String,
    source: String,
}

impl Normalizer {
    pub fn new(
        translator: Box<dyn Translator>,
        regions: Box<dyn RegionLookup>,
        vocabulary: Vec<String>,
        rates: Rates,
        country: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            translator,
            regions,
            vocabulary,
            rates,
            country: country.into(),
            source: source.into(),
        }
    }

    pub async fn normalize(&self, id: &str, raw: &RawFields) -> Listing {
        let raw_title = match present(&raw.title) {
            Some(t) => {
                let rendered = translate::translate_title(self.translator.as_ref(), t).await;
                if !rendered.is_converted() {
                    debug!("Listing {}: title kept untranslated", id);
                }
                Some(rendered.into_inner())
            }
            None => None,
        };
        let company = present(&raw.company)
            .map(|c| company::normalize_company(c).into_inner())
            .filter(|c| !c.is_empty());

        let blob = present(&raw.location_and_date).unwrap_or("");
        let posted_date = date::parse_posted_date(blob);
        let location = location::extract_location(blob)
            .map(|l| self.regions.identify(&l))
            .filter(|l| !l.is_empty() && l != NA);

        let skills = skills::extract_skills(present(&raw.skills).unwrap_or(""), &self.vocabulary);
        let salary_info = present(&raw.salary).and_then(|s| salary::parse_salary(s, &self.rates));

        Listing {
            id: id.to_string(),
            posted_date,
            classified_title: ClassifiedTitle::Unknown,
            raw_title,
            company,
            logo_url: present(&raw.logo_url).map(str::to_string),
            country: self.country.clone(),
            location,
            skills,
            salary_info,
            source: self.source.clone(),
        }
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != NA)
}
