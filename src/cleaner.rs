use std::collections::HashSet;

use tracing::info;

use crate::listing::{Listing, Taxonomy};

/// Row counts after each cleaning step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub input: usize,
    pub classified: usize,
    pub complete: usize,
    pub unique: usize,
}

/// Filter, dedup and project classified listings. Order of survivors is preserved.
pub fn clean(listings: Vec<Listing>, taxonomy: &Taxonomy) -> (Vec<Listing>, CleanReport) {
    let mut report = CleanReport {
        input: listings.len(),
        ..Default::default()
    };

    let rows: Vec<Listing> = listings
        .into_iter()
        .filter(|l| taxonomy.contains(&l.classified_title))
        .collect();
    report.classified = rows.len();
    info!("Taxonomy filter: {} -> {}", report.input, report.classified);

    let rows: Vec<Listing> = rows.into_iter().filter(is_complete).collect();
    report.complete = rows.len();
    info!("Required fields: {} -> {}", report.classified, report.complete);

    let rows = dedup(rows);
    report.unique = rows.len();
    info!("Dedup on company/title/location: {} -> {}", report.complete, report.unique);

    (rows.into_iter().map(project).collect(), report)
}

fn is_complete(l: &Listing) -> bool {
    let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
    !l.id.trim().is_empty() && filled(&l.raw_title) && filled(&l.company) && l.posted_date.is_some()
}

/// First occurrence of each (company, raw_title, location) wins.
fn dedup(rows: Vec<Listing>) -> Vec<Listing> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let key = {
            let (c, t, loc) = row.dedup_key();
            (c.map(str::to_owned), t.map(str::to_owned), loc.map(str::to_owned))
        };
        if seen.insert(key) {
            out.push(row);
        }
    }
    out
}

fn project(mut l: Listing) -> Listing {
    let tidy = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    l.id = l.id.trim().to_string();
    l.raw_title = tidy(l.raw_title);
    l.company = tidy(l.company);
    l.logo_url = tidy(l.logo_url);
    l.location = tidy(l.location);
    l.country = l.country.trim().to_string();
    l.source = l.source.trim().to_string();
    l
}
