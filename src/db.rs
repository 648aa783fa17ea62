use std::collections::HashSet;
use std::path::Path;

use rusqlite::Connection;
use tracing::{info, warn};

use crate::listing::{Listing, NA};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to open store at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("store error: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(path).map_err(|source| StoreError::Open {
        path: path.display().to_string(),
        source,
    })?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS job_listings (
            ID                 TEXT PRIMARY KEY,
            PostedDate         DATE,
            ClassifiedTitle    TEXT,
            RawTitle           TEXT,
            Company            TEXT,
            LogoURL            TEXT,
            Country            TEXT,
            Location           TEXT,
            Skills             TEXT,
            SalaryInfo         TEXT,
            Source             TEXT,
            IngestionTimestamp TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_listings_title ON job_listings(ClassifiedTitle);
        ",
    )?;
    Ok(())
}

// ── Upsert ──

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertReport {
    pub written: usize,
    /// Existing rows replaced by this batch.
    pub replaced: usize,
    pub blank_ids: usize,
    pub duplicate_ids: usize,
}

/// Replace-by-id: delete every stored row whose id is in the batch, then insert the batch.
/// Runs in one transaction; any failure leaves the store untouched.
pub fn upsert_listings(conn: &Connection, listings: &[Listing]) -> Result<UpsertReport> {
    let mut report = UpsertReport::default();
    let mut seen = HashSet::new();
    let mut batch = Vec::with_capacity(listings.len());
    for l in listings {
        let id = l.id.trim();
        if id.is_empty() {
            report.blank_ids += 1;
        } else if !seen.insert(id) {
            report.duplicate_ids += 1;
        } else {
            batch.push((id, l));
        }
    }
    if report.blank_ids > 0 {
        warn!("Excluded {} rows with a blank ID", report.blank_ids);
    }
    if report.duplicate_ids > 0 {
        warn!("Skipped {} repeated IDs in the batch", report.duplicate_ids);
    }

    let tx = conn.unchecked_transaction()?;
    {
        let mut del = tx.prepare("DELETE FROM job_listings WHERE ID = ?1")?;
        for (id, _) in &batch {
            report.replaced += del.execute([id])?;
        }

        let mut ins = tx.prepare(
            "INSERT INTO job_listings
             (ID, PostedDate, ClassifiedTitle, RawTitle, Company, LogoURL,
              Country, Location, Skills, SalaryInfo, Source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;
        for (id, l) in &batch {
            ins.execute(rusqlite::params![
                id,
                l.posted_date.map(|d| d.format("%Y-%m-%d").to_string()),
                l.classified_title.as_str(),
                or_na(&l.raw_title),
                or_na(&l.company),
                or_na(&l.logo_url),
                l.country,
                or_na(&l.location),
                l.skills_joined(),
                l.salary_info.map(|n| n.to_string()).unwrap_or_else(|| NA.to_string()),
                l.source,
            ])?;
            report.written += 1;
        }
    }
    tx.commit()?;
    info!(
        "Upserted {} listings ({} replaced existing rows)",
        report.written, report.replaced
    );
    Ok(report)
}

fn or_na(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or(NA)
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub dated: usize,
    pub with_salary: usize,
    pub latest_ingestion: Option<String>,
    pub by_title: Vec<(String, usize)>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let total: usize = conn.query_row("SELECT COUNT(*) FROM job_listings", [], |r| r.get(0))?;
    let dated: usize = conn.query_row(
        "SELECT COUNT(*) FROM job_listings WHERE PostedDate IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let with_salary: usize = conn.query_row(
        "SELECT COUNT(*) FROM job_listings WHERE SalaryInfo IS NOT NULL AND SalaryInfo != ?1",
        [NA],
        |r| r.get(0),
    )?;
    let latest_ingestion: Option<String> = conn.query_row(
        "SELECT MAX(IngestionTimestamp) FROM job_listings",
        [],
        |r| r.get(0),
    )?;

    let mut stmt = conn.prepare(
        "SELECT ClassifiedTitle, COUNT(*) AS n FROM job_listings
         GROUP BY ClassifiedTitle ORDER BY n DESC, ClassifiedTitle",
    )?;
    let by_title = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Stats {
        total,
        dated,
        with_salary,
        latest_ingestion,
        by_title,
    })
}
