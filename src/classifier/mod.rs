pub mod gemini;

use std::sync::LazyLock;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use tracing::{info, warn};

use crate::listing::{ClassifiedTitle, Taxonomy};
pub use gemini::{ClassificationService, GeminiService};

static PUNCT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("got {titles} titles but {skills} skill lists")]
    LengthMismatch { titles: usize, skills: usize },
}

/// Labels raw titles against a fixed taxonomy, one service call per batch.
pub struct TitleClassifier<'a> {
    service: &'a dyn ClassificationService,
    taxonomy: &'a Taxonomy,
    batch_size: usize,
    batch_delay: Duration,
}

impl<'a> TitleClassifier<'a> {
    pub fn new(
        service: &'a dyn ClassificationService,
        taxonomy: &'a Taxonomy,
        batch_size: usize,
        batch_delay: Duration,
    ) -> Self {
        Self {
            service,
            taxonomy,
            batch_size: batch_size.max(1),
            batch_delay,
        }
    }

    /// One label per input title, in input order. A batch whose call fails or whose
    /// answer has the wrong number of labels is labelled `Unknown` throughout.
    pub async fn classify(
        &self,
        titles: &[String],
        skills: &[String],
    ) -> Result<Vec<ClassifiedTitle>, ClassifierError> {
        if titles.len() != skills.len() {
            return Err(ClassifierError::LengthMismatch {
                titles: titles.len(),
                skills: skills.len(),
            });
        }

        let batches = titles.len().div_ceil(self.batch_size);
        let pb = ProgressBar::new(titles.len() as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40} {pos}/{len} batch {msg}")
        {
            pb.set_style(style);
        }

        let mut labels = Vec::with_capacity(titles.len());
        for (n, (t, s)) in titles
            .chunks(self.batch_size)
            .zip(skills.chunks(self.batch_size))
            .enumerate()
        {
            pb.set_message(format!("{}/{}", n + 1, batches));
            labels.extend(self.classify_batch(n + 1, t, s).await);
            pb.inc(t.len() as u64);

            if n + 1 < batches && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
        }
        pb.finish_and_clear();

        let known = labels.iter().filter(|l| l.is_known()).count();
        info!("Classified {} titles ({} unknown)", labels.len(), labels.len() - known);
        Ok(labels)
    }

    async fn classify_batch(&self, n: usize, titles: &[String], skills: &[String]) -> Vec<ClassifiedTitle> {
        let prompt = build_prompt(self.taxonomy, titles, skills);
        let unknown = || vec![ClassifiedTitle::Unknown; titles.len()];

        let answer = match self.service.complete(&prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Batch {} failed, labelling {} titles unknown: {}", n, titles.len(), e);
                return unknown();
            }
        };
        let parts: Vec<&str> = answer.trim().split(',').map(str::trim).collect();
        if parts.len() != titles.len() {
            warn!(
                "Batch {}: expected {} labels, got {}; labelling unknown",
                n,
                titles.len(),
                parts.len()
            );
            return unknown();
        }
        parts.into_iter().map(|p| self.taxonomy.resolve(p)).collect()
    }
}

/// Lowercase, punctuation stripped, whitespace collapsed.
pub fn clean_title(title: &str) -> String {
    let stripped = PUNCT_RE.replace_all(title, "");
    SPACE_RE.replace_all(&stripped, " ").trim().to_lowercase()
}

pub fn build_prompt(taxonomy: &Taxonomy, titles: &[String], skills: &[String]) -> String {
    let cleaned: Vec<String> = titles.iter().map(|t| clean_title(t)).collect();
    let titles_json = serde_json::to_string(&cleaned).unwrap_or_default();
    let skills_json = serde_json::to_string(skills).unwrap_or_default();
    format!(
        r#"You are an expert job title classifier. Match each job `Title` and its `Skills` to the single most appropriate title from the list below.

### Allowed titles (the only valid outputs):
{labels}

### Rules:
1. Use both the `Title` and the `Skills`.
2. If no title clearly fits, answer "unknown" for that job.
3. Answer with exactly one label per job, in input order.
4. Answer on a single line of comma-separated labels, with no explanation or formatting.

### Example input:
Title: ["ведущий разработчик java", "data analyst", "инженер по данным"]
Skills: ["Spring, SQL", "Tableau, Excel", "ETL, Airflow, Python"]

### Example output:
Backend Developer, Data Analyst, Data Engineer

### Input:
Title: {titles}
Skills: {skills}

### Output:
"#,
        labels = taxonomy.labels().join(", "),
        titles = titles_json,
        skills = skills_json,
    )
}
