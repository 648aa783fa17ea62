use std::collections::BTreeSet;

/// Case-insensitive substring match against the vocabulary.
///
/// Returns the vocabulary's own spelling for every hit, never the matched text.
pub fn extract_skills(text: &str, vocabulary: &[String]) -> BTreeSet<String> {
    if text.trim().is_empty() {
        return BTreeSet::new();
    }
    let lower = text.to_lowercase();
    vocabulary
        .iter()
        .filter(|skill| !skill.trim().is_empty() && lower.contains(&skill.to_lowercase()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> Vec<String> {
        ["Python", "SQL", "Docker", ".NET", "Vue.js", "AWS"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn canonical_tokens_sorted() {
        let found = extract_skills("We use PYTHON, postgresql and docker on aws", &vocab());
        let found: Vec<_> = found.into_iter().collect();
        assert_eq!(found, vec!["AWS", "Docker", "Python", "SQL"]);
    }

    #[test]
    fn dotted_tokens() {
        let found = extract_skills("Опыт работы с .net и vue.js", &vocab());
        assert!(found.contains(".NET"));
        assert!(found.contains("Vue.js"));
    }

    #[test]
    fn empty_text() {
        assert!(extract_skills("", &vocab()).is_empty());
        assert!(extract_skills("   ", &vocab()).is_empty());
    }

    #[test]
    fn duplicates_collapse() {
        let found = extract_skills("python Python PYTHON", &vocab());
        assert_eq!(found.len(), 1);
    }
}
