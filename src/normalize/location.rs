use std::sync::LazyLock;

use regex::Regex;

// Text after a locative preposition, up to a sentence boundary, optionally "City, Region".
static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?i:в|in|da)\s+([a-zA-Zа-яА-ЯёЁўЎқҚғҒҳҲʼ'\- ]+(?:,\s?[a-zA-Zа-яА-ЯёЁўЎқҚғҒҳҲʼ'\- ]+)?)\b",
    )
    .unwrap()
});

/// Pull the raw location phrase out of a "posted on ... in ..." blob.
pub fn extract_location(text: &str) -> Option<String> {
    let caps = LOCATION_RE.captures(text)?;
    let raw = caps[1].trim().trim_end_matches(',').trim();
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Maps a raw location phrase to a normalized region or city name.
pub trait RegionLookup: Send + Sync {
    fn identify(&self, raw: &str) -> String;
}

/// Bundled alias table for Uzbekistan; unmatched input passes through trimmed.
pub struct UzbekRegions;

const REGION_ALIASES: &[(&str, &[&str])] = &[
    ("Tashkent", &["tashkent", "toshkent", "ташкент", "тошкент"]),
    ("Samarkand", &["samarkand", "samarqand", "самарканд", "самарқанд"]),
    ("Bukhara", &["bukhara", "buxoro", "бухар", "бухоро"]),
    ("Andijan", &["andijan", "andijon", "андижан", "андижон"]),
    ("Fergana", &["fergana", "farg'ona", "fargʻona", "ферган", "фарғона"]),
    ("Namangan", &["namangan", "наманган"]),
    ("Nukus", &["nukus", "нукус"]),
    ("Karakalpakstan", &["karakalpak", "qoraqalpog", "каракалпак", "қорақалпоғ"]),
    ("Kashkadarya", &["kashkadar", "qashqadar", "кашкадар", "қашқадар", "karshi", "qarshi", "карши"]),
    ("Surkhandarya", &["surkhandar", "surxondar", "сурхандар", "сурхондар", "termez", "termiz", "термез"]),
    ("Khorezm", &["khorezm", "xorazm", "хорезм", "хоразм", "urgench", "urganch", "ургенч"]),
    ("Navoi", &["navoi", "navoiy", "навои"]),
    ("Jizzakh", &["jizzakh", "jizzax", "джизак", "жиззах"]),
    ("Syrdarya", &["syrdar", "sirdar", "сырдар", "сирдар", "gulistan", "guliston", "гулистан"]),
];

impl RegionLookup for UzbekRegions {
    fn identify(&self, raw: &str) -> String {
        let lower = raw.trim().to_lowercase();
        REGION_ALIASES
            .iter()
            .find(|(_, aliases)| aliases.iter().any(|a| lower.contains(a)))
            .map(|(canonical, _)| canonical.to_string())
            .unwrap_or_else(|| raw.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_preposition() {
        assert_eq!(
            extract_location("Vacancy posted on July 4, 2024 in Tashkent").as_deref(),
            Some("Tashkent")
        );
    }

    #[test]
    fn russian_preposition() {
        assert_eq!(
            extract_location("Вакансия опубликована 12 июля 2024 в Ташкенте").as_deref(),
            Some("Ташкенте")
        );
    }

    #[test]
    fn preposition_at_sentence_start() {
        assert_eq!(
            extract_location("Posted 4 July 2024. In Tashkent").as_deref(),
            Some("Tashkent")
        );
        assert_eq!(
            extract_location("Опубликовано 4 июля 2024. В Самарканде").as_deref(),
            Some("Самарканде")
        );
    }

    #[test]
    fn two_part_location() {
        assert_eq!(
            extract_location("Posted 1 May 2024 in Chirchiq, Tashkent region. Apply now").as_deref(),
            Some("Chirchiq, Tashkent region")
        );
    }

    #[test]
    fn no_preposition() {
        assert_eq!(extract_location("Tashkent"), None);
        assert_eq!(extract_location(""), None);
    }

    #[test]
    fn region_aliases() {
        let r = UzbekRegions;
        assert_eq!(r.identify("Ташкенте"), "Tashkent");
        assert_eq!(r.identify("Toshkent shahri"), "Tashkent");
        assert_eq!(r.identify("Samarqand"), "Samarkand");
        assert_eq!(r.identify("  Atlantis "), "Atlantis");
    }
}
