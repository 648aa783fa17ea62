use std::sync::LazyLock;

use regex::Regex;

use super::Rendered;

// Legal-entity abbreviations, matched as whole tokens (optionally quoted).
static LEGAL_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|[\s"«»(])(?:ООО|ОАО|ЗАО|ПАО|АО|ИП|ЧП|МЧЖ|XK|MChJ|LLC)(?:$|[\s"«»).,])"#)
        .unwrap()
});
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Remove legal-entity tokens and collapse whitespace.
pub fn strip_legal_suffixes(name: &str) -> String {
    // Matches consume their delimiters, so run until stable to catch adjacent tokens.
    let mut current = name.to_string();
    loop {
        let next = LEGAL_SUFFIX_RE.replace_all(&current, " ").into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    let collapsed = WHITESPACE_RE.replace_all(current.trim(), " ");
    collapsed
        .trim_matches(|c: char| c == '"' || c == '«' || c == '»' || c.is_whitespace())
        .to_string()
}

fn latin_for(c: char) -> Option<&'static str> {
    let s = match c.to_lowercase().next()? {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' => "e",
        'ё' => "yo",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "kh",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "shch",
        'ъ' => "",
        'ы' => "y",
        'ь' => "",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        'ў' => "o'",
        'қ' => "q",
        'ғ' => "g'",
        'ҳ' => "h",
        _ => return None,
    };
    Some(s)
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnsupportedScript(pub char);

/// Phonetic Latin form of Cyrillic text. Fails on letters from any other non-Latin script.
pub fn transliterate(text: &str) -> Result<String, UnsupportedScript> {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii() || !c.is_alphabetic() {
            out.push(c);
            continue;
        }
        if let Some(latin) = latin_for(c) {
            if c.is_uppercase() {
                let mut chars = latin.chars();
                if let Some(first) = chars.next() {
                    out.extend(first.to_uppercase());
                    out.push_str(chars.as_str());
                }
            } else {
                out.push_str(latin);
            }
        } else if is_latin_extended(c) {
            out.push(c);
        } else {
            return Err(UnsupportedScript(c));
        }
    }
    Ok(out)
}

fn is_latin_extended(c: char) -> bool {
    matches!(c as u32, 0x00C0..=0x024F | 0x1E00..=0x1EFF | 0x02BB | 0x02BC)
}

/// Normalize a company name for storage; never fails.
pub fn normalize_company(raw: &str) -> Rendered {
    let stripped = strip_legal_suffixes(raw);
    match transliterate(&stripped) {
        Ok(latin) if latin != stripped => Rendered::Converted(WHITESPACE_RE.replace_all(latin.trim(), " ").into_owned()),
        Ok(_) => Rendered::Unchanged(stripped),
        Err(UnsupportedScript(c)) => {
            tracing::debug!("Transliteration skipped for {:?}: unsupported character {:?}", stripped, c);
            Rendered::Unchanged(stripped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_suffix_and_transliterates() {
        let r = normalize_company("ООО  \"Яндекс\"");
        assert_eq!(r, Rendered::Converted("Yandeks".into()));
    }

    #[test]
    fn suffix_inside_word_is_kept() {
        assert_eq!(strip_legal_suffixes("ЗАО Каока"), "Каока");
        assert_eq!(strip_legal_suffixes("АОН Групп"), "АОН Групп");
    }

    #[test]
    fn latin_name_unchanged() {
        let r = normalize_company("EPAM   Systems LLC");
        assert_eq!(r, Rendered::Unchanged("EPAM Systems".into()));
    }

    #[test]
    fn uzbek_cyrillic_letters() {
        assert_eq!(transliterate("Ўзбекистон").unwrap(), "O'zbekiston");
        assert_eq!(transliterate("Қишлоқ").unwrap(), "Qishloq");
    }

    #[test]
    fn unsupported_script_falls_back() {
        let r = normalize_company("ИП 北京 Tech");
        assert_eq!(r, Rendered::Unchanged("北京 Tech".into()));
    }

    #[test]
    fn multiple_tokens() {
        assert_eq!(strip_legal_suffixes("ООО ИП Alpha"), "Alpha");
    }
}
