//! Text and URL normalization for extracted values.

use url::Url;

/// Resolve `href` against `base`, dropping fragments-only and script links.
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.to_ascii_lowercase().starts_with("javascript:") {
        return None;
    }
    let resolved = match Url::parse(href) {
        Ok(absolute) => absolute,
        Err(_) => Url::parse(base).ok()?.join(href).ok()?,
    };
    Some(resolved.to_string())
}

/// Host of a URL, lowercased.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .host_str()
        .map(|host| host.to_ascii_lowercase())
}

/// Collapse runs of whitespace to single spaces and trim.
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove a case-insensitive scheme prefix such as `mailto:` and any query.
pub fn strip_scheme(value: &str, prefix: &str) -> String {
    let value = value.trim();
    let rest = match value.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => &value[prefix.len()..],
        _ => value,
    };
    rest.split('?').next().unwrap_or_default().trim().to_string()
}

/// First run of ASCII digits parsed as a number.
pub fn leading_number(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Office spellings folded onto the firm's canonical office names.
const OFFICE_ALIASES: &[(&str, &str)] = &[
    ("new york city", "New York"),
    ("new york", "New York"),
    ("nyc", "New York"),
    ("ny", "New York"),
    ("shanghai", "Shanghai"),
    ("california", "California"),
    ("los angeles", "California"),
    ("san francisco", "California"),
    ("ca", "California"),
    ("sf", "California"),
];

/// Map an office string onto a canonical name, else title-case it.
///
/// Aliases match the whole string or a whole word run inside it, so "ca"
/// never fires inside "Jamaica".
pub fn normalize_location(raw: &str) -> String {
    let cleaned = clean_text(raw);
    if cleaned.is_empty() {
        return String::new();
    }
    let lower = cleaned.to_lowercase();

    if let Some((_, canonical)) = OFFICE_ALIASES.iter().find(|(alias, _)| *alias == lower) {
        return canonical.to_string();
    }

    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    for (alias, canonical) in OFFICE_ALIASES {
        let alias_words: Vec<&str> = alias.split(' ').collect();
        if words
            .windows(alias_words.len())
            .any(|window| window == alias_words.as_slice())
        {
            return canonical.to_string();
        }
    }

    title_case(&lower)
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether `href` is a personal site: external to the directory and not a
/// collaboration or professional-network link.
pub fn is_personal_website(href: &str, directory_host: Option<&str>) -> bool {
    let lower = href.trim().to_ascii_lowercase();
    if !lower.starts_with("http") || lower.contains("teams.microsoft.com") || lower.contains("linkedin.com") {
        return false;
    }
    match (host_of(&lower), directory_host) {
        (Some(host), Some(directory)) => host != directory,
        (Some(_), None) => true,
        (None, _) => false,
    }
}
