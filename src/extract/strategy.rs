//! Ordered candidate strategies for a single field.

use regex::{Regex, RegexBuilder};
use tracing::debug;

use super::text::{clean_text, strip_scheme};
use crate::browser::{element_attr, element_text, Page};

/// One way of reading a field off a profile page.
#[derive(Debug, Clone, Copy)]
pub enum Strategy {
    /// Text of the first element under `selector` that has any.
    Text { selector: &'static str },
    /// Attribute of the first element under `selector`.
    Attr {
        selector: &'static str,
        attr: &'static str,
        strip_prefix: Option<&'static str>,
    },
    /// Attribute of the `index`th element under `selector`.
    NthAttr {
        selector: &'static str,
        attr: &'static str,
        index: usize,
        strip_prefix: Option<&'static str>,
    },
    /// Capture `group` of a regex over the body text.
    BodyPattern { pattern: &'static str, group: usize },
    /// First short heading-like text that contains none of `reject`.
    FilteredText {
        selectors: &'static [&'static str],
        reject: &'static [&'static str],
    },
    /// First of `words` found (as a whole word) in the body text.
    Vocabulary { words: &'static [&'static str] },
}

/// Honorifics that mark a name rather than a title.
const HONORIFICS: &[&str] = &["mr.", "ms.", "mrs.", "dr.", "prof."];

impl Strategy {
    /// Run against `page`, whose visible text is `body`. Empty results are `None`.
    pub async fn apply(&self, page: &dyn Page, body: &str) -> Option<String> {
        let value = match *self {
            Strategy::Text { selector } => {
                let mut found = None;
                for element in page.query(selector).await.ok()? {
                    let text = clean_text(&element_text(element.as_ref()).await);
                    if !text.is_empty() {
                        found = Some(text);
                        break;
                    }
                }
                found
            }
            Strategy::Attr {
                selector,
                attr,
                strip_prefix,
            } => {
                let element = page.query_first(selector).await.ok()??;
                let value = element_attr(element.as_ref(), attr).await?;
                Some(strip(value, strip_prefix))
            }
            Strategy::NthAttr {
                selector,
                attr,
                index,
                strip_prefix,
            } => {
                let elements = page.query(selector).await.ok()?;
                let value = element_attr(elements.get(index)?.as_ref(), attr).await?;
                Some(strip(value, strip_prefix))
            }
            Strategy::BodyPattern { pattern, group } => {
                let re = match Regex::new(pattern) {
                    Ok(re) => re,
                    Err(e) => {
                        debug!("Bad pattern {}: {}", pattern, e);
                        return None;
                    }
                };
                re.captures(body)
                    .and_then(|caps| caps.get(group))
                    .map(|m| m.as_str().trim().to_string())
            }
            Strategy::FilteredText { selectors, reject } => {
                filtered_text(page, selectors, reject).await
            }
            Strategy::Vocabulary { words } => vocabulary(body, words),
        };
        value.filter(|v| !v.is_empty())
    }
}

fn strip(value: String, prefix: Option<&str>) -> String {
    match prefix {
        Some(prefix) => strip_scheme(&value, prefix),
        None => value,
    }
}

async fn filtered_text(
    page: &dyn Page,
    selectors: &[&str],
    reject: &[&str],
) -> Option<String> {
    for selector in selectors {
        let Ok(elements) = page.query(selector).await else {
            continue;
        };
        for element in elements {
            let text = clean_text(&element_text(element.as_ref()).await);
            let lower = text.to_lowercase();
            let len = text.chars().count();
            if !(3..50).contains(&len)
                || text.starts_with("I'm")
                || HONORIFICS.iter().any(|h| lower.starts_with(h))
                || reject.iter().any(|phrase| lower.contains(phrase))
            {
                continue;
            }
            return Some(text);
        }
    }
    None
}

fn vocabulary(body: &str, words: &[&str]) -> Option<String> {
    words.iter().find_map(|word| {
        let re = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(word)))
            .case_insensitive(true)
            .build()
            .ok()?;
        re.find(body).map(|m| m.as_str().to_string())
    })
}

/// Apply `strategies` in order; the first non-empty value wins.
pub async fn first_match(
    strategies: &[Strategy],
    page: &dyn Page,
    body: &str,
) -> Option<(usize, String)> {
    for (index, strategy) in strategies.iter().enumerate() {
        if let Some(value) = strategy.apply(page, body).await {
            return Some((index, value));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::scripted::{ScriptedDocument, ScriptedElement, ScriptedPage};

    const URL: &str = "https://dir.example.com/employee/1";

    async fn page_with(doc: ScriptedDocument) -> ScriptedPage {
        let page = ScriptedPage::new();
        page.add_document(URL, doc);
        page.goto(URL).await.unwrap();
        page
    }

    #[tokio::test]
    async fn test_first_non_empty_strategy_wins() {
        let page = page_with(
            ScriptedDocument::new("Profile")
                .element("h1", ScriptedElement::text("   "))
                .element(".EntityHeader__Title", ScriptedElement::text("Ada  Lovelace")),
        )
        .await;
        let strategies = [
            Strategy::Text { selector: "h1" },
            Strategy::Text { selector: "[data-kafieldname=\"name\"]" },
            Strategy::Text { selector: ".EntityHeader__Title" },
        ];

        let (index, value) = first_match(&strategies, &page, "").await.unwrap();
        assert_eq!(index, 2);
        assert_eq!(value, "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_nth_attr_with_prefix() {
        let page = page_with(
            ScriptedDocument::new("Profile")
                .element("a[href^=\"tel:\"]", ScriptedElement::link("Work", "tel:+1-212-555-0100"))
                .element("a[href^=\"tel:\"]", ScriptedElement::link("Mobile", "tel:+1-917-555-0199")),
        )
        .await;
        let mobile = Strategy::NthAttr {
            selector: "a[href^=\"tel:\"]",
            attr: "href",
            index: 1,
            strip_prefix: Some("tel:"),
        };
        assert_eq!(mobile.apply(&page, "").await.as_deref(), Some("+1-917-555-0199"));

        let third = Strategy::NthAttr {
            selector: "a[href^=\"tel:\"]",
            attr: "href",
            index: 2,
            strip_prefix: Some("tel:"),
        };
        assert_eq!(third.apply(&page, "").await, None);
    }

    #[tokio::test]
    async fn test_body_pattern_and_vocabulary() {
        let page = page_with(ScriptedDocument::new("Profile")).await;
        let body = "Contact ada@example.com. With the firm for 12 years. Senior Associate";

        let email = Strategy::BodyPattern {
            pattern: r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
            group: 0,
        };
        assert_eq!(email.apply(&page, body).await.as_deref(), Some("ada@example.com"));

        let years = Strategy::BodyPattern {
            pattern: r"(\d+)\s+years?",
            group: 1,
        };
        assert_eq!(years.apply(&page, body).await.as_deref(), Some("12"));

        let titles = Strategy::Vocabulary {
            words: &["Project Manager", "Associate", "Senior"],
        };
        assert_eq!(titles.apply(&page, body).await.as_deref(), Some("Associate"));

        let lead = Strategy::Vocabulary { words: &["Lead"] };
        assert_eq!(lead.apply(&page, "Leadership retreat").await, None);
    }

    #[tokio::test]
    async fn test_filtered_text_skips_section_headings() {
        let page = page_with(
            ScriptedDocument::new("Profile")
                .element("h2", ScriptedElement::text("The Basics"))
                .element("h2", ScriptedElement::text("Dr. Someone"))
                .element("h3", ScriptedElement::text("Design Director")),
        )
        .await;
        let strategy = Strategy::FilteredText {
            selectors: &["h2", "h3"],
            reject: &["the basics", "education"],
        };
        assert_eq!(strategy.apply(&page, "").await.as_deref(), Some("Design Director"));
    }
}
