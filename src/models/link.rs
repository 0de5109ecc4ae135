//! Links discovered on the directory listing.

use serde::{Deserialize, Serialize};

/// One entry from the directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileLink {
    /// Name as shown on the listing card.
    pub name: String,
    /// Absolute profile URL (dedup key).
    pub url: String,
    pub thumbnail_url: Option<String>,
    /// Office shown on the listing card, when the card exposes one.
    pub office_location: Option<String>,
}

impl ProfileLink {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            thumbnail_url: None,
            office_location: None,
        }
    }
}
