//! Profile records extracted from the directory.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One education entry (institution, degree, specialty).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationEntry {
    pub institution: Option<String>,
    pub degree: Option<String>,
    pub specialty: Option<String>,
}

/// One professional license or registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseEntry {
    /// License name.
    pub license: Option<String>,
    /// Issuing jurisdiction.
    pub state: Option<String>,
    pub number: Option<String>,
    /// Date the license was earned.
    pub earned: Option<String>,
}

/// Where a project entry was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectSource {
    /// The dedicated "show all" project listing.
    ShowAllPage,
    /// Links shown inline on the profile page.
    Inline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDetails {
    pub name: String,
    #[serde(default)]
    pub number: String,
    pub url: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub client: String,
    pub source: ProjectSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentPost {
    pub title: String,
    pub url: String,
}

/// A person's record as captured from their profile page.
///
/// Text fields use the empty string for "not found"; the JSON layout matches
/// what the site generator and inventory pipeline read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    #[serde(rename = "human_name", default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub mobile: String,
    #[serde(default)]
    pub office_location: String,
    #[serde(default)]
    pub profile_url: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_local_path: Option<String>,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub years_with_firm: Option<u32>,
    #[serde(default)]
    pub memberships: Vec<String>,
    #[serde(default)]
    pub education: Vec<EducationEntry>,
    #[serde(default)]
    pub licenses: Vec<LicenseEntry>,
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectDetails>,
    #[serde(default)]
    pub recent_posts: Vec<RecentPost>,
    #[serde(default)]
    pub teams_url: String,
    #[serde(default)]
    pub linkedin_url: String,
    #[serde(default)]
    pub website_url: String,
    pub scraped_at: String,
    #[serde(default)]
    pub profile_id: String,
    /// Hardware inventory attached by the inventory pipeline. Never produced here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computer_info: Option<serde_json::Value>,
}

impl ProfileRecord {
    /// Create an empty record for a profile URL, stamped with the current time.
    pub fn new(profile_url: impl Into<String>) -> Self {
        Self::captured_at(profile_url, Utc::now())
    }

    pub fn captured_at(profile_url: impl Into<String>, at: DateTime<Utc>) -> Self {
        let profile_url = profile_url.into();
        let profile_id = profile_id_from_url(&profile_url);
        Self {
            name: String::new(),
            email: String::new(),
            bio: String::new(),
            phone: String::new(),
            mobile: String::new(),
            office_location: String::new(),
            profile_url,
            image_url: None,
            image_local_path: None,
            position: String::new(),
            department: String::new(),
            years_with_firm: None,
            memberships: Vec::new(),
            education: Vec::new(),
            licenses: Vec::new(),
            projects: BTreeMap::new(),
            recent_posts: Vec::new(),
            teams_url: String::new(),
            linkedin_url: String::new(),
            website_url: String::new(),
            scraped_at: at.to_rfc3339_opts(SecondsFormat::Secs, true),
            profile_id,
            computer_info: None,
        }
    }

    /// A record is worth keeping once it has a name or an email.
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() || !self.email.trim().is_empty()
    }

    pub fn has_image(&self) -> bool {
        self.image_local_path.is_some()
    }

    /// Name for files and logs: the name, else the email local part, else the profile id.
    pub fn display_name(&self) -> String {
        let name = self.name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
        if let Some(local) = self.email.split('@').next().filter(|s| !s.trim().is_empty()) {
            return local.trim().to_string();
        }
        if self.profile_id.is_empty() {
            "Employee_unknown".to_string()
        } else {
            format!("Employee_{}", self.profile_id)
        }
    }

    /// Whether `other` describes the same person.
    pub fn same_identity(&self, other: &ProfileRecord) -> bool {
        if !self.profile_id.is_empty() && self.profile_id == other.profile_id {
            return true;
        }
        let email = self.email.trim();
        !email.is_empty() && email.eq_ignore_ascii_case(other.email.trim())
    }
}

/// Identity key: last non-empty path segment of a profile URL.
pub fn profile_id_from_url(url: &str) -> String {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or_default()
        .to_string()
}
