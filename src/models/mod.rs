//! Data models for the directory crawler.

mod link;
mod outcome;
mod profile;

pub use link::ProfileLink;
pub use outcome::ExtractionOutcome;
pub use profile::{
    profile_id_from_url, EducationEntry, LicenseEntry, ProfileRecord, ProjectDetails,
    ProjectSource, RecentPost,
};
