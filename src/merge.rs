//! Merging a fresh capture into a previously persisted record.

use crate::models::ProfileRecord;

/// Take everything from `fresh` except `computer_info`, which always comes
/// from `existing` because the inventory pipeline owns it.
pub fn merge(existing: &ProfileRecord, fresh: ProfileRecord) -> ProfileRecord {
    ProfileRecord {
        computer_info: existing.computer_info.clone(),
        ..fresh
    }
}
