//! Grouping of flat grid values into fixed-arity entries.
//!
//! The degrees and registrations grids render as one flat list of value
//! cells. Entries are read row-major; a trailing partial group is dropped.

use crate::models::{EducationEntry, LicenseEntry};

pub const EDUCATION_ARITY: usize = 3;
pub const LICENSE_ARITY: usize = 4;

/// Split `values` into `values.len() / arity` groups, empty strings as `None`.
pub fn partition(values: &[String], arity: usize) -> Vec<Vec<Option<String>>> {
    if arity == 0 {
        return Vec::new();
    }
    values
        .chunks_exact(arity)
        .map(|chunk| {
            chunk
                .iter()
                .map(|v| Some(v.trim().to_string()).filter(|v| !v.is_empty()))
                .collect()
        })
        .collect()
}

pub fn education(values: &[String]) -> Vec<EducationEntry> {
    partition(values, EDUCATION_ARITY)
        .into_iter()
        .map(|group| {
            let mut fields = group.into_iter();
            EducationEntry {
                institution: fields.next().flatten(),
                degree: fields.next().flatten(),
                specialty: fields.next().flatten(),
            }
        })
        .collect()
}

pub fn licenses(values: &[String]) -> Vec<LicenseEntry> {
    partition(values, LICENSE_ARITY)
        .into_iter()
        .map(|group| {
            let mut fields = group.into_iter();
            LicenseEntry {
                license: fields.next().flatten(),
                state: fields.next().flatten(),
                number: fields.next().flatten(),
                earned: fields.next().flatten(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_entry_count_is_floor_of_arity() {
        for n in 0..13 {
            let cells: Vec<String> = (0..n).map(|i| format!("v{}", i)).collect();
            assert_eq!(education(&cells).len(), n / EDUCATION_ARITY);
            assert_eq!(licenses(&cells).len(), n / LICENSE_ARITY);
        }
    }

    #[test]
    fn test_trailing_partial_group_dropped() {
        let cells = values(&["Yale", "M.Arch", "Architecture", "Cornell", "B.Arch"]);
        let entries = education(&cells);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].institution.as_deref(), Some("Yale"));
        assert_eq!(entries[0].specialty.as_deref(), Some("Architecture"));
    }

    #[test]
    fn test_empty_cells_become_none() {
        let cells = values(&["Registered Architect", "NY", " ", "2015"]);
        let entries = licenses(&cells);
        assert_eq!(
            entries,
            vec![LicenseEntry {
                license: Some("Registered Architect".into()),
                state: Some("NY".into()),
                number: None,
                earned: Some("2015".into()),
            }]
        );
    }

    #[test]
    fn test_zero_arity() {
        assert!(partition(&values(&["a"]), 0).is_empty());
    }
}
