//! Selector tables for each profile field. Order is priority.

use super::strategy::Strategy;

pub const NAME: &[Strategy] = &[
    Strategy::Text { selector: "h1" },
    Strategy::Text {
        selector: r#"[data-kafieldname="name"]"#,
    },
    Strategy::Text {
        selector: ".EntityHeader__Title",
    },
];

/// Headings that are profile section labels or bio prose, not titles.
const NON_TITLE_PHRASES: &[&str] = &[
    "the basics",
    "years with firm",
    "education",
    "institution",
    "degree",
    "specialty",
    "contact info",
    "email",
    "phone",
    "teams",
    "recent posts",
    "projects",
    "personal bio",
    "i was born",
    "i still live",
    "i foster",
    "i do",
];

/// Job-title words, most specific first.
const JOB_TITLES: &[&str] = &[
    "Project Coordinator",
    "Project Manager",
    "Vice President",
    "Head of",
    "Architect",
    "Designer",
    "Engineer",
    "Director",
    "Manager",
    "Coordinator",
    "Specialist",
    "Analyst",
    "Consultant",
    "Associate",
    "Principal",
    "Senior",
    "Lead",
    "VP",
];

pub const POSITION: &[Strategy] = &[
    Strategy::Text {
        selector: r#"span[data-kafieldname="title"]"#,
    },
    Strategy::FilteredText {
        selectors: &["h2", "h3", ".title", ".job-title"],
        reject: NON_TITLE_PHRASES,
    },
    Strategy::Vocabulary { words: JOB_TITLES },
];

pub const DEPARTMENT: &[Strategy] = &[
    Strategy::Text {
        selector: r#"[data-kafieldname="department"]"#,
    },
    Strategy::Text {
        selector: ".department",
    },
];

pub const BIO: &[Strategy] = &[
    Strategy::Text {
        selector: r#"[data-kafieldname="bio"]"#,
    },
    Strategy::Text { selector: ".bio" },
    Strategy::Text { selector: ".about" },
    Strategy::Text {
        selector: ".description",
    },
];

pub const EMAIL: &[Strategy] = &[
    Strategy::Attr {
        selector: r#"a[href^="mailto:"]"#,
        attr: "href",
        strip_prefix: Some("mailto:"),
    },
    Strategy::BodyPattern {
        pattern: r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
        group: 0,
    },
];

const TEL_LINK: &str = r#"a[href^="tel:"]"#;

pub const PHONE: &[Strategy] = &[Strategy::NthAttr {
    selector: TEL_LINK,
    attr: "href",
    index: 0,
    strip_prefix: Some("tel:"),
}];

pub const MOBILE: &[Strategy] = &[Strategy::NthAttr {
    selector: TEL_LINK,
    attr: "href",
    index: 1,
    strip_prefix: Some("tel:"),
}];

/// The listing-card hint is tried after these.
pub const OFFICE_LOCATION: &[Strategy] = &[
    Strategy::Text {
        selector: r#"[data-kafieldname="office"]"#,
    },
    Strategy::Text {
        selector: ".location",
    },
    Strategy::Text { selector: ".office" },
];

pub const YEARS_WITH_FIRM: &[Strategy] = &[
    Strategy::Text {
        selector: r#"div[data-kafieldname="hireDateForTenure"] .EntityFields__InfoFieldValue-sc-129sxys-5"#,
    },
    Strategy::BodyPattern {
        pattern: r"(?i)(\d+)\s+years?",
        group: 1,
    },
];

pub const TEAMS: &[Strategy] = &[Strategy::Attr {
    selector: r#"a[href*="teams.microsoft.com"]"#,
    attr: "href",
    strip_prefix: None,
}];

pub const LINKEDIN: &[Strategy] = &[Strategy::Attr {
    selector: r#"a[href*="linkedin.com"]"#,
    attr: "href",
    strip_prefix: None,
}];

/// Candidate anchors for the personal website filter.
pub const EXTERNAL_LINK: &str = r#"a[href^="http"]"#;

/// Profile photo selectors; also used for the screenshot fallback.
pub const IMAGE_SELECTORS: &[&str] = &[
    "img.EntityHeader__HeaderPhoto-sc-1yar8fm-1",
    r#"img[src*="/api/image/"]"#,
    ".profile-image img",
    ".avatar img",
];

pub const IMAGE: &[Strategy] = &[
    Strategy::Attr {
        selector: IMAGE_SELECTORS[0],
        attr: "src",
        strip_prefix: None,
    },
    Strategy::Attr {
        selector: IMAGE_SELECTORS[1],
        attr: "src",
        strip_prefix: None,
    },
    Strategy::Attr {
        selector: IMAGE_SELECTORS[2],
        attr: "src",
        strip_prefix: None,
    },
    Strategy::Attr {
        selector: IMAGE_SELECTORS[3],
        attr: "src",
        strip_prefix: None,
    },
];

pub const MEMBERSHIP_PILLS: &str =
    r#"div[data-kagridname="grid_3"] .EntityFields__GridPillContent-sc-129sxys-3"#;

/// Values of the degrees grid, read row-major in triples.
pub const EDUCATION_VALUES: &str =
    r#"div[data-kagridname="employeeDegrees"] .EntityFields__InfoFieldValue-sc-129sxys-5"#;

/// Values of the registrations grid, read row-major in fours.
pub const LICENSE_VALUES: &str =
    r#"div[data-kagridname="employeeRegistrations"] .EntityFields__InfoFieldValue-sc-129sxys-5"#;

pub const POST_LINK: &str = r#"a[href*="/post/"]"#;
pub const POST_TITLE: &str = ".ListPost__Title-sc-1vvfvm-1";
