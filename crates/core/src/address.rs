//! Street address normalization.
//!
//! Saved addresses and search terms are normalized to the uppercase,
//! abbreviated form the city's violation records use, e.g.
//! `"123 North Main Street, Pittsburgh, PA 15213"` → `"123 N MAIN ST"`.

/// Street suffixes and directionals, full form → abbreviation.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("STREET", "ST"),
    ("AVENUE", "AVE"),
    ("BOULEVARD", "BLVD"),
    ("DRIVE", "DR"),
    ("ROAD", "RD"),
    ("LANE", "LN"),
    ("PLACE", "PL"),
    ("COURT", "CT"),
    ("TERRACE", "TER"),
    ("WAY", "WAY"),
    ("HIGHWAY", "HWY"),
    ("PARKWAY", "PKWY"),
    ("SQUARE", "SQ"),
    ("CIRCLE", "CIR"),
    ("ALLEY", "ALY"),
    ("NORTH", "N"),
    ("SOUTH", "S"),
    ("EAST", "E"),
    ("WEST", "W"),
];

/// Locality tokens stripped from the end of an address.
const LOCALITY: &[&str] = &["PITTSBURGH", "PGH", "PA", "PENNSYLVANIA"];

/// Normalize a street address for matching.
///
/// Uppercases, drops punctuation, collapses whitespace, strips a trailing
/// "Pittsburgh, PA 152xx" locality and abbreviates suffixes/directionals.
pub fn normalize_address(raw: &str) -> String {
    // Everything after the first comma is city/state/zip.
    let street = raw.split(',').next().unwrap_or("");

    let cleaned: String = street
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' {
                c.to_ascii_uppercase()
            } else {
                ' '
            }
        })
        .collect();

    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();

    // Strip locality written without commas: "... ST PITTSBURGH PA 15213".
    while let Some(last) = tokens.last() {
        let is_zip = last.len() == 5 && last.chars().all(|c| c.is_ascii_digit());
        if tokens.len() > 2 && (is_zip || LOCALITY.contains(last)) {
            tokens.pop();
        } else {
            break;
        }
    }

    tokens
        .into_iter()
        .map(|t| {
            ABBREVIATIONS
                .iter()
                .find(|(full, _)| *full == t)
                .map(|(_, abbr)| *abbr)
                .unwrap_or(t)
        })
        .collect::<Vec<_>>()
        .join(" ")
}
