//! EU member state codes and the Greece `EL`/`GR` split.
//!
//! Rate tables are keyed by ISO 3166-1 alpha-2 (`GR`), while VIES and TEDB
//! address Greece as `EL`.

/// EU member states, ISO form. Sorted for binary search.
pub static EU_MEMBER_STATES: &[&str] = &[
    "AT", "BE", "BG", "CY", "CZ", "DE", "DK", "EE", "ES", "FI", "FR", "GR", "HR", "HU", "IE", "IT",
    "LT", "LU", "LV", "MT", "NL", "PL", "PT", "RO", "SE", "SI", "SK",
];

/// Check whether `code` (ISO or `EL`) is an EU member state.
pub fn is_eu(code: &str) -> bool {
    EU_MEMBER_STATES
        .binary_search(&normalize_country(code).as_str())
        .is_ok()
}

/// Trim, upper-case and map `EL` to `GR`.
pub fn normalize_country(code: &str) -> String {
    let upper = code.trim().to_ascii_uppercase();
    if upper == "EL" { "GR".into() } else { upper }
}

/// Country code as the EU web services expect it (`GR` becomes `EL`).
pub fn service_country(code: &str) -> String {
    let upper = code.trim().to_ascii_uppercase();
    if upper == "GR" { "EL".into() } else { upper }
}
