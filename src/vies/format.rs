//! VAT number normalization before VIES lookups.

use crate::core::{VatError, is_eu};

/// Shortest normalized VAT number accepted: a 2-letter prefix and at least
/// two characters of national number.
pub const MIN_VAT_NUMBER_LEN: usize = 4;

/// Strip spaces, dots and dashes and upper-case the rest.
///
/// The normalized form is the cache key, so `de 123.456.789` and
/// `DE123456789` share one cache row.
pub fn normalize_vat_number(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '.' && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Split a normalized VAT number into its country prefix and national part.
pub fn split_vat_number(vat_number: &str) -> Result<(&str, &str), VatError> {
    if vat_number.len() < MIN_VAT_NUMBER_LEN {
        return Err(VatError::InvalidVatNumber {
            value: vat_number.into(),
            reason: format!("too short, must be at least {MIN_VAT_NUMBER_LEN} characters"),
        });
    }

    if !vat_number.is_char_boundary(2) || !vat_number[..2].chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(VatError::InvalidVatNumber {
            value: vat_number.into(),
            reason: "must start with a 2-letter country prefix".into(),
        });
    }

    let (country, number) = vat_number.split_at(2);
    // VIES also answers for Northern Ireland traders
    if !is_eu(country) && country != "XI" {
        return Err(VatError::InvalidVatNumber {
            value: vat_number.into(),
            reason: format!("'{country}' is not a VIES member state prefix"),
        });
    }
    if !number.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(VatError::InvalidVatNumber {
            value: vat_number.into(),
            reason: "national part must be alphanumeric".into(),
        });
    }

    Ok((country, number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_separators_and_case() {
        assert_eq!(normalize_vat_number(" de 123.456-789 "), "DE123456789");
        assert_eq!(normalize_vat_number("nl123456789b01"), "NL123456789B01");
    }

    #[test]
    fn splits_country_prefix() {
        let (cc, num) = split_vat_number("ESB12345678").unwrap();
        assert_eq!(cc, "ES");
        assert_eq!(num, "B12345678");
    }

    #[test]
    fn too_short_input() {
        assert!(matches!(
            split_vat_number("XY"),
            Err(VatError::InvalidVatNumber { .. })
        ));
        assert!(split_vat_number("DE1").is_err());
        assert!(split_vat_number("DE12").is_ok());
    }

    #[test]
    fn numeric_prefix_rejected() {
        assert!(split_vat_number("12345678").is_err());
    }

    #[test]
    fn non_ascii_prefix_rejected() {
        assert!(split_vat_number("ÄB1234").is_err());
    }

    #[test]
    fn prefix_must_be_vies_member() {
        assert!(split_vat_number("CHE123456789").is_err());
        assert!(split_vat_number("EL123456789").is_ok());
        assert!(split_vat_number("XI123456789").is_ok());
    }
}
