use rust_decimal::{Decimal, RoundingStrategy};

/// Unit amounts of one line, each rounded to cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitAmounts {
    pub net: Decimal,
    pub vat: Decimal,
    pub gross: Decimal,
}

/// Round to 2 decimal places, halves away from zero (commercial rounding).
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Split `price` at `rate` percent.
///
/// With `includes_vat` the price is gross and the net is derived from it;
/// otherwise the price is net. VAT is always `gross - net` of the rounded
/// amounts, so the three values add up exactly.
pub fn split_price(price: Decimal, rate: Decimal, includes_vat: bool) -> UnitAmounts {
    let factor = Decimal::ONE + rate / Decimal::ONE_HUNDRED;
    let (net, gross) = if includes_vat {
        (round_money(price / factor), round_money(price))
    } else {
        (round_money(price), round_money(price * factor))
    };
    UnitAmounts {
        net,
        vat: gross - net,
        gross,
    }
}

/// Net part of a gross price; used when reverse charge strips VAT.
pub fn net_of(price: Decimal, rate: Decimal) -> Decimal {
    split_price(price, rate, true).net
}

/// Quantities of zero or less count as one.
pub fn effective_quantity(quantity: i32) -> i32 {
    quantity.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_money(dec!(2.345)), dec!(2.35));
        assert_eq!(round_money(dec!(2.344)), dec!(2.34));
        assert_eq!(round_money(dec!(-2.345)), dec!(-2.35));
    }

    #[test]
    fn gross_price_is_split() {
        let a = split_price(dec!(121.00), dec!(21), true);
        assert_eq!(a.net, dec!(100.00));
        assert_eq!(a.vat, dec!(21.00));
        assert_eq!(a.gross, dec!(121.00));
    }

    #[test]
    fn net_price_is_grossed_up() {
        let a = split_price(dec!(9.99), dec!(19), false);
        assert_eq!(a.net, dec!(9.99));
        assert_eq!(a.gross, dec!(11.89));
        assert_eq!(a.vat, dec!(1.90));
    }

    #[test]
    fn fractional_rates() {
        let a = split_price(dec!(10.00), dec!(5.5), true);
        assert_eq!(a.net, dec!(9.48));
        assert_eq!(a.vat, dec!(0.52));
    }

    #[test]
    fn zero_rate_keeps_price() {
        let a = split_price(dec!(42.10), Decimal::ZERO, false);
        assert_eq!(a.net, a.gross);
        assert_eq!(a.vat, Decimal::ZERO);
    }

    #[test]
    fn non_positive_quantity_is_one() {
        assert_eq!(effective_quantity(0), 1);
        assert_eq!(effective_quantity(-3), 1);
        assert_eq!(effective_quantity(4), 4);
    }
}
