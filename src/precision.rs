// ===============================
// src/precision.rs
// ===============================
//
// Venue number formatting. Prices carry at most 5 significant digits,
// amounts use the pair's amount precision (8 decimal places on this venue).
// Everything crosses the wire as a decimal string, never as a float.

use rust_decimal::{Decimal, RoundingStrategy};

pub const PRICE_SIG_DIGITS: u32 = 5;
pub const AMOUNT_DECIMALS: u32 = 8;

/// Round to `sig` significant digits (half-up). The venue rejects prices
/// with more precision than this.
pub fn round_sig(value: Decimal, sig: u32) -> Decimal {
    if value.is_zero() {
        return Decimal::ZERO;
    }
    let abs = value.abs();
    // decimal exponent e with 10^(e-1) <= abs < 10^e
    let mut e: i32 = 0;
    let mut probe = abs;
    let tenth = Decimal::new(1, 1);
    while probe >= Decimal::ONE {
        probe /= Decimal::TEN;
        e += 1;
    }
    while probe < tenth && !probe.is_zero() {
        probe *= Decimal::TEN;
        e -= 1;
    }
    let dp = sig as i32 - e;
    if dp <= 0 {
        // scale down, round, scale back up
        let factor = Decimal::from(10i64.pow((-dp) as u32));
        ((value / factor)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            * factor)
            .normalize()
    } else {
        value
            .round_dp_with_strategy(dp as u32, RoundingStrategy::MidpointAwayFromZero)
            .normalize()
    }
}

/// Price to venue precision.
pub fn round_price(price: Decimal) -> Decimal {
    round_sig(price, PRICE_SIG_DIGITS)
}

/// Amount to venue precision. Truncates (never round an order up past what
/// the wallet holds).
pub fn round_amount(amount: Decimal) -> Decimal {
    amount.trunc_with_scale(AMOUNT_DECIMALS).normalize()
}

/// Wire formatting: plain decimal string.
pub fn fmt_dec(value: Decimal) -> String {
    value.normalize().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn round_sig_keeps_five_digits() {
        assert_eq!(round_sig(dec!(12345.678), 5), dec!(12346));
        assert_eq!(round_sig(dec!(0.0012345678), 5), dec!(0.0012346));
        assert_eq!(round_sig(dec!(9999.99), 5), dec!(10000));
        assert_eq!(round_sig(dec!(7000.123), 5), dec!(7000.1));
    }

    #[test]
    fn round_sig_handles_large_integers() {
        assert_eq!(round_sig(dec!(1234567), 5), dec!(1234600));
        assert_eq!(round_sig(dec!(-1234567), 5), dec!(-1234600));
    }

    #[test]
    fn zero_and_exact_values_pass_through() {
        assert_eq!(round_sig(Decimal::ZERO, 5), Decimal::ZERO);
        assert_eq!(round_sig(dec!(42), 5), dec!(42));
    }

    #[test]
    fn amount_truncates_to_eight_decimals() {
        assert_eq!(round_amount(dec!(0.123456789)), dec!(0.12345678));
        assert_eq!(round_amount(dec!(-0.123456789)), dec!(-0.12345678));
    }

    #[test]
    fn fmt_is_plain_decimal() {
        assert_eq!(fmt_dec(dec!(100.10)), "100.1");
        assert_eq!(fmt_dec(dec!(-5)), "-5");
    }
}
