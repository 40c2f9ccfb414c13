use rand::distributions::{Alphanumeric, DistString};

fn random_upper(len: usize) -> String {
    Alphanumeric
        .sample_string(&mut rand::thread_rng(), len)
        .to_uppercase()
}

/// Coupon code handed out by the roulette, e.g. `HM-7QK2M9ZD`.
pub fn coupon_code() -> String {
    format!("HM-{}", random_upper(8))
}

/// Code printed in a loyalty customer's QR.
pub fn loyalty_qr_code() -> String {
    format!("LC-{}", random_upper(10))
}

/// Affiliate referral code.
pub fn referral_code() -> String {
    random_upper(8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_have_expected_shape() {
        let coupon = coupon_code();
        assert!(coupon.starts_with("HM-"));
        assert_eq!(coupon.len(), 11);

        let qr = loyalty_qr_code();
        assert!(qr.starts_with("LC-"));
        assert_eq!(qr.len(), 13);

        let referral = referral_code();
        assert_eq!(referral.len(), 8);
        assert!(referral
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }
}
