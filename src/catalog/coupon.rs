use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{catalog::pricing, error::AppError, models::Coupon};

/// Why a coupon was refused. Ordering matters: the first failing check
/// in `validate` wins, so an expired coupon on a too-small cart reports
/// EXPIRED, not BELOW_MIN_BUY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponRejection {
    InvalidCoupon,
    Expired,
    AlreadyUsed,
    BelowMinBuy,
    DiscountExceedsTotal,
}

impl CouponRejection {
    pub fn code(&self) -> &'static str {
        match self {
            CouponRejection::InvalidCoupon => "INVALID_COUPON",
            CouponRejection::Expired => "EXPIRED",
            CouponRejection::AlreadyUsed => "ALREADY_USED",
            CouponRejection::BelowMinBuy => "BELOW_MIN_BUY",
            CouponRejection::DiscountExceedsTotal => "DISCOUNT_EXCEEDS_TOTAL",
        }
    }
}

impl From<CouponRejection> for AppError {
    fn from(rejection: CouponRejection) -> Self {
        AppError::State(rejection.code())
    }
}

/// Validate a coupon against a cart total at `now` and compute the
/// discount it grants. `coupon` is `None` when no row matched the code;
/// `already_used` reflects an existing usage row for this customer.
pub fn validate(
    coupon: Option<&Coupon>,
    already_used: bool,
    cart_total: Decimal,
    now: DateTime<Utc>,
) -> Result<Decimal, CouponRejection> {
    let Some(coupon) = coupon else {
        return Err(CouponRejection::InvalidCoupon);
    };
    if now < coupon.discount_start_date || now > coupon.discount_end_date {
        return Err(CouponRejection::Expired);
    }
    if already_used {
        return Err(CouponRejection::AlreadyUsed);
    }
    if cart_total < coupon.min_buy {
        return Err(CouponRejection::BelowMinBuy);
    }

    let discount = pricing::discount_of(cart_total, coupon.discount_type, coupon.discount_amount);
    if cart_total - discount <= Decimal::ZERO {
        return Err(CouponRejection::DiscountExceedsTotal);
    }
    Ok(discount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DiscountType;
    use chrono::Duration;
    use uuid::Uuid;

    fn coupon(now: DateTime<Utc>) -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            code: "SAVE10".to_string(),
            min_buy: Decimal::from(50),
            discount_type: DiscountType::Fixed,
            discount_amount: Decimal::from(10),
            discount_start_date: now - Duration::days(1),
            discount_end_date: now + Duration::days(1),
        }
    }

    #[test]
    fn valid_coupon_returns_discount() {
        let now = Utc::now();
        let c = coupon(now);
        assert_eq!(
            validate(Some(&c), false, Decimal::from(100), now),
            Ok(Decimal::from(10))
        );
    }

    #[test]
    fn percent_coupon_discounts_cart_total() {
        let now = Utc::now();
        let mut c = coupon(now);
        c.discount_type = DiscountType::Percent;
        c.discount_amount = Decimal::from(25);
        assert_eq!(
            validate(Some(&c), false, Decimal::from(200), now),
            Ok(Decimal::from(50))
        );
    }

    #[test]
    fn unknown_code_is_invalid() {
        let now = Utc::now();
        assert_eq!(
            validate(None, false, Decimal::from(100), now),
            Err(CouponRejection::InvalidCoupon)
        );
    }

    #[test]
    fn expired_wins_over_below_min_buy() {
        let now = Utc::now();
        let mut c = coupon(now);
        c.discount_end_date = now - Duration::hours(1);
        // Cart total is also below min_buy; the earlier check reports.
        assert_eq!(
            validate(Some(&c), false, Decimal::from(5), now),
            Err(CouponRejection::Expired)
        );
    }

    #[test]
    fn already_used_wins_over_below_min_buy() {
        let now = Utc::now();
        let c = coupon(now);
        assert_eq!(
            validate(Some(&c), true, Decimal::from(5), now),
            Err(CouponRejection::AlreadyUsed)
        );
    }

    #[test]
    fn below_min_buy() {
        let now = Utc::now();
        let c = coupon(now);
        assert_eq!(
            validate(Some(&c), false, Decimal::from(49), now),
            Err(CouponRejection::BelowMinBuy)
        );
    }

    #[test]
    fn discount_must_leave_a_positive_total() {
        let now = Utc::now();
        let mut c = coupon(now);
        c.min_buy = Decimal::ZERO;
        c.discount_amount = Decimal::from(100);
        assert_eq!(
            validate(Some(&c), false, Decimal::from(100), now),
            Err(CouponRejection::DiscountExceedsTotal)
        );
    }

    #[test]
    fn window_is_inclusive() {
        let now = Utc::now();
        let mut c = coupon(now);
        c.discount_start_date = now;
        c.discount_end_date = now;
        assert!(validate(Some(&c), false, Decimal::from(100), now).is_ok());
    }
}
