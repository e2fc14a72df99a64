use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    error::{AppError, AppResult},
    models::{DiscountType, PriceRecord},
};

/// Amount taken off `base` by a fixed or percent discount.
pub fn discount_of(base: Decimal, discount_type: DiscountType, amount: Decimal) -> Decimal {
    match discount_type {
        DiscountType::Fixed => amount,
        DiscountType::Percent => base * amount / Decimal::from(100),
    }
}

/// The single effective selling price of a price record at `now`.
///
/// Precedence: an active campaign discount wins over the special price,
/// which wins over the base price. The tiers are mutually exclusive,
/// never additive. The result is clamped to zero; a negative outcome is
/// a data defect worth surfacing, not an error worth failing a read for.
pub fn effective_price(record: &PriceRecord, now: DateTime<Utc>) -> Decimal {
    let raw = if let Some((discount_type, amount)) = active_campaign(record, now) {
        record.price - discount_of(record.price, discount_type, amount)
    } else if let (Some(special), Some(special_type)) =
        (record.special_price, record.special_price_type)
    {
        if special.is_zero() {
            record.price
        } else {
            record.price - discount_of(record.price, special_type, special)
        }
    } else {
        record.price
    };

    if raw < Decimal::ZERO {
        tracing::warn!(
            price = %record.price,
            effective = %raw,
            "discount drives price below zero, clamping"
        );
        return Decimal::ZERO;
    }
    raw
}

/// Campaign discount in force at `now`, if any. The window is inclusive
/// on both ends and both the amount and the type must be present.
fn active_campaign(record: &PriceRecord, now: DateTime<Utc>) -> Option<(DiscountType, Decimal)> {
    let start = record.discount_start_date?;
    let end = record.discount_end_date?;
    let amount = record.discount_amount?;
    let discount_type = record.discount_type?;
    if now >= start && now <= end {
        Some((discount_type, amount))
    } else {
        None
    }
}

/// Write-time validation of a discount amount. Percent discounts must be
/// whole numbers in 0..=100; fixed discounts must not be negative.
pub fn validate_discount(discount_type: DiscountType, amount: Decimal) -> AppResult<()> {
    match discount_type {
        DiscountType::Percent => {
            if amount < Decimal::ZERO || amount > Decimal::from(100) || !amount.fract().is_zero() {
                return Err(AppError::BadRequest(
                    "percent discount must be an integer between 0 and 100".to_string(),
                ));
            }
        }
        DiscountType::Fixed => {
            if amount < Decimal::ZERO {
                return Err(AppError::BadRequest(
                    "fixed discount must not be negative".to_string(),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(price: i64) -> PriceRecord {
        PriceRecord {
            price: Decimal::from(price),
            special_price: None,
            special_price_type: None,
            quantity: 10,
            in_stock: true,
            discount_start_date: None,
            discount_end_date: None,
            discount_type: None,
            discount_amount: None,
        }
    }

    fn with_campaign(
        mut rec: PriceRecord,
        now: DateTime<Utc>,
        discount_type: DiscountType,
        amount: i64,
    ) -> PriceRecord {
        rec.discount_start_date = Some(now - Duration::hours(1));
        rec.discount_end_date = Some(now + Duration::hours(1));
        rec.discount_type = Some(discount_type);
        rec.discount_amount = Some(Decimal::from(amount));
        rec
    }

    #[test]
    fn base_price_when_nothing_applies() {
        let now = Utc::now();
        assert_eq!(effective_price(&record(100), now), Decimal::from(100));
    }

    #[test]
    fn campaign_discount_beats_special_price() {
        let now = Utc::now();
        let mut rec = with_campaign(record(100), now, DiscountType::Fixed, 20);
        rec.special_price = Some(Decimal::from(10));
        rec.special_price_type = Some(DiscountType::Fixed);
        assert_eq!(effective_price(&rec, now), Decimal::from(80));
    }

    #[test]
    fn special_price_applies_outside_campaign_window() {
        let now = Utc::now();
        let mut rec = with_campaign(record(100), now - Duration::days(7), DiscountType::Fixed, 20);
        rec.special_price = Some(Decimal::from(10));
        rec.special_price_type = Some(DiscountType::Fixed);
        assert_eq!(effective_price(&rec, now), Decimal::from(90));
    }

    #[test]
    fn percent_special_price() {
        let now = Utc::now();
        let mut rec = record(200);
        rec.special_price = Some(Decimal::from(25));
        rec.special_price_type = Some(DiscountType::Percent);
        assert_eq!(effective_price(&rec, now), Decimal::from(150));
    }

    #[test]
    fn percent_campaign_discount() {
        let now = Utc::now();
        let rec = with_campaign(record(200), now, DiscountType::Percent, 50);
        assert_eq!(effective_price(&rec, now), Decimal::from(100));
    }

    #[test]
    fn window_is_inclusive_on_both_ends() {
        let now = Utc::now();
        let mut rec = with_campaign(record(100), now, DiscountType::Fixed, 20);
        rec.discount_start_date = Some(now);
        rec.discount_end_date = Some(now);
        assert_eq!(effective_price(&rec, now), Decimal::from(80));
    }

    #[test]
    fn zero_special_price_means_no_discount() {
        let now = Utc::now();
        let mut rec = record(100);
        rec.special_price = Some(Decimal::ZERO);
        rec.special_price_type = Some(DiscountType::Fixed);
        assert_eq!(effective_price(&rec, now), Decimal::from(100));
    }

    #[test]
    fn negative_outcome_clamps_to_zero() {
        let now = Utc::now();
        let rec = with_campaign(record(10), now, DiscountType::Fixed, 50);
        assert_eq!(effective_price(&rec, now), Decimal::ZERO);
    }

    #[test]
    fn campaign_without_type_is_ignored() {
        let now = Utc::now();
        let mut rec = with_campaign(record(100), now, DiscountType::Fixed, 20);
        rec.discount_type = None;
        assert_eq!(effective_price(&rec, now), Decimal::from(100));
    }

    #[test]
    fn percent_validation_bounds() {
        assert!(validate_discount(DiscountType::Percent, Decimal::from(0)).is_ok());
        assert!(validate_discount(DiscountType::Percent, Decimal::from(100)).is_ok());
        assert!(validate_discount(DiscountType::Percent, Decimal::from(101)).is_err());
        assert!(validate_discount(DiscountType::Percent, Decimal::new(255, 1)).is_err());
        assert!(validate_discount(DiscountType::Fixed, Decimal::from(-1)).is_err());
        assert!(validate_discount(DiscountType::Fixed, Decimal::from(1000)).is_ok());
    }
}
