use std::collections::BTreeMap;

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{PriceRecord, ProductPricing, ProductType, Variant},
};

/// Attribute selection sent with a cart line or a price lookup:
/// attribute id -> chosen value id.
pub type Selection = BTreeMap<Uuid, Uuid>;

/// Canonical string form of a selection, used as part of a cart line's
/// identity key. Stable ordering comes from the BTreeMap; an empty or
/// absent selection normalizes to the empty string.
pub fn normalize_selection(selection: Option<&Selection>) -> String {
    match selection {
        None => String::new(),
        Some(map) => map
            .iter()
            .map(|(attr, value)| format!("{attr}:{value}"))
            .collect::<Vec<_>>()
            .join("|"),
    }
}

/// Parse a normalized selection string back into a selection. The empty
/// string round-trips to an empty selection.
pub fn parse_selection(s: &str) -> AppResult<Selection> {
    let mut selection = Selection::new();
    if s.is_empty() {
        return Ok(selection);
    }
    for pair in s.split('|') {
        let (attr, value) = pair
            .split_once(':')
            .ok_or_else(|| AppError::BadRequest(format!("malformed attribute pair: {pair}")))?;
        let attr = Uuid::parse_str(attr)
            .map_err(|_| AppError::BadRequest(format!("invalid attribute id: {attr}")))?;
        let value = Uuid::parse_str(value)
            .map_err(|_| AppError::BadRequest(format!("invalid attribute value id: {value}")))?;
        selection.insert(attr, value);
    }
    Ok(selection)
}

/// Pick the price record that applies to `product` under `selection`.
///
/// SINGLE products have exactly one record and ignore the selection.
/// VARIANT products resolve to the exact variant whose attribute-value
/// set matches, falling back to the default variant when nothing
/// matches or nothing was selected. The fallback is deliberate legacy
/// behavior; it is logged so it can be watched rather than guessed at.
pub fn resolve_price<'a>(
    product: &'a ProductPricing,
    selection: Option<&Selection>,
) -> AppResult<&'a PriceRecord> {
    match product.product_type {
        ProductType::Single => product.base.as_ref().ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "product {} has no price record",
                product.product_id
            ))
        }),
        ProductType::Variant => {
            let variant = match selection.filter(|s| !s.is_empty()) {
                None => default_variant(product)?,
                Some(selected) => {
                    match product
                        .variants
                        .iter()
                        .find(|v| &v.attribute_values == selected)
                    {
                        Some(v) => v,
                        None => {
                            tracing::warn!(
                                product_id = %product.product_id,
                                selection = %normalize_selection(Some(selected)),
                                "no variant matches selection, falling back to default"
                            );
                            default_variant(product)?
                        }
                    }
                }
            };
            Ok(&variant.price)
        }
    }
}

fn default_variant(product: &ProductPricing) -> AppResult<&Variant> {
    if let Some(v) = product.variants.iter().find(|v| v.is_default) {
        return Ok(v);
    }
    // Exactly one variant should be flagged default; tolerate the defect
    // by taking the first in creation order.
    tracing::warn!(
        product_id = %product.product_id,
        "variant product has no default variant flagged"
    );
    product.variants.first().ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "variant product {} has no variants",
            product.product_id
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn price(amount: i64) -> PriceRecord {
        PriceRecord {
            price: Decimal::from(amount),
            special_price: None,
            special_price_type: None,
            quantity: 5,
            in_stock: true,
            discount_start_date: None,
            discount_end_date: None,
            discount_type: None,
            discount_amount: None,
        }
    }

    fn variant(
        sku: &str,
        is_default: bool,
        attrs: &[(Uuid, Uuid)],
        amount: i64,
    ) -> Variant {
        Variant {
            id: Uuid::new_v4(),
            sku: sku.to_string(),
            label: sku.to_string(),
            is_default,
            attribute_values: attrs.iter().copied().collect(),
            price: price(amount),
            created_at: Utc::now(),
        }
    }

    fn variant_product(variants: Vec<Variant>) -> ProductPricing {
        ProductPricing {
            product_id: Uuid::new_v4(),
            product_type: ProductType::Variant,
            base: None,
            variants,
        }
    }

    #[test]
    fn single_product_ignores_selection() {
        let product = ProductPricing {
            product_id: Uuid::new_v4(),
            product_type: ProductType::Single,
            base: Some(price(42)),
            variants: vec![],
        };
        let mut selection = Selection::new();
        selection.insert(Uuid::new_v4(), Uuid::new_v4());
        let resolved = resolve_price(&product, Some(&selection)).unwrap();
        assert_eq!(resolved.price, Decimal::from(42));
    }

    #[test]
    fn empty_selection_resolves_default_variant_every_time() {
        let color = Uuid::new_v4();
        let red = Uuid::new_v4();
        let blue = Uuid::new_v4();
        let product = variant_product(vec![
            variant("P-RED", false, &[(color, red)], 10),
            variant("P-BLUE", true, &[(color, blue)], 20),
        ]);
        for _ in 0..3 {
            let resolved = resolve_price(&product, None).unwrap();
            assert_eq!(resolved.price, Decimal::from(20));
        }
    }

    #[test]
    fn exact_attribute_set_match() {
        let color = Uuid::new_v4();
        let size = Uuid::new_v4();
        let red = Uuid::new_v4();
        let xl = Uuid::new_v4();
        let blue = Uuid::new_v4();
        let product = variant_product(vec![
            variant("P-RED-XL", true, &[(color, red), (size, xl)], 10),
            variant("P-BLUE-XL", false, &[(color, blue), (size, xl)], 30),
        ]);

        let selection: Selection = [(color, blue), (size, xl)].into_iter().collect();
        let resolved = resolve_price(&product, Some(&selection)).unwrap();
        assert_eq!(resolved.price, Decimal::from(30));
    }

    #[test]
    fn unmatched_selection_falls_back_to_default() {
        let color = Uuid::new_v4();
        let red = Uuid::new_v4();
        let product = variant_product(vec![variant("P-RED", true, &[(color, red)], 10)]);

        let selection: Selection = [(color, Uuid::new_v4())].into_iter().collect();
        let resolved = resolve_price(&product, Some(&selection)).unwrap();
        assert_eq!(resolved.price, Decimal::from(10));
    }

    #[test]
    fn missing_default_falls_back_to_first_variant() {
        let color = Uuid::new_v4();
        let product = variant_product(vec![
            variant("P-A", false, &[(color, Uuid::new_v4())], 11),
            variant("P-B", false, &[(color, Uuid::new_v4())], 22),
        ]);
        let resolved = resolve_price(&product, None).unwrap();
        assert_eq!(resolved.price, Decimal::from(11));
    }

    #[test]
    fn variant_product_without_variants_is_an_error() {
        let product = variant_product(vec![]);
        assert!(resolve_price(&product, None).is_err());
    }

    #[test]
    fn normalization_is_order_insensitive_and_round_trips() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let v1 = Uuid::new_v4();
        let v2 = Uuid::new_v4();

        let first: Selection = [(a, v1), (b, v2)].into_iter().collect();
        let second: Selection = [(b, v2), (a, v1)].into_iter().collect();
        assert_eq!(
            normalize_selection(Some(&first)),
            normalize_selection(Some(&second))
        );

        let parsed = parse_selection(&normalize_selection(Some(&first))).unwrap();
        assert_eq!(parsed, first);
        assert_eq!(normalize_selection(None), "");
        assert_eq!(parse_selection("").unwrap(), Selection::new());
    }

    #[test]
    fn distinct_selections_normalize_differently() {
        let color = Uuid::new_v4();
        let red = Uuid::new_v4();
        let blue = Uuid::new_v4();
        let red_sel: Selection = [(color, red)].into_iter().collect();
        let blue_sel: Selection = [(color, blue)].into_iter().collect();
        assert_ne!(
            normalize_selection(Some(&red_sel)),
            normalize_selection(Some(&blue_sel))
        );
    }
}
