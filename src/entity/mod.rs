pub mod attribute_values;
pub mod attributes;
pub mod audit_logs;
pub mod brands;
pub mod cart_items;
pub mod carts;
pub mod categories;
pub mod coupon_usages;
pub mod coupons;
pub mod flash_deal_products;
pub mod flash_deals;
pub mod order_items;
pub mod orders;
pub mod price_records;
pub mod product_attribute_values;
pub mod product_variants;
pub mod products;
pub mod variant_attribute_values;

pub use attribute_values::Entity as AttributeValues;
pub use attributes::Entity as Attributes;
pub use audit_logs::Entity as AuditLogs;
pub use brands::Entity as Brands;
pub use cart_items::Entity as CartItems;
pub use carts::Entity as Carts;
pub use categories::Entity as Categories;
pub use coupon_usages::Entity as CouponUsages;
pub use coupons::Entity as Coupons;
pub use flash_deal_products::Entity as FlashDealProducts;
pub use flash_deals::Entity as FlashDeals;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use price_records::Entity as PriceRecords;
pub use product_attribute_values::Entity as ProductAttributeValues;
pub use product_variants::Entity as ProductVariants;
pub use products::Entity as Products;
pub use variant_attribute_values::Entity as VariantAttributeValues;
