pub mod attributes;
pub mod brands;
pub mod cart;
pub mod categories;
pub mod coupons;
pub mod flash_deals;
pub mod orders;
pub mod products;
