pub mod attribute_service;
pub mod brand_service;
pub mod cart_service;
pub mod category_service;
pub mod coupon_service;
pub mod flash_deal_service;
pub mod order_service;
pub mod product_service;
