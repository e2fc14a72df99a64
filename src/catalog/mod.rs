//! Pure catalog logic: price resolution, discount evaluation, category
//! tree traversal and coupon validation. Nothing in here touches the
//! database or the system clock; callers pass `now` in so tests stay
//! deterministic.

pub mod coupon;
pub mod pricing;
pub mod tree;
pub mod variants;
