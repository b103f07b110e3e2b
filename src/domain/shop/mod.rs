//! Guild shop context: items, subscriptions, codes, coupons and orders.

mod code;
mod coupon;
mod item;
mod order;
mod subscription;

pub use code::{generate_code, PrefilledCode, ShopCode};
pub use coupon::Coupon;
pub use item::{BillingType, DeliveryType, ShopItem};
pub use order::{ClaimOutcome, ShopOrder};
pub use subscription::{ShopSubscription, SubscriptionKey, SubscriptionStatus};
