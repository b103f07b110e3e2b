//! Discount coupons.

use crate::domain::foundation::{CouponId, GuildId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coupon {
    pub id: CouponId,
    pub guild_id: GuildId,
    pub code: String,
    pub redemption_count: i32,
    pub max_redemptions: Option<i32>,
}

impl Coupon {
    /// Counts one completed purchase that used this coupon.
    ///
    /// Going past `max_redemptions` is tolerated: the purchase already
    /// happened, the limit is enforced when the checkout page applies it.
    pub fn record_redemption(&mut self) {
        self.redemption_count = self.redemption_count.saturating_add(1);
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_redemptions
            .map_or(false, |max| self.redemption_count >= max)
    }
}
