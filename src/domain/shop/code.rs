//! Redemption codes: minted per purchase, or drawn from a pre-provisioned pool.

use chrono::{DateTime, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::domain::foundation::{DiscordUserId, GuildId, ShopItemId};

/// No 0/O or 1/I, so codes survive being read aloud or retyped.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_GROUPS: usize = 4;
const GROUP_LEN: usize = 4;

/// Generates a `XXXX-XXXX-XXXX-XXXX` code from a cryptographic RNG.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_GROUPS)
        .map(|_| {
            (0..GROUP_LEN)
                .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// A code minted for one purchase of a `code` item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopCode {
    pub code: String,
    pub guild_id: GuildId,
    pub shop_item_id: ShopItemId,
    pub discord_user_id: DiscordUserId,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
}

impl ShopCode {
    pub fn mint(
        guild_id: GuildId,
        shop_item_id: ShopItemId,
        discord_user_id: DiscordUserId,
        transaction_id: impl Into<String>,
    ) -> Self {
        Self {
            code: generate_code(),
            guild_id,
            shop_item_id,
            discord_user_id,
            transaction_id: transaction_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// A pool entry for a `prefilled` item. Removed from the pool when drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefilledCode {
    pub id: Uuid,
    pub guild_id: GuildId,
    pub shop_item_id: ShopItemId,
    pub code: String,
}
