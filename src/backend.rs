//! Contract of the voucher backend.
//!
//! All balances live behind this trait. The kiosk never caches a balance
//! beyond a single session.

use crate::error::Result;
use rust_decimal::Decimal;
use std::fmt;

/// Identifier read from an NFC card, normalised to upper-case hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CardId(String);

impl CardId {
    /// Trims and upper-cases `raw`. Returns `None` for an empty id.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(CardId(trimmed.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backend id of a member account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberId(pub u32);

/// Who a registered card belongs to.
///
/// A card without a username is a coffee-only card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardOwner {
    pub username: Option<String>,
    pub display_name: Option<String>,
}

/// The operations the kiosk needs from the voucher backend.
///
/// Mutations return `Ok(false)` when the backend refuses them (insufficient
/// balance, unknown member); `Err` means the backend could not be reached or
/// answered garbage.
pub trait Backend {
    fn lookup_card(&mut self, card: &CardId) -> Result<Option<CardOwner>>;

    /// Summed balance of the member's valid wallets.
    fn member_voucher_balance(&mut self, username: &str) -> Result<Decimal>;

    fn card_coffee_balance(&mut self, card: &CardId) -> Result<u32>;

    fn find_member(&mut self, username_query: &str) -> Result<Option<MemberId>>;

    fn register_card(&mut self, card: &CardId, member: Option<MemberId>, is_member: bool)
        -> Result<bool>;

    fn debit_member_vouchers(&mut self, username: &str, amount: u32) -> Result<bool>;

    fn debit_card_coffee_vouchers(&mut self, card: &CardId, amount: u32) -> Result<bool>;

    fn credit_card_coffee_vouchers(&mut self, card: &CardId, amount: u32) -> Result<bool>;
}
