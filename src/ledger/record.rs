//! Ledger seed records as read from CSV.

use crate::backend::{CardId, MemberId};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

/// Raw ledger row as read from CSV.
///
/// Columns are `type,key,name,id,amount,valid`; which ones are used depends
/// on the record type.
#[derive(Debug, Deserialize)]
pub struct LedgerRecord {
    /// Record type: member, wallet, card, coffee
    #[serde(rename = "type")]
    pub record_type: String,

    /// Username (member, wallet) or card id (card, coffee)
    pub key: String,

    /// Display name (member) or owning username (card)
    pub name: Option<String>,

    /// Member id (member only)
    pub id: Option<u32>,

    /// Balance (wallet: decimal, coffee: whole vouchers)
    pub amount: Option<String>,

    /// Wallet validity, defaults to true
    pub valid: Option<String>,
}

impl LedgerRecord {
    /// Parses the raw CSV record into a typed entry.
    ///
    /// Returns `None` if the record is invalid (unknown type, missing id,
    /// negative or malformed balance, etc.).
    pub fn parse(&self) -> Option<LedgerEntry> {
        let record_type = self.record_type.trim().to_lowercase();
        let key = self.key.trim();
        if key.is_empty() {
            return None;
        }

        match record_type.as_str() {
            "member" => Some(LedgerEntry::Member {
                username: key.to_lowercase(),
                display_name: non_empty(&self.name),
                id: MemberId(self.id?),
            }),
            "wallet" => {
                let balance = Decimal::from_str(self.amount.as_deref()?.trim()).ok()?;
                if balance.is_sign_negative() {
                    return None;
                }
                Some(LedgerEntry::Wallet {
                    username: key.to_lowercase(),
                    balance,
                    valid: self.parse_valid()?,
                })
            }
            "card" => Some(LedgerEntry::Card {
                card: CardId::parse(key)?,
                owner: non_empty(&self.name).map(|name| name.to_lowercase()),
            }),
            "coffee" => Some(LedgerEntry::Coffee {
                card: CardId::parse(key)?,
                balance: self.amount.as_deref()?.trim().parse().ok()?,
            }),
            _ => None,
        }
    }

    fn parse_valid(&self) -> Option<bool> {
        let raw = match non_empty(&self.valid) {
            Some(raw) => raw.to_lowercase(),
            None => return Some(true),
        };
        match raw.as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

fn non_empty(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A parsed and validated ledger row.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEntry {
    /// A member account.
    Member {
        username: String,
        display_name: Option<String>,
        id: MemberId,
    },

    /// One of a member's voucher wallets (one per semester).
    Wallet {
        username: String,
        balance: Decimal,
        valid: bool,
    },

    /// A registered card, optionally owned by a member.
    Card { card: CardId, owner: Option<String> },

    /// The coffee voucher balance attached to a card.
    Coffee { card: CardId, balance: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(record_type: &str, key: &str) -> LedgerRecord {
        LedgerRecord {
            record_type: record_type.to_string(),
            key: key.to_string(),
            name: None,
            id: None,
            amount: None,
            valid: None,
        }
    }

    #[test]
    fn test_parse_member() {
        let mut raw = record("member", "Alice");
        raw.name = Some("Alice Liddell".to_string());
        raw.id = Some(17);

        assert_eq!(
            raw.parse(),
            Some(LedgerEntry::Member {
                username: "alice".to_string(),
                display_name: Some("Alice Liddell".to_string()),
                id: MemberId(17),
            })
        );
    }

    #[test]
    fn test_parse_wallet_defaults_to_valid() {
        let mut raw = record("wallet", "alice");
        raw.amount = Some("4.5".to_string());

        match raw.parse() {
            Some(LedgerEntry::Wallet { balance, valid, .. }) => {
                assert_eq!(balance.to_string(), "4.5");
                assert!(valid);
            }
            other => panic!("Expected Wallet, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_expired_wallet() {
        let mut raw = record("wallet", "alice");
        raw.amount = Some("3".to_string());
        raw.valid = Some(" FALSE ".to_string());

        assert!(matches!(
            raw.parse(),
            Some(LedgerEntry::Wallet { valid: false, .. })
        ));
    }

    #[test]
    fn test_parse_card_without_owner_is_coffee_only() {
        let mut raw = record("card", "04a1");
        raw.name = Some("   ".to_string());

        assert_eq!(
            raw.parse(),
            Some(LedgerEntry::Card {
                card: CardId::parse("04A1").unwrap(),
                owner: None,
            })
        );
    }

    #[test]
    fn test_parse_handles_whitespace() {
        let mut raw = record("  Coffee ", " 04a1 ");
        raw.amount = Some(" 7 ".to_string());

        assert_eq!(
            raw.parse(),
            Some(LedgerEntry::Coffee {
                card: CardId::parse("04A1").unwrap(),
                balance: 7,
            })
        );
    }

    #[test]
    fn test_parse_rejects_invalid_records() {
        assert!(record("refund", "alice").parse().is_none());
        assert!(record("member", "alice").parse().is_none());
        assert!(record("coffee", "04a1").parse().is_none());
        assert!(record("card", "  ").parse().is_none());

        let mut negative = record("wallet", "alice");
        negative.amount = Some("-1".to_string());
        assert!(negative.parse().is_none());

        let mut fractional = record("coffee", "04a1");
        fractional.amount = Some("1.5".to_string());
        assert!(fractional.parse().is_none());

        let mut bad_flag = record("wallet", "alice");
        bad_flag.amount = Some("1".to_string());
        bad_flag.valid = Some("maybe".to_string());
        assert!(bad_flag.parse().is_none());
    }
}
