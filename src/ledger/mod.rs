//! In-memory voucher ledger implementing [`Backend`].
//!
//! The ledger is seeded once from a CSV file and then lives in memory for the
//! lifetime of the process; nothing is written back. Seed rows are streamed
//! one at a time; invalid rows are logged at warn level and skipped.
//!
//! ```text
//! type,key,name,id,amount,valid
//! member,alice,Alice Liddell,17,,
//! wallet,alice,,,5,true
//! card,04A1B2C3,alice,,,
//! coffee,04A1B2C3,,,2,
//! ```
//!
//! Member rows must come before the wallet and card rows that reference them.

pub mod account;
pub mod record;

pub use account::{CardAccount, MemberAccount, Wallet};
pub use record::{LedgerEntry, LedgerRecord};

use crate::backend::{Backend, CardId, CardOwner, MemberId};
use crate::error::Result;
use csv::{ReaderBuilder, Trim};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Member accounts and card accounts keyed by username and card id.
#[derive(Debug, Default)]
pub struct Ledger {
    /// Members indexed by lower-case username.
    members: HashMap<String, MemberAccount>,

    /// Cards indexed by card id. Includes cards that only hold coffee
    /// vouchers without being registered.
    cards: HashMap<CardId, CardAccount>,
}

impl Ledger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a ledger from the CSV file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut ledger = Ledger::new();
        ledger.process_csv(BufReader::new(file))?;
        info!(
            "Loaded ledger from {}: {} members, {} cards",
            path.display(),
            ledger.members.len(),
            ledger.cards.len()
        );
        Ok(ledger)
    }

    /// Applies seed records from a CSV reader.
    pub fn process_csv<R: Read>(&mut self, reader: R) -> Result<()> {
        let mut csv_reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        for (row_idx, result) in csv_reader.deserialize::<LedgerRecord>().enumerate() {
            let row_num = row_idx + 2; // 1-indexed, accounting for header row

            match result {
                Ok(record) => match record.parse() {
                    Some(entry) => self.apply(entry, row_num),
                    None => warn!("Row {}: Failed to parse ledger record", row_num),
                },
                Err(e) => warn!("Row {}: CSV parse error: {}", row_num, e),
            }
        }

        Ok(())
    }

    fn apply(&mut self, entry: LedgerEntry, row: usize) {
        match entry {
            LedgerEntry::Member {
                username,
                display_name,
                id,
            } => {
                if self.members.contains_key(&username) {
                    warn!("Row {}: Duplicate member {}, ignoring", row, username);
                    return;
                }
                let account = MemberAccount::new(id, &username, display_name);
                self.members.insert(username, account);
            }
            LedgerEntry::Wallet {
                username,
                balance,
                valid,
            } => match self.members.get_mut(&username) {
                Some(member) => member.add_wallet(balance, valid),
                None => warn!("Row {}: Wallet for unknown member {}, ignoring", row, username),
            },
            LedgerEntry::Card { card, owner } => {
                if let Some(username) = &owner {
                    if !self.members.contains_key(username) {
                        warn!(
                            "Row {}: Card {} owned by unknown member {}, ignoring",
                            row, card, username
                        );
                        return;
                    }
                }
                let account = self.cards.entry(card).or_default();
                account.owner = owner;
                account.registered = true;
            }
            LedgerEntry::Coffee { card, balance } => {
                self.cards.entry(card).or_default().set_coffee(balance);
            }
        }
    }

    pub fn member(&self, username: &str) -> Option<&MemberAccount> {
        self.members.get(&username.to_lowercase())
    }

    pub fn card(&self, card: &CardId) -> Option<&CardAccount> {
        self.cards.get(card)
    }

    fn member_by_id(&self, id: MemberId) -> Option<&MemberAccount> {
        self.members.values().find(|m| m.id == id)
    }
}

impl Backend for Ledger {
    fn lookup_card(&mut self, card: &CardId) -> Result<Option<CardOwner>> {
        let account = match self.cards.get(card) {
            Some(account) if account.registered => account,
            _ => return Ok(None),
        };

        let display_name = account
            .owner
            .as_deref()
            .and_then(|username| self.members.get(username))
            .and_then(|member| member.display_name.clone());

        Ok(Some(CardOwner {
            username: account.owner.clone(),
            display_name,
        }))
    }

    fn member_voucher_balance(&mut self, username: &str) -> Result<Decimal> {
        Ok(self
            .member(username)
            .map(|m| m.balance())
            .unwrap_or(Decimal::ZERO))
    }

    fn card_coffee_balance(&mut self, card: &CardId) -> Result<u32> {
        Ok(self.cards.get(card).map(|c| c.coffee()).unwrap_or(0))
    }

    fn find_member(&mut self, username_query: &str) -> Result<Option<MemberId>> {
        Ok(self.member(username_query.trim()).map(|m| m.id))
    }

    fn register_card(
        &mut self,
        card: &CardId,
        member: Option<MemberId>,
        is_member: bool,
    ) -> Result<bool> {
        let owner = if is_member {
            let username = member
                .and_then(|id| self.member_by_id(id))
                .map(|m| m.username.clone());
            match username {
                Some(username) => Some(username),
                None => {
                    debug!("Refusing to register {} to unknown member {:?}", card, member);
                    return Ok(false);
                }
            }
        } else {
            None
        };

        let account = self.cards.entry(card.clone()).or_default();
        if account.registered {
            info!("Re-registering card {} (was owned by {:?})", card, account.owner);
        }
        account.owner = owner;
        account.registered = true;
        Ok(true)
    }

    fn debit_member_vouchers(&mut self, username: &str, amount: u32) -> Result<bool> {
        let member = match self.members.get_mut(&username.to_lowercase()) {
            Some(member) => member,
            None => {
                debug!("Debit for unknown member {}", username);
                return Ok(false);
            }
        };

        let ok = member.withdraw(amount);
        if ok {
            debug!("Withdrew {} vouchers from {}", amount, username);
        } else {
            debug!(
                "Withdrawal of {} vouchers from {} failed (insufficient balance)",
                amount, username
            );
        }
        Ok(ok)
    }

    fn debit_card_coffee_vouchers(&mut self, card: &CardId, amount: u32) -> Result<bool> {
        Ok(self
            .cards
            .get_mut(card)
            .map(|account| account.withdraw(amount))
            .unwrap_or(false))
    }

    fn credit_card_coffee_vouchers(&mut self, card: &CardId, amount: u32) -> Result<bool> {
        Ok(self.cards.entry(card.clone()).or_default().deposit(amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::str::FromStr;

    const SEED: &str = r#"type,key,name,id,amount,valid
member,alice,Alice Liddell,17,,
wallet,alice,,,3,true
wallet,alice,,,2,true
wallet,alice,,,9,false
member,bob,,18,,
card,04aa,alice,,,
coffee,04aa,,,2,
card,04bb,,,,
coffee,04cc,,,4,"#;

    fn ledger(csv: &str) -> Ledger {
        let mut ledger = Ledger::new();
        ledger.process_csv(Cursor::new(csv)).unwrap();
        ledger
    }

    fn card(raw: &str) -> CardId {
        CardId::parse(raw).unwrap()
    }

    #[test]
    fn test_lookup_member_card() {
        let mut ledger = ledger(SEED);
        let owner = ledger.lookup_card(&card("04AA")).unwrap().unwrap();
        assert_eq!(owner.username.as_deref(), Some("alice"));
        assert_eq!(owner.display_name.as_deref(), Some("Alice Liddell"));
    }

    #[test]
    fn test_lookup_coffee_only_card() {
        let mut ledger = ledger(SEED);
        let owner = ledger.lookup_card(&card("04bb")).unwrap().unwrap();
        assert_eq!(owner.username, None);
        assert_eq!(owner.display_name, None);
    }

    #[test]
    fn test_unregistered_card_with_balance_is_not_found() {
        let mut ledger = ledger(SEED);
        assert!(ledger.lookup_card(&card("04cc")).unwrap().is_none());
        assert_eq!(ledger.card_coffee_balance(&card("04cc")).unwrap(), 4);
        assert!(ledger.lookup_card(&card("ffff")).unwrap().is_none());
    }

    #[test]
    fn test_balances() {
        let mut ledger = ledger(SEED);
        assert_eq!(
            ledger.member_voucher_balance("alice").unwrap(),
            Decimal::from_str("5").unwrap()
        );
        assert!(ledger.member_voucher_balance("nobody").unwrap().is_zero());
        assert_eq!(ledger.card_coffee_balance(&card("04aa")).unwrap(), 2);
        assert_eq!(ledger.card_coffee_balance(&card("04bb")).unwrap(), 0);
    }

    #[test]
    fn test_find_member_is_case_insensitive() {
        let mut ledger = ledger(SEED);
        assert_eq!(ledger.find_member(" Bob ").unwrap(), Some(MemberId(18)));
        assert_eq!(ledger.find_member("carol").unwrap(), None);
    }

    #[test]
    fn test_register_card_to_member() {
        let mut ledger = ledger(SEED);
        assert!(ledger
            .register_card(&card("04dd"), Some(MemberId(18)), true)
            .unwrap());

        let owner = ledger.lookup_card(&card("04dd")).unwrap().unwrap();
        assert_eq!(owner.username.as_deref(), Some("bob"));
    }

    #[test]
    fn test_register_card_to_unknown_member_fails() {
        let mut ledger = ledger(SEED);
        assert!(!ledger
            .register_card(&card("04dd"), Some(MemberId(99)), true)
            .unwrap());
        assert!(!ledger.register_card(&card("04dd"), None, true).unwrap());
        assert!(ledger.lookup_card(&card("04dd")).unwrap().is_none());
    }

    #[test]
    fn test_register_coffee_only_card() {
        let mut ledger = ledger(SEED);
        assert!(ledger.register_card(&card("04cc"), None, false).unwrap());

        let owner = ledger.lookup_card(&card("04cc")).unwrap().unwrap();
        assert_eq!(owner.username, None);
        assert_eq!(ledger.card_coffee_balance(&card("04cc")).unwrap(), 4);
    }

    #[test]
    fn test_debit_member_vouchers() {
        let mut ledger = ledger(SEED);
        assert!(ledger.debit_member_vouchers("alice", 3).unwrap());
        assert_eq!(ledger.member("alice").unwrap().balance(), Decimal::from(2));

        assert!(!ledger.debit_member_vouchers("alice", 3).unwrap());
        assert_eq!(ledger.member("alice").unwrap().balance(), Decimal::from(2));

        assert!(!ledger.debit_member_vouchers("nobody", 1).unwrap());
    }

    #[test]
    fn test_debit_and_credit_coffee() {
        let mut ledger = ledger(SEED);
        assert!(!ledger.debit_card_coffee_vouchers(&card("04aa"), 3).unwrap());
        assert!(ledger.debit_card_coffee_vouchers(&card("04aa"), 2).unwrap());
        assert_eq!(ledger.card_coffee_balance(&card("04aa")).unwrap(), 0);

        assert!(ledger.credit_card_coffee_vouchers(&card("04bb"), 10).unwrap());
        assert_eq!(ledger.card_coffee_balance(&card("04bb")).unwrap(), 10);

        assert!(!ledger.debit_card_coffee_vouchers(&card("ffff"), 1).unwrap());
    }

    #[test]
    fn test_invalid_rows_are_skipped() {
        let csv = r#"type,key,name,id,amount,valid
member,alice,,17,,
member,alice,Duplicate,18,,
wallet,carol,,,5,
card,04ee,carol,,,
refund,alice,,,1,
wallet,alice,,,not-a-number,
wallet,alice,,,1,"#;

        let mut ledger = ledger(csv);
        assert_eq!(ledger.member("alice").unwrap().id, MemberId(17));
        assert_eq!(ledger.member("alice").unwrap().wallets().len(), 1);
        assert!(ledger.member("carol").is_none());
        assert!(ledger.lookup_card(&card("04ee")).unwrap().is_none());
    }

    #[test]
    fn test_whitespace_handling() {
        let csv = r#"type, key, name, id, amount, valid
member, alice, Alice, 17, ,
wallet, alice, , , 2.5, true"#;

        let ledger = ledger(csv);
        assert_eq!(
            ledger.member("alice").unwrap().balance(),
            Decimal::from_str("2.5").unwrap()
        );
    }
}
