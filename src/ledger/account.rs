//! Member and card account models.
//!
//! Balances never go negative: every withdrawal checks coverage first and
//! leaves the account untouched when it is refused.

use crate::backend::MemberId;
use rust_decimal::Decimal;

/// One voucher wallet. Members get a new wallet every semester; expired
/// wallets keep their balance for the record but cannot be spent.
#[derive(Debug, Clone, PartialEq)]
pub struct Wallet {
    pub balance: Decimal,
    pub valid: bool,
}

/// A member and their wallets.
///
/// # Invariants
///
/// - Every wallet balance is `>= 0`
/// - Only valid wallets count toward [`MemberAccount::balance`]
#[derive(Debug, Clone)]
pub struct MemberAccount {
    pub id: MemberId,
    pub username: String,
    pub display_name: Option<String>,
    wallets: Vec<Wallet>,
}

impl MemberAccount {
    /// Creates a member with no wallets.
    pub fn new(id: MemberId, username: &str, display_name: Option<String>) -> Self {
        MemberAccount {
            id,
            username: username.to_string(),
            display_name,
            wallets: Vec::new(),
        }
    }

    pub fn add_wallet(&mut self, balance: Decimal, valid: bool) {
        self.wallets.push(Wallet { balance, valid });
    }

    pub fn wallets(&self) -> &[Wallet] {
        &self.wallets
    }

    /// Summed balance of all valid wallets.
    pub fn balance(&self) -> Decimal {
        self.wallets
            .iter()
            .filter(|w| w.valid)
            .map(|w| w.balance)
            .sum()
    }

    /// Withdraws whole vouchers from the valid wallets, oldest first.
    ///
    /// Returns `false` and changes nothing if the valid balance does not
    /// cover `amount`.
    pub fn withdraw(&mut self, amount: u32) -> bool {
        let mut remaining = Decimal::from(amount);
        if self.balance() < remaining {
            return false;
        }

        for wallet in self.wallets.iter_mut().filter(|w| w.valid) {
            if remaining.is_zero() {
                break;
            }
            let taken = wallet.balance.min(remaining);
            wallet.balance -= taken;
            remaining -= taken;
        }
        true
    }
}

/// A physical card and the coffee vouchers attached to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardAccount {
    /// Owning member's username; `None` for a coffee-only card.
    pub owner: Option<String>,
    /// Whether the card has been registered (known to `lookup_card`).
    pub registered: bool,
    coffee: u32,
}

impl CardAccount {
    pub fn coffee(&self) -> u32 {
        self.coffee
    }

    pub fn set_coffee(&mut self, balance: u32) {
        self.coffee = balance;
    }

    /// Adds coffee vouchers. Returns `false` on overflow.
    pub fn deposit(&mut self, amount: u32) -> bool {
        match self.coffee.checked_add(amount) {
            Some(balance) => {
                self.coffee = balance;
                true
            }
            None => false,
        }
    }

    /// Removes coffee vouchers. Returns `false` if the balance is too small.
    pub fn withdraw(&mut self, amount: u32) -> bool {
        match self.coffee.checked_sub(amount) {
            Some(balance) => {
                self.coffee = balance;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn member() -> MemberAccount {
        MemberAccount::new(MemberId(1), "alice", None)
    }

    #[test]
    fn test_new_member_has_zero_balance() {
        let account = member();
        assert!(account.balance().is_zero());
        assert!(account.wallets().is_empty());
    }

    #[test]
    fn test_balance_ignores_expired_wallets() {
        let mut account = member();
        account.add_wallet(dec("2.5"), true);
        account.add_wallet(dec("10"), false);
        account.add_wallet(dec("1"), true);

        assert_eq!(account.balance(), dec("3.5"));
    }

    #[test]
    fn test_withdraw_drains_valid_wallets_in_order() {
        let mut account = member();
        account.add_wallet(dec("2"), true);
        account.add_wallet(dec("4"), false);
        account.add_wallet(dec("3"), true);

        assert!(account.withdraw(4));
        let balances: Vec<Decimal> = account.wallets().iter().map(|w| w.balance).collect();
        assert_eq!(balances, vec![dec("0"), dec("4"), dec("1")]);
        assert_eq!(account.balance(), dec("1"));
    }

    #[test]
    fn test_withdraw_fails_with_insufficient_vouchers() {
        let mut account = member();
        account.add_wallet(dec("1"), true);
        account.add_wallet(dec("50"), false);

        assert!(!account.withdraw(3));
        assert_eq!(account.balance(), dec("1"));
    }

    #[test]
    fn test_withdraw_exact_balance() {
        let mut account = member();
        account.add_wallet(dec("5"), true);

        assert!(account.withdraw(5));
        assert!(account.balance().is_zero());
    }

    #[test]
    fn test_card_deposit_and_withdraw() {
        let mut card = CardAccount::default();
        assert!(card.deposit(10));
        assert!(card.withdraw(3));
        assert_eq!(card.coffee(), 7);

        assert!(!card.withdraw(8));
        assert_eq!(card.coffee(), 7);
    }

    #[test]
    fn test_card_deposit_overflow_is_refused() {
        let mut card = CardAccount::default();
        card.set_coffee(u32::MAX);
        assert!(!card.deposit(1));
        assert_eq!(card.coffee(), u32::MAX);
    }
}
