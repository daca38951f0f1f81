//! Session-scoped data: the resolved customer, the chosen action and the
//! settlement that concludes a session.
//!
//! Nothing here outlives one card tap.

use crate::backend::CardId;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;

/// A customer as resolved from the backend for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub is_member: bool,
    pub member_voucher_balance: u32,
    pub card_voucher_balance: u32,
}

impl Customer {
    /// Full detail for the operator display, identity included.
    pub fn operator_view(&self) -> String {
        let coffees = format!("Coffees:  {:>3}", self.card_voucher_balance);
        if !self.is_member {
            return coffees;
        }
        let name = self
            .display_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or("");
        format!(
            "Name: {}\nVouchers: {:>3}\n{}",
            name, self.member_voucher_balance, coffees
        )
    }

    /// Balances only; the customer display never shows who the card belongs to.
    pub fn customer_view(&self) -> String {
        let coffees = format!("Coffees:  {:>3}", self.card_voucher_balance);
        if !self.is_member {
            return coffees;
        }
        format!("Vouchers: {:>3}\n{}", self.member_voucher_balance, coffees)
    }
}

/// Rounds a backend balance down to whole vouchers.
pub fn whole_vouchers(balance: Decimal) -> u32 {
    if balance.is_sign_negative() {
        return 0;
    }
    balance.floor().to_u32().unwrap_or(u32::MAX)
}

/// What the operator chose to do for the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Withdraw,
    BuyCoffee,
}

/// Which balance a withdrawal is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoucherKind {
    Member,
    Coffee,
}

/// Yes/no answer tag for choice menus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
}

/// One card tap in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub card: CardId,
    pub customer: Customer,
    pub action: Option<Action>,
}

/// The single backend mutation that concludes a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    DebitMember { username: String, amount: u32 },
    DebitCard { card: CardId, amount: u32 },
    CreditCard { card: CardId, amount: u32 },
}

impl Settlement {
    pub fn amount(&self) -> u32 {
        match self {
            Settlement::DebitMember { amount, .. }
            | Settlement::DebitCard { amount, .. }
            | Settlement::CreditCard { amount, .. } => *amount,
        }
    }

    /// Shown while the backend call is in flight.
    pub fn pending_message(&self) -> String {
        let amount = self.amount();
        match self {
            Settlement::DebitMember { .. } => format!("Deducting {}\n{}", amount, vouchers(amount)),
            Settlement::DebitCard { .. } => format!("Deducting {}\n{}", amount, coffees(amount)),
            Settlement::CreditCard { .. } => format!("Adding {}\n{}", amount, coffees(amount)),
        }
    }

    /// Shown once the backend answered; `accepted` is its boolean result.
    ///
    /// Lines stay within 13 characters so the confirmation countdown fits
    /// beside them on a 16-column display.
    pub fn outcome_message(&self, accepted: bool) -> String {
        let amount = self.amount();
        match (self, accepted) {
            (Settlement::DebitMember { .. }, true) => {
                format!("{} {}\ndeducted", amount, vouchers(amount))
            }
            (Settlement::DebitMember { .. }, false) => "Insufficient\nvouchers".to_string(),
            (Settlement::DebitCard { .. }, true) => {
                format!("{} {}\ndeducted", amount, coffees(amount))
            }
            (Settlement::DebitCard { .. }, false) => "Insufficient\ncoffees".to_string(),
            (Settlement::CreditCard { .. }, true) => format!("{} {}\nadded", amount, coffees(amount)),
            (Settlement::CreditCard { .. }, false) => "Could not add\ncoffees".to_string(),
        }
    }
}

impl fmt::Display for Settlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Settlement::DebitMember { username, amount } => {
                write!(f, "debit {} member vouchers from {}", amount, username)
            }
            Settlement::DebitCard { card, amount } => {
                write!(f, "debit {} coffee vouchers from card {}", amount, card)
            }
            Settlement::CreditCard { card, amount } => {
                write!(f, "credit {} coffee vouchers to card {}", amount, card)
            }
        }
    }
}

fn vouchers(n: u32) -> &'static str {
    if n == 1 {
        "voucher"
    } else {
        "vouchers"
    }
}

fn coffees(n: u32) -> &'static str {
    if n == 1 {
        "coffee"
    } else {
        "coffees"
    }
}
