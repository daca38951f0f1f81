//! Per-card session state machine.
//!
//! ```text
//! AwaitingCard → ResolvingCustomer ─found──────────────→ DisplayBalances
//!                        │                                     ↑
//!                    not found                                 │
//!                        ↓                                     │
//!                 RegisterOrAbort → CollectUsername → RegisterCard
//!
//! DisplayBalances → ActionMenu ─withdraw→ AmountEntry → SelectBalance ─┐
//!                       └──────buy coffee──────────────────────────────┤
//!                                                                      ↓
//!                                     Idle ← Confirmation ← Settlement
//! ```
//!
//! # Invariants
//!
//! - Every cancel or empty input goes straight to `Idle` without touching a
//!   balance
//! - The only balance mutation is issued from `Settlement`, at most once per
//!   session, and its result is always awaited
//! - A backend failure ends the session with an error message instead of
//!   ending the process

use crate::backend::{Backend, CardId, CardOwner, MemberId};
use crate::config::{COFFEE_BLOCK_SIZE, CONFIRMATION_DWELL_SECS, NOTICE_DWELL};
use crate::display::{CharDisplay, Screen, BOTH, CUSTOMER, OPERATOR};
use crate::error::{KioskError, Result};
use crate::input::ButtonSource;
use crate::menu::{self, AmountMenu, ChoiceMenu, MenuOutcome, TextMenu};
use crate::reader::CardReader;
use crate::session::{whole_vouchers, Action, Answer, Customer, Session, Settlement, VoucherKind};
use crate::terminal::{Clock, Terminal};
use log::{debug, error, info};
use std::time::Duration;

const LOADING: &str = "Loading system...";
const WAITING_FOR_CARD: &str = "Waiting for card";
const NOT_RECOGNISED: &str = "Not recognised";
const IS_MEMBER_PROMPT: &str = "Is this a member?";
const USERNAME_PROMPT: &str = "Username";
const USER_NOT_FOUND: &str = "User not found";
const REGISTERING: &str = "Registering card";
const REGISTERED: &str = "Card registered!";
const REGISTRATION_FAILED: &str = "Registration\nfailed";
const ACTION_PROMPT: &str = "What do you want?";
const AMOUNT_PROMPT: &str = "Amount";
const VOUCHER_PROMPT: &str = "Which voucher?";
const BACKEND_ERROR: &str = "Error!\nTry again";
const IDLE_GREETING: &str = "Hello!";

const YES_NO: &[(Answer, &str)] = &[(Answer::Yes, "Yes"), (Answer::No, "No")];

const VOUCHER_KINDS: &[(VoucherKind, &str)] = &[
    (VoucherKind::Member, "Member voucher"),
    (VoucherKind::Coffee, "Coffee voucher"),
];

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Cancelled, declined or empty input; nothing was mutated.
    Aborted,
    /// The settlement was issued; `accepted` is the backend's answer.
    Settled {
        settlement: Settlement,
        accepted: bool,
    },
    /// The backend failed; the session was abandoned.
    Failed,
}

/// States of one session. Each variant carries what the next entry action
/// needs.
#[derive(Debug)]
enum State {
    AwaitingCard,
    ResolvingCustomer(CardId),
    RegisterOrAbort(CardId),
    CollectUsername(CardId),
    RegisterCard {
        card: CardId,
        username: String,
        member: MemberId,
    },
    DisplayBalances {
        card: CardId,
        owner: CardOwner,
    },
    ActionMenu(Session),
    AmountEntry(Session),
    SelectBalance {
        session: Session,
        amount: u32,
    },
    Settlement(Settlement),
    Confirmation {
        message: String,
        end: SessionEnd,
    },
    Idle(SessionEnd),
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::AwaitingCard => "AwaitingCard",
            State::ResolvingCustomer(_) => "ResolvingCustomer",
            State::RegisterOrAbort(_) => "RegisterOrAbort",
            State::CollectUsername(_) => "CollectUsername",
            State::RegisterCard { .. } => "RegisterCard",
            State::DisplayBalances { .. } => "DisplayBalances",
            State::ActionMenu(_) => "ActionMenu",
            State::AmountEntry(_) => "AmountEntry",
            State::SelectBalance { .. } => "SelectBalance",
            State::Settlement(_) => "Settlement",
            State::Confirmation { .. } => "Confirmation",
            State::Idle(_) => "Idle",
        }
    }
}

/// The transaction controller.
///
/// Owns the backend, the card reader and the terminal for the lifetime of
/// the process and runs one session per card tap.
pub struct Kiosk<B, R, S, D, C> {
    backend: B,
    reader: R,
    terminal: Terminal<S, D, C>,
}

impl<B, R, S, D, C> Kiosk<B, R, S, D, C>
where
    B: Backend,
    R: CardReader,
    S: ButtonSource,
    D: CharDisplay,
    C: Clock,
{
    pub fn new(backend: B, reader: R, terminal: Terminal<S, D, C>) -> Self {
        Kiosk {
            backend,
            reader,
            terminal,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn terminal(&self) -> &Terminal<S, D, C> {
        &self.terminal
    }

    /// Lights both displays and shows the loading notice.
    pub fn power_on(&mut self) -> Result<()> {
        self.terminal.displays.set_backlight(BOTH, true)?;
        self.terminal.displays.show(BOTH, LOADING)
    }

    /// Runs sessions until a fatal error occurs.
    pub fn run(&mut self) -> Result<()> {
        loop {
            let end = self.run_session()?;
            debug!("Session ended: {:?}", end);
        }
    }

    /// Runs one session from `AwaitingCard` to `Idle`.
    pub fn run_session(&mut self) -> Result<SessionEnd> {
        let mut state = State::AwaitingCard;

        loop {
            debug!("Entering {}", state.name());

            if let State::Idle(end) = state {
                self.terminal.displays.show(CUSTOMER, IDLE_GREETING)?;
                return Ok(end);
            }

            state = match self.step(state) {
                Ok(next) => next,
                Err(KioskError::Backend(message)) => {
                    error!("Backend failure, abandoning session: {}", message);
                    State::Confirmation {
                        message: BACKEND_ERROR.to_string(),
                        end: SessionEnd::Failed,
                    }
                }
                Err(e) => return Err(e),
            };
        }
    }

    /// Runs the entry action of `state` and returns the next state.
    fn step(&mut self, state: State) -> Result<State> {
        match state {
            State::AwaitingCard => {
                self.terminal.displays.show(BOTH, WAITING_FOR_CARD)?;
                let card = self.reader.read_card_id()?;
                info!("Card {} presented", card);
                Ok(State::ResolvingCustomer(card))
            }

            State::ResolvingCustomer(card) => match self.backend.lookup_card(&card)? {
                Some(owner) => Ok(State::DisplayBalances { card, owner }),
                None => {
                    info!("Card {} is not registered", card);
                    self.terminal.displays.show(CUSTOMER, NOT_RECOGNISED)?;
                    Ok(State::RegisterOrAbort(card))
                }
            },

            State::RegisterOrAbort(card) => {
                let menu = ChoiceMenu::new(OPERATOR, IS_MEMBER_PROMPT, YES_NO);
                match menu::run(&mut self.terminal, menu)? {
                    MenuOutcome::Selected(Answer::Yes) => Ok(State::CollectUsername(card)),
                    _ => Ok(State::Idle(SessionEnd::Aborted)),
                }
            }

            State::CollectUsername(card) => {
                let menu = TextMenu::new(BOTH, USERNAME_PROMPT);
                let username = match menu::run(&mut self.terminal, menu)?.selected() {
                    Some(username) if !username.is_empty() => username,
                    _ => return Ok(State::Idle(SessionEnd::Aborted)),
                };

                match self.backend.find_member(&username)? {
                    Some(member) => Ok(State::RegisterCard {
                        card,
                        username,
                        member,
                    }),
                    None => {
                        debug!("No member named {}", username);
                        self.notice(USER_NOT_FOUND)?;
                        Ok(State::CollectUsername(card))
                    }
                }
            }

            State::RegisterCard {
                card,
                username,
                member,
            } => {
                self.terminal.displays.show(BOTH, REGISTERING)?;
                if !self.backend.register_card(&card, Some(member), true)? {
                    info!("Backend refused to register card {} to {}", card, username);
                    self.notice(REGISTRATION_FAILED)?;
                    return Ok(State::Idle(SessionEnd::Aborted));
                }

                info!("Registered card {} to {}", card, username);
                self.notice(REGISTERED)?;
                let owner = CardOwner {
                    username: Some(username),
                    display_name: None,
                };
                Ok(State::DisplayBalances { card, owner })
            }

            State::DisplayBalances { card, owner } => {
                let customer = self.resolve_customer(&card, owner)?;
                self.show_balances(&customer)?;
                Ok(State::ActionMenu(Session {
                    card,
                    customer,
                    action: None,
                }))
            }

            State::ActionMenu(mut session) => {
                let buy_label = format!("Buy {} coffees", COFFEE_BLOCK_SIZE);
                let actions = [
                    (Action::Withdraw, "Withdraw"),
                    (Action::BuyCoffee, buy_label.as_str()),
                ];
                let menu = ChoiceMenu::new(OPERATOR, ACTION_PROMPT, &actions);
                let action = match menu::run(&mut self.terminal, menu)? {
                    MenuOutcome::Selected(action) => action,
                    MenuOutcome::Cancelled => return Ok(State::Idle(SessionEnd::Aborted)),
                };
                session.action = Some(action);

                match action {
                    Action::Withdraw => Ok(State::AmountEntry(session)),
                    Action::BuyCoffee => Ok(State::Settlement(Settlement::CreditCard {
                        card: session.card,
                        amount: COFFEE_BLOCK_SIZE,
                    })),
                }
            }

            State::AmountEntry(session) => {
                self.terminal
                    .displays
                    .show(OPERATOR, &session.customer.operator_view())?;
                let (rows, _) = self.terminal.displays.get(Screen::Operator).size();
                let menu = AmountMenu::new(OPERATOR, AMOUNT_PROMPT, false, rows.saturating_sub(1));

                match menu::run(&mut self.terminal, menu)? {
                    MenuOutcome::Selected(amount) if amount > 0 => {
                        Ok(State::SelectBalance { session, amount })
                    }
                    _ => Ok(State::Idle(SessionEnd::Aborted)),
                }
            }

            State::SelectBalance { session, amount } => {
                let username = match session.customer.username {
                    Some(username) if session.customer.is_member => Some(username),
                    _ => None,
                };

                let Some(username) = username else {
                    return Ok(State::Settlement(Settlement::DebitCard {
                        card: session.card,
                        amount,
                    }));
                };

                let menu = ChoiceMenu::new(OPERATOR, VOUCHER_PROMPT, VOUCHER_KINDS);
                match menu::run(&mut self.terminal, menu)? {
                    MenuOutcome::Selected(VoucherKind::Member) => {
                        Ok(State::Settlement(Settlement::DebitMember { username, amount }))
                    }
                    MenuOutcome::Selected(VoucherKind::Coffee) => {
                        Ok(State::Settlement(Settlement::DebitCard {
                            card: session.card,
                            amount,
                        }))
                    }
                    MenuOutcome::Cancelled => Ok(State::Idle(SessionEnd::Aborted)),
                }
            }

            State::Settlement(settlement) => {
                self.terminal
                    .displays
                    .show(BOTH, &settlement.pending_message())?;
                let accepted = self.settle(&settlement)?;
                info!(
                    "Settlement {}: {}",
                    settlement,
                    if accepted { "accepted" } else { "refused" }
                );
                Ok(State::Confirmation {
                    message: settlement.outcome_message(accepted),
                    end: SessionEnd::Settled {
                        settlement,
                        accepted,
                    },
                })
            }

            State::Confirmation { message, end } => {
                self.terminal.displays.show(BOTH, &message)?;
                self.countdown(CONFIRMATION_DWELL_SECS)?;
                Ok(State::Idle(end))
            }

            State::Idle(end) => Ok(State::Idle(end)),
        }
    }

    /// Builds the session's customer. The member balance is only fetched for
    /// cards that belong to a member.
    fn resolve_customer(&mut self, card: &CardId, owner: CardOwner) -> Result<Customer> {
        let card_voucher_balance = self.backend.card_coffee_balance(card)?;
        let member_voucher_balance = match owner.username.as_deref() {
            Some(username) => whole_vouchers(self.backend.member_voucher_balance(username)?),
            None => 0,
        };

        Ok(Customer {
            is_member: owner.username.is_some(),
            username: owner.username,
            display_name: owner.display_name,
            member_voucher_balance,
            card_voucher_balance,
        })
    }

    fn show_balances(&mut self, customer: &Customer) -> Result<()> {
        let displays = &mut self.terminal.displays;
        displays.show(OPERATOR, &customer.operator_view())?;
        displays.show(CUSTOMER, &customer.customer_view())
    }

    fn settle(&mut self, settlement: &Settlement) -> Result<bool> {
        match settlement {
            Settlement::DebitMember { username, amount } => {
                self.backend.debit_member_vouchers(username, *amount)
            }
            Settlement::DebitCard { card, amount } => {
                self.backend.debit_card_coffee_vouchers(card, *amount)
            }
            Settlement::CreditCard { card, amount } => {
                self.backend.credit_card_coffee_vouchers(card, *amount)
            }
        }
    }

    /// Shows `message` on both displays long enough to read it.
    fn notice(&mut self, message: &str) -> Result<()> {
        self.terminal.displays.show(BOTH, message)?;
        self.terminal.pause(NOTICE_DWELL);
        Ok(())
    }

    /// Counts down in the bottom-right corner of both displays, one
    /// second per step. Not cancellable.
    fn countdown(&mut self, seconds: u32) -> Result<()> {
        for remaining in (1..=seconds).rev() {
            for &screen in BOTH {
                let (rows, _) = self.terminal.displays.get(screen).size();
                self.terminal.displays.show_right(
                    &[screen],
                    &format!("{:>2}", remaining),
                    rows.saturating_sub(1),
                )?;
            }
            self.terminal.pause(Duration::from_secs(1));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{Displays, MemoryDisplay};
    use crate::input::{Button, Buttons, Polarity, ScriptedPanel};
    use crate::ledger::Ledger;
    use crate::reader::LineCardReader;
    use crate::terminal::InstantClock;
    use rust_decimal::Decimal;
    use std::io::Cursor;

    type TestKiosk<B> =
        Kiosk<B, LineCardReader<Cursor<&'static str>>, ScriptedPanel, MemoryDisplay, InstantClock>;

    /// Fails every call.
    struct OfflineBackend;

    fn offline<T>() -> Result<T> {
        Err(KioskError::Backend("connection refused".to_string()))
    }

    impl Backend for OfflineBackend {
        fn lookup_card(&mut self, _: &CardId) -> Result<Option<CardOwner>> {
            offline()
        }
        fn member_voucher_balance(&mut self, _: &str) -> Result<Decimal> {
            offline()
        }
        fn card_coffee_balance(&mut self, _: &CardId) -> Result<u32> {
            offline()
        }
        fn find_member(&mut self, _: &str) -> Result<Option<MemberId>> {
            offline()
        }
        fn register_card(&mut self, _: &CardId, _: Option<MemberId>, _: bool) -> Result<bool> {
            offline()
        }
        fn debit_member_vouchers(&mut self, _: &str, _: u32) -> Result<bool> {
            offline()
        }
        fn debit_card_coffee_vouchers(&mut self, _: &CardId, _: u32) -> Result<bool> {
            offline()
        }
        fn credit_card_coffee_vouchers(&mut self, _: &CardId, _: u32) -> Result<bool> {
            offline()
        }
    }

    fn kiosk<B: Backend>(backend: B, cards: &'static str, panel: ScriptedPanel) -> TestKiosk<B> {
        let terminal = Terminal::new(
            Buttons::new(panel, Polarity::ActiveLow),
            Displays::new(MemoryDisplay::new(4, 20), MemoryDisplay::new(2, 16)),
            InstantClock::new(),
            Duration::from_millis(20),
        );
        Kiosk::new(backend, LineCardReader::new(Cursor::new(cards)), terminal)
    }

    fn seeded() -> Ledger {
        let mut ledger = Ledger::new();
        ledger
            .process_csv(Cursor::new(
                "type,key,name,id,amount,valid\ncard,04bb,,,,\ncoffee,04bb,,,1,",
            ))
            .unwrap();
        ledger
    }

    #[test]
    fn test_power_on_lights_both_displays() {
        let mut kiosk = kiosk(Ledger::new(), "", ScriptedPanel::new(Polarity::ActiveLow));
        kiosk.power_on().unwrap();

        for screen in [Screen::Operator, Screen::Customer] {
            let display = kiosk.terminal().displays.get(screen);
            assert!(display.backlight());
            assert_eq!(display.line(0), "Loading system...");
        }
    }

    #[test]
    fn test_backend_failure_ends_session_not_process() {
        let mut kiosk = kiosk(OfflineBackend, "04aa\n", ScriptedPanel::new(Polarity::ActiveLow));
        assert_eq!(kiosk.run_session().unwrap(), SessionEnd::Failed);

        let terminal = kiosk.terminal();
        assert_eq!(terminal.displays.get(Screen::Operator).line(0), "Error!");
        assert_eq!(terminal.displays.get(Screen::Operator).line(1), "Try again");
        assert_eq!(terminal.displays.get(Screen::Customer).line(0), "Hello!");
        assert_eq!(terminal.clock.elapsed(), Duration::from_secs(5));
    }

    #[test]
    fn test_closed_reader_is_fatal() {
        let mut kiosk = kiosk(Ledger::new(), "\n", ScriptedPanel::new(Polarity::ActiveLow));
        assert!(matches!(kiosk.run_session(), Err(KioskError::ReaderClosed)));
        assert_eq!(
            kiosk.terminal().displays.get(Screen::Operator).line(0),
            "Waiting for card"
        );
    }

    #[test]
    fn test_exhausted_buttons_are_fatal() {
        let mut kiosk = kiosk(seeded(), "04bb\n", ScriptedPanel::new(Polarity::ActiveLow));
        assert!(matches!(kiosk.run_session(), Err(KioskError::Input(_))));
    }

    #[test]
    fn test_countdown_ends_at_one() {
        let panel = ScriptedPanel::new(Polarity::ActiveLow)
            .idle(1)
            .tap(Button::Increment)
            .tap(Button::Enter);
        let mut kiosk = kiosk(seeded(), "04bb\n", panel);

        let end = kiosk.run_session().unwrap();
        assert!(matches!(end, SessionEnd::Settled { accepted: true, .. }));

        let operator = kiosk.terminal().displays.get(Screen::Operator);
        assert_eq!(operator.line(0), "10 coffees");
        assert_eq!(operator.line(3), "                   1");
    }
}
