//! Remote voucher backend over the member system's REST API.
//!
//! Authentication is an OAuth2 password grant against `o/token/`. The access
//! token is fetched at connect time and refreshed once when a request comes
//! back `401`; a second `401` is a backend error.
//!
//! | Operation | Request |
//! |---|---|
//! | card lookup | `GET api/core/cards?card_number=` |
//! | member balance | `GET api/voucher/wallets?user=` (valid wallets summed) |
//! | coffee balance | `GET api/voucher/coffee_wallets?card_number=` |
//! | member search | `GET api/core/users?username=` |
//! | card registration | `POST api/core/cards` |
//! | voucher debit | `POST api/voucher/use_vouchers` |
//! | coffee debit | `POST api/voucher/use_coffee_vouchers` |
//! | coffee credit | `POST api/voucher/register_coffee_vouchers` |
//!
//! Mutations answer `2xx` when applied and `4xx` when refused. Anything else,
//! including an unreachable server, is [`KioskError::Backend`].

pub mod transport;

pub use transport::{ApiRequest, ApiResponse, Body, Method, Transport, UreqTransport};

use crate::backend::{Backend, CardId, CardOwner, MemberId};
use crate::config::ApiConfig;
use crate::error::{KioskError, Result};
use crate::session::whole_vouchers;
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

const TOKEN_PATH: &str = "o/token/";

#[derive(Debug, Deserialize)]
struct Token {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: u32,
    username: String,
    #[serde(default)]
    realname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiCard {
    #[serde(default)]
    user: Option<ApiUser>,
}

/// The card endpoint answers with either one card or a filtered list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn first(self) -> Option<T> {
        match self {
            OneOrMany::Many(items) => items.into_iter().next(),
            OneOrMany::One(item) => Some(item),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiWallet {
    #[serde(default = "default_valid")]
    is_valid: bool,
    cached_balance: Decimal,
}

fn default_valid() -> bool {
    true
}

/// [`Backend`] talking to the member system.
pub struct RemoteBackend<T> {
    transport: T,
    config: ApiConfig,
    token: Token,
}

impl<T: Transport> RemoteBackend<T> {
    /// Logs in with the configured credentials.
    pub fn connect(mut transport: T, config: ApiConfig) -> Result<Self> {
        let token = fetch_token(&mut transport, &config, password_grant(&config))?;
        info!("Logged in to {} as {}", config.base_url, config.username);
        Ok(RemoteBackend {
            transport,
            config,
            token,
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends `request` with the current token, refreshing it once on `401`.
    fn send(&mut self, mut request: ApiRequest) -> Result<ApiResponse> {
        request.bearer = Some(self.token.access_token.clone());
        let response = self.transport.send(&request)?;
        if response.status != 401 {
            return Ok(response);
        }

        debug!("Access token rejected, refreshing");
        self.refresh()?;
        request.bearer = Some(self.token.access_token.clone());
        let response = self.transport.send(&request)?;
        if response.status == 401 {
            return Err(KioskError::Backend(format!(
                "{} still unauthorized after token refresh",
                request.path
            )));
        }
        Ok(response)
    }

    fn refresh(&mut self) -> Result<()> {
        let grant = match &self.token.refresh_token {
            Some(refresh_token) => refresh_grant(&self.config, refresh_token),
            None => password_grant(&self.config),
        };
        self.token = match fetch_token(&mut self.transport, &self.config, grant) {
            Ok(token) => token,
            Err(e) => {
                warn!("Token refresh failed ({}), logging in again", e);
                fetch_token(&mut self.transport, &self.config, password_grant(&self.config))?
            }
        };
        Ok(())
    }

    fn get<D: DeserializeOwned>(&mut self, request: ApiRequest) -> Result<D> {
        let response = self.send(request.query("format", "json"))?;
        decode(&response)
    }

    /// Issues a mutation; `Ok(false)` when the server refuses it.
    fn mutate(&mut self, path: &str, body: Value) -> Result<bool> {
        let response = self.send(ApiRequest::post(path, Body::Json(body)))?;
        if response.is_success() {
            return Ok(true);
        }
        if response.is_client_error() {
            info!("{} refused ({}): {}", path, response.status, response.body.trim());
            return Ok(false);
        }
        Err(unexpected(path, &response))
    }
}

fn password_grant(config: &ApiConfig) -> Vec<(String, String)> {
    vec![
        ("grant_type".to_string(), "password".to_string()),
        ("username".to_string(), config.username.clone()),
        ("password".to_string(), config.password.clone()),
        ("client_id".to_string(), config.client_id.clone()),
        ("client_secret".to_string(), config.client_secret.clone()),
    ]
}

fn refresh_grant(config: &ApiConfig, refresh_token: &str) -> Vec<(String, String)> {
    vec![
        ("grant_type".to_string(), "refresh_token".to_string()),
        ("refresh_token".to_string(), refresh_token.to_string()),
        ("client_id".to_string(), config.client_id.clone()),
        ("client_secret".to_string(), config.client_secret.clone()),
    ]
}

fn fetch_token<T: Transport>(
    transport: &mut T,
    config: &ApiConfig,
    grant: Vec<(String, String)>,
) -> Result<Token> {
    let response = transport.send(&ApiRequest::post(TOKEN_PATH, Body::Form(grant)))?;
    if !response.is_success() {
        return Err(KioskError::Backend(format!(
            "{} rejected credentials for {} ({})",
            TOKEN_PATH, config.username, response.status
        )));
    }
    decode(&response)
}

fn decode<D: DeserializeOwned>(response: &ApiResponse) -> Result<D> {
    if !response.is_success() {
        return Err(KioskError::Backend(format!(
            "unexpected status {}: {}",
            response.status,
            response.body.trim()
        )));
    }
    serde_json::from_str(&response.body)
        .map_err(|e| KioskError::Backend(format!("malformed response: {}", e)))
}

fn unexpected(path: &str, response: &ApiResponse) -> KioskError {
    KioskError::Backend(format!(
        "{} answered {}: {}",
        path,
        response.status,
        response.body.trim()
    ))
}

/// `null`, `{}` and `[]` all mean "nothing found".
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}

fn sum_wallets(wallets: &[ApiWallet]) -> Decimal {
    wallets
        .iter()
        .filter(|w| w.is_valid)
        .map(|w| w.cached_balance)
        .sum()
}

impl<T: Transport> Backend for RemoteBackend<T> {
    fn lookup_card(&mut self, card: &CardId) -> Result<Option<CardOwner>> {
        let response = self.send(
            ApiRequest::get("api/core/cards")
                .query("format", "json")
                .query("card_number", card.as_str()),
        )?;
        if response.status == 404 {
            return Ok(None);
        }

        let value: Value = decode(&response)?;
        if is_empty(&value) {
            return Ok(None);
        }
        let cards: OneOrMany<ApiCard> = serde_json::from_value(value)
            .map_err(|e| KioskError::Backend(format!("malformed card: {}", e)))?;

        Ok(cards.first().map(|card| match card.user {
            Some(user) => CardOwner {
                username: Some(user.username),
                display_name: user.realname.filter(|name| !name.trim().is_empty()),
            },
            None => CardOwner {
                username: None,
                display_name: None,
            },
        }))
    }

    fn member_voucher_balance(&mut self, username: &str) -> Result<Decimal> {
        let wallets: Vec<ApiWallet> =
            self.get(ApiRequest::get("api/voucher/wallets").query("user", username))?;
        Ok(sum_wallets(&wallets))
    }

    fn card_coffee_balance(&mut self, card: &CardId) -> Result<u32> {
        let wallets: Vec<ApiWallet> = self.get(
            ApiRequest::get("api/voucher/coffee_wallets").query("card_number", card.as_str()),
        )?;
        Ok(whole_vouchers(sum_wallets(&wallets)))
    }

    fn find_member(&mut self, username_query: &str) -> Result<Option<MemberId>> {
        let query = username_query.trim();
        let users: Vec<ApiUser> =
            self.get(ApiRequest::get("api/core/users").query("username", query))?;
        Ok(users
            .into_iter()
            .find(|user| user.username.eq_ignore_ascii_case(query))
            .map(|user| MemberId(user.id)))
    }

    fn register_card(
        &mut self,
        card: &CardId,
        member: Option<MemberId>,
        is_member: bool,
    ) -> Result<bool> {
        self.mutate(
            "api/core/cards",
            json!({
                "card_number": card.as_str(),
                "user": member.map(|m| m.0),
                "is_member": is_member,
            }),
        )
    }

    fn debit_member_vouchers(&mut self, username: &str, amount: u32) -> Result<bool> {
        self.mutate(
            "api/voucher/use_vouchers",
            json!({ "user": username, "vouchers": amount }),
        )
    }

    fn debit_card_coffee_vouchers(&mut self, card: &CardId, amount: u32) -> Result<bool> {
        self.mutate(
            "api/voucher/use_coffee_vouchers",
            json!({ "card_number": card.as_str(), "vouchers": amount }),
        )
    }

    fn credit_card_coffee_vouchers(&mut self, card: &CardId, amount: u32) -> Result<bool> {
        self.mutate(
            "api/voucher/register_coffee_vouchers",
            json!({ "card_number": card.as_str(), "vouchers": amount }),
        )
    }
}
