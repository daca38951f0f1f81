//! HTTP plumbing for the remote backend.

use crate::error::{KioskError, Result};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Form(Vec<(String, String)>),
    Json(Value),
}

/// One API call, relative to the configured base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Body,
    pub bearer: Option<String>,
}

impl ApiRequest {
    pub fn get(path: &str) -> Self {
        ApiRequest {
            method: Method::Get,
            path: path.to_string(),
            query: Vec::new(),
            body: Body::Empty,
            bearer: None,
        }
    }

    pub fn post(path: &str, body: Body) -> Self {
        ApiRequest {
            method: Method::Post,
            body,
            ..ApiRequest::get(path)
        }
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }
}

/// Status and raw body of an answered request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }
}

/// Sends requests to the server.
///
/// `Err` means no answer was received at all; any HTTP status, including
/// errors, comes back as an [`ApiResponse`].
pub trait Transport {
    fn send(&mut self, request: &ApiRequest) -> Result<ApiResponse>;
}

/// Blocking HTTP transport built on `ureq`.
pub struct UreqTransport {
    agent: ureq::Agent,
    base_url: String,
}

impl UreqTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        UreqTransport {
            agent,
            base_url: format!("{}/", base_url.trim_end_matches('/')),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Transport for UreqTransport {
    fn send(&mut self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = self.url(&request.path);
        let mut call = match request.method {
            Method::Get => self.agent.get(&url),
            Method::Post => self.agent.post(&url),
        };
        for (key, value) in &request.query {
            call = call.query(key, value);
        }
        if let Some(token) = &request.bearer {
            call = call.set("Authorization", &format!("Bearer {}", token));
        }

        let result = match &request.body {
            Body::Empty => call.call(),
            Body::Form(fields) => {
                let pairs: Vec<(&str, &str)> = fields
                    .iter()
                    .map(|(key, value)| (key.as_str(), value.as_str()))
                    .collect();
                call.send_form(&pairs)
            }
            Body::Json(value) => call.send_json(value),
        };

        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(e) => return Err(KioskError::Backend(format!("{}: {}", url, e))),
        };

        let status = response.status();
        let body = response
            .into_string()
            .map_err(|e| KioskError::Backend(format!("{}: {}", url, e)))?;
        Ok(ApiResponse { status, body })
    }
}
