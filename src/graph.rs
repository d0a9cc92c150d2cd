//! Minimal Microsoft Graph client.
//!
//! Every request is a bearer-authenticated `GET`. The wire is abstracted behind
//! [`Transport`] so the collector and resolver can be driven by a scripted
//! transport in tests; [`HttpTransport`] is the blocking `reqwest` implementation
//! used by the binary.
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use thiserror::Error;

pub const DEFAULT_API_BASE: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("teams-chat-export/", env!("CARGO_PKG_VERSION"));
const SNIPPET_LEN: usize = 200;

/// A bearer credential, stored without its `Bearer ` scheme prefix.
#[derive(Clone)]
pub struct BearerToken(String);

impl BearerToken {
    /// Accepts the token with or without the scheme prefix. Returns `None` if
    /// nothing remains after trimming.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let token = match raw.split_once(char::is_whitespace) {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
            None if raw.eq_ignore_ascii_case("bearer") => "",
            _ => raw,
        };
        if token.is_empty() {
            None
        } else {
            Some(Self(token.to_string()))
        }
    }

    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Raw response as received: status plus the exact body bytes.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Other(String),
}

pub trait Transport {
    fn get(&self, url: &str) -> Result<RawResponse, TransportError>;
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("credential invalid or expired (HTTP 401), obtain a new token")]
    Unauthorized,
    #[error("HTTP {status} from {url}: {snippet}")]
    Status {
        status: u16,
        url: String,
        snippet: String,
    },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },
    #[error("malformed response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, FetchError::Unauthorized)
    }

    pub fn status(url: &str, response: &RawResponse) -> Self {
        FetchError::Status {
            status: response.status,
            url: url.to_string(),
            snippet: snippet(&response.body),
        }
    }
}

/// First few hundred characters of a body, for diagnostics.
pub fn snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let mut out: String = text.chars().take(SNIPPET_LEN).collect();
    if text.chars().count() > SNIPPET_LEN {
        out.push_str("...");
    }
    out
}

pub struct HttpTransport {
    client: Client,
    token: BearerToken,
}

impl HttpTransport {
    pub fn new(token: BearerToken, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, token })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
        let res = self
            .client
            .get(url)
            .header(AUTHORIZATION, self.token.header_value())
            .header(CONTENT_TYPE, "application/json")
            .send()?;
        let status = res.status().as_u16();
        let body = res.bytes()?.to_vec();
        Ok(RawResponse { status, body })
    }
}

/// Endpoint builder plus a transport.
pub struct GraphClient<T> {
    transport: T,
    base: String,
}

impl<T: Transport> GraphClient<T> {
    pub fn new(transport: T, base: &str) -> Self {
        Self {
            transport,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn messages_url(&self, chat_id: &str, top: usize) -> String {
        format!("{}/chats/{}/messages?$top={}", self.base, chat_id, top)
    }

    pub fn members_url(&self, chat_id: &str) -> String {
        format!("{}/chats/{}/members", self.base, chat_id)
    }

    pub fn expanded_chat_url(&self, chat_id: &str) -> String {
        format!("{}/chats/{}?$expand=members", self.base, chat_id)
    }

    /// Issue a GET and hand back the raw response whatever its status.
    pub fn get_raw(&self, url: &str) -> Result<RawResponse, FetchError> {
        self.transport.get(url).map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })
    }

    /// GET expecting a 200 JSON body. 401 maps to [`FetchError::Unauthorized`].
    pub fn get_json<D: DeserializeOwned>(&self, url: &str) -> Result<D, FetchError> {
        let response = self.get_raw(url)?;
        match response.status {
            200 => decode(url, &response.body),
            401 => Err(FetchError::Unauthorized),
            _ => Err(FetchError::status(url, &response)),
        }
    }
}

pub fn decode<D: DeserializeOwned>(url: &str, body: &[u8]) -> Result<D, FetchError> {
    serde_json::from_slice(body).map_err(|source| FetchError::Decode {
        url: url.to_string(),
        source,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Serves canned responses keyed by URL and records every request.
    #[derive(Default)]
    pub struct ScriptedTransport {
        routes: HashMap<String, RawResponse>,
        pub requests: RefCell<Vec<String>>,
    }

    impl ScriptedTransport {
        pub fn route(mut self, url: &str, status: u16, body: &str) -> Self {
            self.routes.insert(
                url.to_string(),
                RawResponse {
                    status,
                    body: body.as_bytes().to_vec(),
                },
            );
            self
        }
    }

    impl Transport for ScriptedTransport {
        fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
            self.requests.borrow_mut().push(url.to_string());
            self.routes
                .get(url)
                .cloned()
                .ok_or_else(|| TransportError::Other(format!("connection refused: {url}")))
        }
    }

    impl<T: Transport> Transport for &T {
        fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
            (*self).get(url)
        }
    }
}
