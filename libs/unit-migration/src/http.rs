// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! HTTP collaborators
//!
//! - [`HttpItemLookup`]: `GET {base}/units/{unit_id}/items?group_id={group_id}`
//!   returning a JSON array of `{"filename", "source_locator"}` objects
//! - [`HttpSource`]: streams `GET {source_locator}`
//! - [`HttpNotifier`]: `POST {url}` with `{"container", "name"}`

use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use url::Url;

use crate::stores::{
    ByteStream, ItemEntry, ItemLookup, LookupError, Notifier, NotifyError, SourceStore,
    TransferError, UnitRef,
};

/// Default whole-request timeout for lookup and notify calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default time allowed to establish a source connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default longest pause between reads of a source body
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

const USER_AGENT: &str = concat!("unit-migration/", env!("CARGO_PKG_VERSION"));

/// Build the client for lookup and notify calls; `timeout` caps each
/// request from connect to the last body byte.
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// Build the client for source downloads.
///
/// No whole-request cap: a large object may stream for as long as it needs,
/// provided no single read stalls longer than `read_timeout`.
pub fn build_source_client(
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .read_timeout(read_timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// Parse a base URL that path segments can be appended to.
fn base_url(raw: &str) -> Result<Url, url::ParseError> {
    let url = Url::parse(raw)?;
    if url.cannot_be_a_base() {
        return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase);
    }
    Ok(url)
}

fn request_error(e: &reqwest::Error) -> TransferError {
    if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
        TransferError::Network(e.to_string())
    } else {
        TransferError::Other(e.to_string())
    }
}

fn status_error(status: StatusCode, url: &str) -> TransferError {
    match status {
        StatusCode::NOT_FOUND => TransferError::NotFound(url.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            TransferError::PermissionDenied(format!("{url}: HTTP {}", status.as_u16()))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            TransferError::Throttled(format!("{url}: HTTP {}", status.as_u16()))
        }
        _ => TransferError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        },
    }
}

/// Item lookup over HTTP
#[derive(Clone)]
pub struct HttpItemLookup {
    client: Client,
    base: Url,
}

impl HttpItemLookup {
    pub fn new(client: Client, base: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            base: base_url(base)?,
        })
    }

    fn items_url(&self, unit: &UnitRef) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["units", unit.unit_id.as_str(), "items"]);
        }
        url.query_pairs_mut().append_pair("group_id", &unit.group_id);
        url
    }
}

#[async_trait]
impl ItemLookup for HttpItemLookup {
    async fn items(&self, unit: &UnitRef) -> Result<Vec<ItemEntry>, LookupError> {
        let url = self.items_url(unit);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LookupError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(unit_id = %unit.unit_id, status = %status, "Lookup error response");
            return Err(LookupError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LookupError::Request(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| LookupError::Decode(e.to_string()))
    }
}

/// Source store reading `http(s)` locators
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceStore for HttpSource {
    async fn open(&self, locator: &str) -> Result<ByteStream, TransferError> {
        let response = self.client.get(locator).send().await.map_err(|e| {
            tracing::debug!(url = %locator, error = %e, "HTTP request failed");
            request_error(&e)
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %locator, status = %status, "HTTP error response");
            return Err(status_error(status, locator));
        }

        Ok(Box::pin(
            response.bytes_stream().map_err(std::io::Error::other),
        ))
    }
}

#[derive(Serialize)]
struct NotifyMessage<'a> {
    container: &'a str,
    name: &'a str,
}

/// Posts a JSON message per written object
#[derive(Clone)]
pub struct HttpNotifier {
    client: Client,
    url: Url,
    container: String,
}

impl HttpNotifier {
    pub fn new(
        client: Client,
        url: &str,
        container: impl Into<String>,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            url: Url::parse(url)?,
            container: container.into(),
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, name: &str) -> Result<(), NotifyError> {
        let message = NotifyMessage {
            container: &self.container,
            name,
        };
        let response = self
            .client
            .post(self.url.clone())
            .json(&message)
            .send()
            .await
            .map_err(|e| NotifyError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError(format!("HTTP {}", status.as_u16())));
        }
        Ok(())
    }
}
