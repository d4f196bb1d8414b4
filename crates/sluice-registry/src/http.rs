// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! HTTP registry transport.
//!
//! ```text
//!  RegistrySync ──► HttpRegistryTransport ──► reqwest::Client ──► Registry
//!                         │
//!                         └──► ExchangeLog (append-only, verbose mode)
//! ```
//!
//! Reads send `Accept: application/json`; writes send
//! `Content-Type: application/json`. Basic auth is attached when a username
//! is configured. A `404` on `GET` reads as an absent record.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;
use sluice_config::RegistryConfig;
use sluice_core::format_timestamp;
use tracing::{debug, trace, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::transport::RegistryTransport;

const APPLICATION_JSON: &str = "application/json";

// =============================================================================
// ExchangeLog
// =============================================================================

/// Append-only mirror of every request and response body.
#[derive(Debug)]
pub struct ExchangeLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl ExchangeLog {
    /// Opens (or creates) the log in append mode.
    pub fn open(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| RegistryError::Log {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Returns the log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records an outbound request.
    pub fn outbound(&self, method: &str, path: &str, body: Option<&Value>) -> RegistryResult<()> {
        match body {
            Some(body) => self.write_line(&format!(">>> {} {} {}", method, path, body)),
            None => self.write_line(&format!(">>> {} {}", method, path)),
        }
    }

    /// Records an inbound response.
    pub fn inbound(&self, status: u16, path: &str, body: &str) -> RegistryResult<()> {
        if body.is_empty() {
            self.write_line(&format!("<<< {} {}", status, path))
        } else {
            self.write_line(&format!("<<< {} {} {}", status, path, body))
        }
    }

    /// Flushes buffered lines to disk.
    pub fn flush(&self) -> RegistryResult<()> {
        self.writer.lock().flush().map_err(|source| RegistryError::Log {
            path: self.path.clone(),
            source,
        })
    }

    fn write_line(&self, line: &str) -> RegistryResult<()> {
        let ts = format_timestamp(&Utc::now());
        writeln!(self.writer.lock(), "{} {}", ts, line).map_err(|source| RegistryError::Log {
            path: self.path.clone(),
            source,
        })
    }
}

// =============================================================================
// HttpRegistryTransport
// =============================================================================

/// Registry transport over HTTP.
#[derive(Debug)]
pub struct HttpRegistryTransport {
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
    log: Option<ExchangeLog>,
}

impl HttpRegistryTransport {
    /// Creates a transport against `base_url` with client defaults.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: None,
            log: None,
        }
    }

    /// Builds a transport from registry configuration.
    pub fn from_config(config: &RegistryConfig) -> RegistryResult<Self> {
        let mut builder = Client::builder();
        if config.timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(config.timeout_ms));
        }
        let client = builder
            .build()
            .map_err(|e| RegistryError::Client(e.to_string()))?;

        let log = if config.verbose {
            Some(ExchangeLog::open(&config.log_path)?)
        } else {
            None
        };

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            credentials: config
                .credentials()
                .map(|(user, pass)| (user.to_string(), pass.to_string())),
            log,
        })
    }

    /// Enables basic auth.
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Mirrors every exchange to `log`.
    pub fn with_exchange_log(mut self, log: ExchangeLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.credentials {
            Some((user, pass)) => builder.basic_auth(user, Some(pass)),
            None => builder,
        }
    }

    async fn execute(
        &self,
        method: &'static str,
        path: &str,
        builder: RequestBuilder,
        body: Option<&Value>,
    ) -> RegistryResult<Value> {
        if let Some(log) = &self.log {
            if let Err(e) = log.outbound(method, path, body) {
                warn!(method, path, error = %e, "Exchange log write failed");
            }
        }
        trace!(method, path, "Registry request");

        let response = builder
            .send()
            .await
            .map_err(|e| RegistryError::request(method, path, e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RegistryError::request(method, path, e.to_string()))?;

        if let Some(log) = &self.log {
            if let Err(e) = log.inbound(status.as_u16(), path, &text) {
                warn!(method, path, error = %e, "Exchange log write failed");
            }
        }
        debug!(method, path, status = status.as_u16(), "Registry response");

        if method == "GET" && status == StatusCode::NOT_FOUND {
            return Ok(Value::Null);
        }
        if !status.is_success() {
            return Err(RegistryError::status(method, path, status.as_u16()));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| RegistryError::decode(method, path, e.to_string()))
    }
}

#[async_trait]
impl RegistryTransport for HttpRegistryTransport {
    async fn get(&self, path: &str) -> RegistryResult<Value> {
        let builder = self.request(Method::GET, path).header(ACCEPT, APPLICATION_JSON);
        self.execute("GET", path, builder, None).await
    }

    async fn post(&self, path: &str, body: &Value) -> RegistryResult<Value> {
        let builder = self
            .request(Method::POST, path)
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .json(body);
        self.execute("POST", path, builder, Some(body)).await
    }

    async fn put(&self, path: &str, body: &Value) -> RegistryResult<Value> {
        let builder = self
            .request(Method::PUT, path)
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .json(body);
        self.execute("PUT", path, builder, Some(body)).await
    }

    async fn close(&self) -> RegistryResult<()> {
        match &self.log {
            Some(log) => log.flush(),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        &self.base_url
    }
}

// =============================================================================
// Tests
// =============================================================================
