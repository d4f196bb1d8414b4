// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! Scripted collaborators for exercising the gateway without a network.
//!
//! - [`MockServer`]: an in-memory Source Protocol server. Tests script its
//!   address space and failures, queue value changes and inspect every call
//!   afterwards through a cloned handle.
//! - [`MockProtocolFactory`]: hands out [`MockServer`] sessions by endpoint
//!   and records which servers were constructed.
//! - [`RecordingTransport`]: a registry transport that records every
//!   request and answers lookups from canned documents.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;

use sluice_config::{ServerConfig, SubscriptionParams};
use sluice_core::{NodeAddress, StatusCode, Variant};
use sluice_opcua::{
    ChildReference, ConnectionHandle, DataChange, ItemHandle, ProtocolError, ProtocolFactory, ProtocolResult,
    SourceProtocol, SubscriptionHandle,
};
use sluice_registry::{RegistryError, RegistryResult, RegistrySync, RegistryTransport};

/// Shared, ordered log of notable events across several mock servers.
pub type Journal = Arc<Mutex<Vec<String>>>;

// =============================================================================
// Mock Source Protocol
// =============================================================================

/// One call received by a [`MockServer`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolCall {
    /// Anonymous connect.
    Connect {
        /// Endpoint URL.
        endpoint: String,
    },
    /// Username/password connect.
    ConnectWithCredentials {
        /// Endpoint URL.
        endpoint: String,
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
    /// Disconnect.
    Disconnect,
    /// Subscription creation.
    CreateSubscription(SubscriptionParams),
    /// Subscription removal.
    RemoveSubscription(SubscriptionHandle),
    /// Monitored item creation.
    AddMonitoredItem(NodeAddress),
    /// Monitored item removal.
    RemoveMonitoredItem(ItemHandle),
    /// Child enumeration.
    Browse(NodeAddress),
    /// Keep-alive/publish step.
    Pump,
}

#[derive(Debug)]
struct MockState {
    children: HashMap<NodeAddress, Vec<ChildReference>>,
    connect_failure: Option<StatusCode>,
    subscription_failure: Option<StatusCode>,
    item_failures: HashMap<NodeAddress, StatusCode>,
    browse_failures: HashMap<NodeAddress, StatusCode>,
    pump_status: StatusCode,
    queued: VecDeque<(NodeAddress, Variant, DateTime<Utc>)>,
    calls: Vec<ProtocolCall>,
    items: Vec<(ItemHandle, NodeAddress)>,
    next_item: u32,
    next_subscription: u32,
    connected: bool,
    journal: Option<Journal>,
    label: String,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            children: HashMap::new(),
            connect_failure: None,
            subscription_failure: None,
            item_failures: HashMap::new(),
            browse_failures: HashMap::new(),
            pump_status: StatusCode::GOOD,
            queued: VecDeque::new(),
            calls: Vec::new(),
            items: Vec::new(),
            next_item: 1,
            next_subscription: 1,
            connected: false,
            journal: None,
            label: String::new(),
        }
    }
}

impl MockState {
    fn journal(&self, entry: &str) {
        if let Some(journal) = &self.journal {
            journal.lock().push(format!("{} {}", self.label, entry));
        }
    }
}

/// A scriptable in-memory Source Protocol server.
///
/// Clones share state: keep one clone in the test and hand
/// [`protocol`](Self::protocol) to the code under test.
#[derive(Debug, Clone, Default)]
pub struct MockServer {
    state: Arc<Mutex<MockState>>,
}

impl MockServer {
    /// Creates a server with an empty address space.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds forward string-identified children under `parent`, in the
    /// parent's namespace.
    pub fn with_children<'a>(self, parent: NodeAddress, identifiers: impl IntoIterator<Item = &'a str>) -> Self {
        let ns = parent.namespace_index;
        let refs: Vec<ChildReference> = identifiers
            .into_iter()
            .map(|id| ChildReference::forward(NodeAddress::string(ns, id)))
            .collect();
        self.with_references(parent, refs)
    }

    /// Appends arbitrary references under `parent`, in order.
    pub fn with_references(self, parent: NodeAddress, refs: impl IntoIterator<Item = ChildReference>) -> Self {
        self.state.lock().children.entry(parent).or_default().extend(refs);
        self
    }

    /// Makes every connect fail with `status`.
    pub fn fail_connect(self, status: StatusCode) -> Self {
        self.state.lock().connect_failure = Some(status);
        self
    }

    /// Makes subscription creation fail with `status`.
    pub fn fail_subscription(self, status: StatusCode) -> Self {
        self.state.lock().subscription_failure = Some(status);
        self
    }

    /// Makes monitored item creation for `address` fail with `status`.
    pub fn fail_item(self, address: NodeAddress, status: StatusCode) -> Self {
        self.state.lock().item_failures.insert(address, status);
        self
    }

    /// Makes browsing `address` fail with `status`.
    pub fn fail_browse(self, address: NodeAddress, status: StatusCode) -> Self {
        self.state.lock().browse_failures.insert(address, status);
        self
    }

    /// Status returned by every pump.
    pub fn with_pump_status(self, status: StatusCode) -> Self {
        self.state.lock().pump_status = status;
        self
    }

    /// Records disconnects into `journal`, prefixed with `label`.
    pub fn with_journal(self, label: impl Into<String>, journal: Journal) -> Self {
        {
            let mut state = self.state.lock();
            state.label = label.into();
            state.journal = Some(journal);
        }
        self
    }

    /// Queues a value change for every monitored item at `address`.
    ///
    /// Delivered on the next pump.
    pub fn push_change(&self, address: NodeAddress, value: impl Into<Variant>, timestamp: DateTime<Utc>) {
        self.state.lock().queued.push_back((address, value.into(), timestamp));
    }

    /// Returns every call received so far.
    pub fn calls(&self) -> Vec<ProtocolCall> {
        self.state.lock().calls.clone()
    }

    /// Returns the number of calls matching `predicate`.
    pub fn count_calls(&self, predicate: impl Fn(&ProtocolCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    /// Returns the live monitored items in creation order.
    pub fn items(&self) -> Vec<(ItemHandle, NodeAddress)> {
        self.state.lock().items.clone()
    }

    /// Returns `true` while a session is open.
    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Returns a protocol instance backed by this server.
    pub fn protocol(&self) -> Box<dyn SourceProtocol> {
        Box::new(MockProtocol {
            state: self.state.clone(),
        })
    }
}

/// [`SourceProtocol`] over a [`MockServer`].
#[derive(Debug)]
pub struct MockProtocol {
    state: Arc<Mutex<MockState>>,
}

impl MockProtocol {
    fn open(&self, endpoint: &str, call: ProtocolCall) -> ProtocolResult<ConnectionHandle> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if let Some(status) = state.connect_failure {
            return Err(ProtocolError::connect(endpoint, status));
        }
        state.connected = true;
        Ok(ConnectionHandle(1))
    }
}

#[async_trait]
impl SourceProtocol for MockProtocol {
    async fn connect(&mut self, endpoint: &str) -> ProtocolResult<ConnectionHandle> {
        self.open(
            endpoint,
            ProtocolCall::Connect {
                endpoint: endpoint.to_string(),
            },
        )
    }

    async fn connect_with_credentials(
        &mut self,
        endpoint: &str,
        username: &str,
        password: &str,
    ) -> ProtocolResult<ConnectionHandle> {
        self.open(
            endpoint,
            ProtocolCall::ConnectWithCredentials {
                endpoint: endpoint.to_string(),
                username: username.to_string(),
                password: password.to_string(),
            },
        )
    }

    async fn disconnect(&mut self, _conn: ConnectionHandle) -> ProtocolResult<()> {
        let mut state = self.state.lock();
        state.calls.push(ProtocolCall::Disconnect);
        state.connected = false;
        state.journal("disconnect");
        Ok(())
    }

    async fn create_subscription(
        &mut self,
        _conn: ConnectionHandle,
        params: &SubscriptionParams,
    ) -> ProtocolResult<SubscriptionHandle> {
        let mut state = self.state.lock();
        state.calls.push(ProtocolCall::CreateSubscription(*params));
        if let Some(status) = state.subscription_failure {
            return Err(ProtocolError::subscription(status));
        }
        let handle = SubscriptionHandle(state.next_subscription);
        state.next_subscription += 1;
        Ok(handle)
    }

    async fn remove_subscription(&mut self, _conn: ConnectionHandle, sub: SubscriptionHandle) -> ProtocolResult<()> {
        self.state.lock().calls.push(ProtocolCall::RemoveSubscription(sub));
        Ok(())
    }

    async fn add_monitored_item(
        &mut self,
        _conn: ConnectionHandle,
        _sub: SubscriptionHandle,
        address: &NodeAddress,
    ) -> ProtocolResult<ItemHandle> {
        let mut state = self.state.lock();
        state.calls.push(ProtocolCall::AddMonitoredItem(address.clone()));
        if let Some(&status) = state.item_failures.get(address) {
            return Err(ProtocolError::monitored_item(address.clone(), status));
        }
        let handle = ItemHandle(state.next_item);
        state.next_item += 1;
        state.items.push((handle, address.clone()));
        Ok(handle)
    }

    async fn remove_monitored_item(
        &mut self,
        _conn: ConnectionHandle,
        _sub: SubscriptionHandle,
        item: ItemHandle,
    ) -> ProtocolResult<()> {
        let mut state = self.state.lock();
        state.calls.push(ProtocolCall::RemoveMonitoredItem(item));
        state.items.retain(|(handle, _)| *handle != item);
        Ok(())
    }

    async fn for_each_child(
        &mut self,
        _conn: ConnectionHandle,
        address: &NodeAddress,
        visitor: &mut (dyn FnMut(ChildReference) + Send),
    ) -> ProtocolResult<()> {
        let children = {
            let mut state = self.state.lock();
            state.calls.push(ProtocolCall::Browse(address.clone()));
            if let Some(&status) = state.browse_failures.get(address) {
                return Err(ProtocolError::browse(address.clone(), status));
            }
            state.children.get(address).cloned().unwrap_or_default()
        };
        for child in children {
            visitor(child);
        }
        Ok(())
    }

    async fn pump(&mut self, _conn: ConnectionHandle, on_change: &mut (dyn FnMut(DataChange) + Send)) -> StatusCode {
        let (changes, status) = {
            let mut state = self.state.lock();
            state.calls.push(ProtocolCall::Pump);
            if !state.connected {
                return StatusCode::BAD_NOT_CONNECTED;
            }

            let mut changes = Vec::new();
            while let Some((address, value, timestamp)) = state.queued.pop_front() {
                for (handle, item_address) in &state.items {
                    if *item_address == address {
                        changes.push(DataChange::new(*handle, value.clone(), timestamp));
                    }
                }
            }
            (changes, state.pump_status)
        };

        for change in changes {
            on_change(change);
        }
        status
    }

    fn display_name(&self) -> &str {
        "mock"
    }
}

// =============================================================================
// Mock Protocol Factory
// =============================================================================

/// Hands out [`MockServer`] sessions by endpoint.
///
/// Endpoints without a registered server get a fresh empty one.
#[derive(Debug, Clone, Default)]
pub struct MockProtocolFactory {
    servers: Arc<Mutex<HashMap<String, MockServer>>>,
    created: Arc<Mutex<Vec<i32>>>,
}

impl MockProtocolFactory {
    /// Creates an empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `server` for `endpoint`.
    pub fn with_server(self, endpoint: impl Into<String>, server: MockServer) -> Self {
        self.servers.lock().insert(endpoint.into(), server);
        self
    }

    /// Returns the server registered for `endpoint`.
    pub fn server(&self, endpoint: &str) -> Option<MockServer> {
        self.servers.lock().get(endpoint).cloned()
    }

    /// Returns the ids of every server constructed so far, in order.
    pub fn created(&self) -> Vec<i32> {
        self.created.lock().clone()
    }

    /// Returns this factory as a shared trait object.
    pub fn shared(&self) -> Arc<dyn ProtocolFactory> {
        Arc::new(self.clone())
    }
}

impl ProtocolFactory for MockProtocolFactory {
    fn create(&self, config: &ServerConfig) -> Box<dyn SourceProtocol> {
        self.created.lock().push(config.server_id);
        let server = self
            .servers
            .lock()
            .entry(config.endpoint.clone())
            .or_default()
            .clone();
        server.protocol()
    }
}

// =============================================================================
// Recording Registry Transport
// =============================================================================

/// One request received by a [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: &'static str,
    /// Path, including any query string.
    pub path: String,
    /// Body of a POST or PUT.
    pub body: Option<Value>,
}

impl RecordedRequest {
    /// Renders as `METHOD path`.
    pub fn line(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Registry transport that records requests and serves canned documents.
///
/// A GET for a path without a canned document returns `null`, which reads
/// as "absent".
#[derive(Debug, Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<RecordedRequest>>,
    documents: Mutex<HashMap<String, Value>>,
    failing: Mutex<HashSet<String>>,
    closed: AtomicBool,
}

impl RecordingTransport {
    /// Creates a transport with no documents.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serves `document` for GET `path`.
    pub fn serve(&self, path: impl Into<String>, document: Value) {
        self.documents.lock().insert(path.into(), document);
    }

    /// Fails every request to `path` with HTTP 500.
    pub fn fail(&self, path: impl Into<String>) {
        self.failing.lock().insert(path.into());
    }

    /// Returns every request received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Returns every request as `METHOD path`.
    pub fn lines(&self) -> Vec<String> {
        self.requests.lock().iter().map(RecordedRequest::line).collect()
    }

    /// Returns the bodies posted to `path`, in order.
    pub fn posted(&self, path: &str) -> Vec<Value> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == "POST" && r.path == path)
            .filter_map(|r| r.body.clone())
            .collect()
    }

    /// Returns `true` once the transport has been released.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Returns a [`RegistrySync`] over this transport.
    pub fn sync(self: &Arc<Self>) -> RegistrySync {
        RegistrySync::new(self.clone())
    }

    fn record(&self, method: &'static str, path: &str, body: Option<&Value>) -> RegistryResult<()> {
        self.requests.lock().push(RecordedRequest {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });
        if self.failing.lock().contains(path) {
            return Err(RegistryError::status(method, path, 500));
        }
        Ok(())
    }
}

#[async_trait]
impl RegistryTransport for RecordingTransport {
    async fn get(&self, path: &str) -> RegistryResult<Value> {
        self.record("GET", path, None)?;
        Ok(self.documents.lock().get(path).cloned().unwrap_or(Value::Null))
    }

    async fn post(&self, path: &str, body: &Value) -> RegistryResult<Value> {
        self.record("POST", path, Some(body))?;
        Ok(Value::Null)
    }

    async fn put(&self, path: &str, body: &Value) -> RegistryResult<Value> {
        self.record("PUT", path, Some(body))?;
        Ok(Value::Null)
    }

    async fn close(&self) -> RegistryResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
