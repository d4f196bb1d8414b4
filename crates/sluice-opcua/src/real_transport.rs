// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA Source Protocol built on the `opcua` crate.
//!
//! The `opcua` client publishes on its own session thread and reports data
//! changes through a callback. The callback only appends to a queue;
//! [`SourceProtocol::pump`] drains that queue on the gateway's task, so
//! notifications still reach the gateway exclusively from `update()`.
//!
//! ```text
//! opcua session thread            gateway task
//! ────────────────────            ────────────
//! DataChangeCallback ──push──►  VecDeque<DataChange> ──pump──► on_change
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use opcua::client::prelude::{
    AttributeId, BrowseDescription, BrowseDescriptionResultMask, BrowseDirection, Client, ClientBuilder,
    DataChangeCallback, ExtensionObject, IdentityToken, MessageSecurityMode, MonitoredItemCreateRequest,
    MonitoredItemService, MonitoringMode, MonitoringParameters, QualifiedName, ReadValueId, ReferenceTypeId,
    SecurityPolicy, Session, SessionCommand, SubscriptionService, TimestampsToReturn, UAString,
    UserTokenPolicy, ViewService,
};
use opcua::sync::RwLock as OpcUaRwLock;

use sluice_config::{ServerConfig, SubscriptionParams};
use sluice_core::{NodeAddress, NodeIdentifier, StatusCode, Variant};

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::{
    ChildReference, ConnectionHandle, DataChange, ItemHandle, ProtocolFactory, SourceProtocol, SubscriptionHandle,
};

const APPLICATION_NAME: &str = "Sluice Gateway";
const APPLICATION_URI: &str = "urn:sluice:gateway";
const SESSION_RETRY_LIMIT: i32 = 0;
const SESSION_TIMEOUT_MS: u32 = 60_000;
const SAMPLING_INTERVAL_MS: f64 = 0.0;
const QUEUE_SIZE: u32 = 10;

type ChangeQueue = Arc<Mutex<VecDeque<DataChange>>>;

// =============================================================================
// OpcUaProtocol
// =============================================================================

struct Connected {
    handle: ConnectionHandle,
    session: Arc<OpcUaRwLock<Session>>,
    stop: Option<tokio::sync::oneshot::Sender<SessionCommand>>,
}

/// Source Protocol backed by a real OPC UA client session.
pub struct OpcUaProtocol {
    client: Option<Client>,
    connected: Option<Connected>,
    next_connection: u32,
    next_item: u32,
    items: HashMap<ItemHandle, u32>,
    queue: ChangeQueue,
}

impl OpcUaProtocol {
    /// Creates an unconnected protocol.
    pub fn new() -> Self {
        Self {
            client: None,
            connected: None,
            next_connection: 1,
            next_item: 1,
            items: HashMap::new(),
            queue: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    async fn open(&mut self, endpoint: &str, identity: IdentityToken) -> ProtocolResult<ConnectionHandle> {
        let mut client = ClientBuilder::new()
            .application_name(APPLICATION_NAME)
            .application_uri(APPLICATION_URI)
            .session_retry_limit(SESSION_RETRY_LIMIT)
            .session_timeout(SESSION_TIMEOUT_MS)
            .trust_server_certs(true)
            .client()
            .ok_or_else(|| ProtocolError::connect(endpoint, StatusCode::BAD_UNEXPECTED_ERROR))?;

        let target = (
            endpoint,
            SecurityPolicy::None.to_str(),
            MessageSecurityMode::None,
            UserTokenPolicy::anonymous(),
        );
        let session = client
            .connect_to_endpoint(target, identity)
            .map_err(|status| ProtocolError::connect(endpoint, to_status(status)))?;

        let stop = Session::run_async(session.clone());

        let handle = ConnectionHandle(self.next_connection);
        self.next_connection += 1;
        self.client = Some(client);
        self.connected = Some(Connected {
            handle,
            session,
            stop: Some(stop),
        });

        info!(endpoint, connection = %handle, "OPC UA session open");
        Ok(handle)
    }

    fn allocate_item(&mut self) -> ItemHandle {
        let handle = ItemHandle(self.next_item);
        self.next_item += 1;
        handle
    }

    fn session(&self, conn: ConnectionHandle) -> ProtocolResult<Arc<OpcUaRwLock<Session>>> {
        match &self.connected {
            Some(c) if c.handle == conn => Ok(c.session.clone()),
            _ => Err(ProtocolError::NotConnected),
        }
    }
}

impl Default for OpcUaProtocol {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceProtocol for OpcUaProtocol {
    async fn connect(&mut self, endpoint: &str) -> ProtocolResult<ConnectionHandle> {
        self.open(endpoint, IdentityToken::Anonymous).await
    }

    async fn connect_with_credentials(
        &mut self,
        endpoint: &str,
        username: &str,
        password: &str,
    ) -> ProtocolResult<ConnectionHandle> {
        let identity = IdentityToken::UserName(username.to_string(), password.to_string());
        self.open(endpoint, identity).await
    }

    async fn disconnect(&mut self, conn: ConnectionHandle) -> ProtocolResult<()> {
        if !self.connected.as_ref().is_some_and(|c| c.handle == conn) {
            return Ok(());
        }
        let Some(mut connected) = self.connected.take() else {
            return Ok(());
        };

        if let Some(stop) = connected.stop.take() {
            let _ = stop.send(SessionCommand::Stop);
        }
        connected.session.read().disconnect();
        self.items.clear();
        self.queue.lock().clear();
        self.client = None;

        debug!(connection = %conn, "OPC UA session closed");
        Ok(())
    }

    async fn create_subscription(
        &mut self,
        conn: ConnectionHandle,
        params: &SubscriptionParams,
    ) -> ProtocolResult<SubscriptionHandle> {
        let session = self.session(conn)?;
        let queue = self.queue.clone();

        let callback = DataChangeCallback::new(move |changed| {
            let mut queue = queue.lock();
            for item in changed {
                let data = item.last_value();
                queue.push_back(DataChange {
                    item: ItemHandle(item.client_handle()),
                    value: data.value.as_ref().map(from_opcua_variant).unwrap_or(Variant::Null),
                    source_timestamp: data.source_timestamp.as_ref().map(|t| t.as_chrono()),
                    server_timestamp: data.server_timestamp.as_ref().map(|t| t.as_chrono()),
                });
            }
        });

        let id = session
            .read()
            .create_subscription(
                params.publishing_interval_ms,
                params.lifetime_count,
                params.max_keep_alive_count,
                params.max_notifications_per_publish,
                params.priority,
                params.publishing_enabled,
                callback,
            )
            .map_err(|status| ProtocolError::subscription(to_status(status)))?;

        Ok(SubscriptionHandle(id))
    }

    async fn remove_subscription(
        &mut self,
        conn: ConnectionHandle,
        sub: SubscriptionHandle,
    ) -> ProtocolResult<()> {
        let session = self.session(conn)?;
        let status = session
            .read()
            .delete_subscription(sub.0)
            .map_err(|status| ProtocolError::subscription(to_status(status)))?;
        if status.is_good() {
            Ok(())
        } else {
            Err(ProtocolError::subscription(to_status(status)))
        }
    }

    async fn add_monitored_item(
        &mut self,
        conn: ConnectionHandle,
        sub: SubscriptionHandle,
        address: &NodeAddress,
    ) -> ProtocolResult<ItemHandle> {
        let session = self.session(conn)?;
        let handle = self.allocate_item();

        let request = MonitoredItemCreateRequest {
            item_to_monitor: ReadValueId {
                node_id: to_opcua_node_id(address),
                attribute_id: AttributeId::Value as u32,
                index_range: UAString::null(),
                data_encoding: QualifiedName::null(),
            },
            monitoring_mode: MonitoringMode::Reporting,
            requested_parameters: MonitoringParameters {
                client_handle: handle.0,
                sampling_interval: SAMPLING_INTERVAL_MS,
                filter: ExtensionObject::null(),
                queue_size: QUEUE_SIZE,
                discard_oldest: true,
            },
        };

        let results = session
            .read()
            .create_monitored_items(sub.0, TimestampsToReturn::Both, &[request])
            .map_err(|status| ProtocolError::monitored_item(address.clone(), to_status(status)))?;

        let result = results
            .first()
            .ok_or_else(|| ProtocolError::monitored_item(address.clone(), StatusCode::BAD_UNEXPECTED_ERROR))?;
        if !result.status_code.is_good() {
            return Err(ProtocolError::monitored_item(
                address.clone(),
                to_status(result.status_code),
            ));
        }

        trace!(node = %address, item = %handle, server_item = result.monitored_item_id, "Monitored item added");
        self.items.insert(handle, result.monitored_item_id);
        Ok(handle)
    }

    async fn remove_monitored_item(
        &mut self,
        conn: ConnectionHandle,
        sub: SubscriptionHandle,
        item: ItemHandle,
    ) -> ProtocolResult<()> {
        let session = self.session(conn)?;
        let Some(server_item) = self.items.remove(&item) else {
            return Ok(());
        };

        let results = session
            .read()
            .delete_monitored_items(sub.0, &[server_item])
            .map_err(|status| ProtocolError::subscription(to_status(status)))?;
        match results.first() {
            Some(status) if !status.is_good() => Err(ProtocolError::subscription(to_status(*status))),
            _ => Ok(()),
        }
    }

    async fn for_each_child(
        &mut self,
        conn: ConnectionHandle,
        address: &NodeAddress,
        visitor: &mut (dyn FnMut(ChildReference) + Send),
    ) -> ProtocolResult<()> {
        let session = self.session(conn)?;

        let description = BrowseDescription {
            node_id: to_opcua_node_id(address),
            browse_direction: BrowseDirection::Both,
            reference_type_id: ReferenceTypeId::HierarchicalReferences.into(),
            include_subtypes: true,
            node_class_mask: 0,
            result_mask: BrowseDescriptionResultMask::all().bits(),
        };

        let results = session
            .read()
            .browse(&[description])
            .map_err(|status| ProtocolError::browse(address.clone(), to_status(status)))?
            .unwrap_or_default();

        let Some(result) = results.into_iter().next() else {
            return Ok(());
        };
        if !result.status_code.is_good() {
            return Err(ProtocolError::browse(address.clone(), to_status(result.status_code)));
        }

        for reference in result.references.unwrap_or_default() {
            visitor(ChildReference {
                address: from_opcua_node_id(&reference.node_id.node_id),
                is_forward: reference.is_forward,
            });
        }
        Ok(())
    }

    async fn pump(
        &mut self,
        conn: ConnectionHandle,
        on_change: &mut (dyn FnMut(DataChange) + Send),
    ) -> StatusCode {
        let session = match self.session(conn) {
            Ok(session) => session,
            Err(err) => return err.status(),
        };

        let mut queue = self.queue.lock();
        while let Some(change) = queue.pop_front() {
            on_change(change);
        }
        drop(queue);

        if session.read().is_connected() {
            StatusCode::GOOD
        } else {
            warn!(connection = %conn, "OPC UA session lost");
            StatusCode::BAD_CONNECTION_CLOSED
        }
    }

    fn display_name(&self) -> &str {
        "opcua"
    }
}

/// Builds an [`OpcUaProtocol`] per server.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpcUaProtocolFactory;

impl ProtocolFactory for OpcUaProtocolFactory {
    fn create(&self, _config: &ServerConfig) -> Box<dyn SourceProtocol> {
        Box::new(OpcUaProtocol::new())
    }
}

// =============================================================================
// Conversions
// =============================================================================

fn to_status(status: opcua::types::StatusCode) -> StatusCode {
    StatusCode::from_bits(status.bits())
}

fn to_opcua_node_id(address: &NodeAddress) -> opcua::types::NodeId {
    let ns = address.namespace_index;
    match &address.identifier {
        NodeIdentifier::Numeric(v) => opcua::types::NodeId::new(ns, *v),
        NodeIdentifier::String(v) => opcua::types::NodeId::new(ns, v.clone()),
        NodeIdentifier::Guid(v) => opcua::types::NodeId::new(ns, opcua::types::Guid::from(*v)),
        NodeIdentifier::Opaque(v) => opcua::types::NodeId::new(ns, opcua::types::ByteString::from(v.as_slice())),
    }
}

fn from_opcua_node_id(node_id: &opcua::types::NodeId) -> NodeAddress {
    let ns = node_id.namespace;
    match &node_id.identifier {
        opcua::types::Identifier::Numeric(v) => NodeAddress::numeric(ns, *v),
        opcua::types::Identifier::String(v) => NodeAddress::string(ns, v.as_ref()),
        opcua::types::Identifier::Guid(v) => NodeAddress::guid(ns, uuid::Uuid::from_bytes(*v.as_bytes())),
        opcua::types::Identifier::ByteString(v) => NodeAddress::opaque(ns, v.value.clone().unwrap_or_default()),
    }
}

fn from_opcua_variant(variant: &opcua::types::Variant) -> Variant {
    use opcua::types::Variant as Ua;

    match variant {
        Ua::Empty => Variant::Null,
        Ua::Boolean(v) => Variant::Boolean(*v),
        Ua::SByte(v) => Variant::SByte(*v),
        Ua::Byte(v) => Variant::Byte(*v),
        Ua::Int16(v) => Variant::Int16(*v),
        Ua::UInt16(v) => Variant::UInt16(*v),
        Ua::Int32(v) => Variant::Int32(*v),
        Ua::UInt32(v) => Variant::UInt32(*v),
        Ua::Int64(v) => Variant::Int64(*v),
        Ua::UInt64(v) => Variant::UInt64(*v),
        Ua::Float(v) => Variant::Float(*v),
        Ua::Double(v) => Variant::Double(*v),
        Ua::String(v) => Variant::String(v.as_ref().to_string()),
        Ua::DateTime(v) => Variant::DateTime(v.as_chrono()),
        Ua::StatusCode(v) => Variant::StatusCode(to_status(*v)),
        Ua::Guid(v) => Variant::Guid(uuid::Uuid::from_bytes(*v.as_bytes())),
        Ua::ByteString(v) => Variant::ByteString(v.value.clone().unwrap_or_default()),
        Ua::Array(arr) => Variant::Array(arr.values.iter().map(from_opcua_variant).collect()),
        _ => Variant::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_conversion() {
        let address = NodeAddress::string(2, "Line1.Temp");
        assert_eq!(from_opcua_node_id(&to_opcua_node_id(&address)), address);

        let address = NodeAddress::numeric(0, 85);
        assert_eq!(from_opcua_node_id(&to_opcua_node_id(&address)), address);
    }

    #[test]
    fn test_variant_conversion() {
        use opcua::types::Variant as Ua;

        assert_eq!(from_opcua_variant(&Ua::Float(23.5)), Variant::Float(23.5));
        assert_eq!(from_opcua_variant(&Ua::Empty), Variant::Null);
        assert_eq!(
            from_opcua_variant(&Ua::String(UAString::from("on"))),
            Variant::String("on".into())
        );
    }

    #[test]
    fn test_item_handles_are_sequential() {
        let mut protocol = OpcUaProtocol::new();
        assert_eq!(protocol.allocate_item(), ItemHandle(1));
        assert_eq!(protocol.allocate_item(), ItemHandle(2));
    }

    #[tokio::test]
    async fn test_calls_before_connect() {
        let mut protocol = OpcUaProtocol::new();
        let err = protocol
            .create_subscription(ConnectionHandle(1), &SubscriptionParams::default())
            .await
            .unwrap_err();
        assert_eq!(err, ProtocolError::NotConnected);

        let mut seen = 0;
        let status = protocol.pump(ConnectionHandle(1), &mut |_: DataChange| seen += 1).await;
        assert_eq!(status, StatusCode::BAD_NOT_CONNECTED);
        assert_eq!(seen, 0);

        assert!(protocol.disconnect(ConnectionHandle(1)).await.is_ok());
    }
}
