//! # Connector Framework
//!
//! Resource-layer boundary for the synchronization engine.
//!
//! This crate provides the abstractions the projector uses to reach external
//! identity systems (LDAP, databases, REST APIs) without knowing how any of
//! them talk over the wire.
//!
//! ## Capabilities
//!
//! A connector implements only the operations its target supports:
//!
//! - [`Connector`]: identity and health check
//! - [`SchemaDiscovery`]: object classes, used to build item definitions
//! - [`CreateOp`], [`UpdateOp`], [`DeleteOp`]: account changes
//! - [`SearchOp`]: fetch an account by uid or filter
//!
//! The projector needs all of them together ([`FullConnector`]) and finds the
//! connector for a resource through a [`ConnectorProvider`].
//!
//! ## Example
//!
//! ```ignore
//! use xavyo_connector::prelude::*;
//!
//! let connector = provider.get_connector(resource_id).await
//!     .ok_or(ConnectorError::NoConnector { resource_id })?;
//!
//! let attrs = AttributeSet::new()
//!     .with("uid", "jack")
//!     .with("title", "Captain");
//! let uid = connector.create("account", attrs).await?;
//! ```
//!
//! ## Modules
//!
//! - [`ids`]: `ResourceId`
//! - [`types`]: `ShadowKind`
//! - [`error`]: connector failures and their classification
//! - [`traits`]: capability traits
//! - [`schema`]: `ObjectClass` and `SchemaAttribute`
//! - [`operation`]: uids, attribute sets, deltas and filters

pub mod error;
pub mod ids;
pub mod operation;
pub mod schema;
pub mod traits;
pub mod types;

pub use error::{ConnectorError, ConnectorResult};
pub use ids::ResourceId;
pub use operation::{AttributeDelta, AttributeSet, ConnectorObject, Filter, Uid};
pub use schema::{ObjectClass, SchemaAttribute};
pub use traits::{
    Connector, ConnectorProvider, CreateOp, DeleteOp, FullConnector, SchemaDiscovery, SearchOp,
    UpdateOp,
};
pub use types::ShadowKind;

/// Prelude module for convenient imports.
///
/// ```
/// use xavyo_connector::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{ConnectorError, ConnectorResult};
    pub use crate::ids::ResourceId;
    pub use crate::operation::{AttributeDelta, AttributeSet, ConnectorObject, Filter, Uid};
    pub use crate::schema::{ObjectClass, SchemaAttribute};
    pub use crate::traits::{
        Connector, ConnectorProvider, CreateOp, DeleteOp, FullConnector, SchemaDiscovery,
        SearchOp, UpdateOp,
    };
    pub use crate::types::ShadowKind;
}
