//! Connector Framework traits
//!
//! Capability-based trait definitions for connectors, inspired by `ConnId`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ConnectorError, ConnectorResult};
use crate::ids::ResourceId;
use crate::operation::{AttributeDelta, AttributeSet, ConnectorObject, Filter, Uid};
use crate::schema::ObjectClass;
use crate::types::ShadowKind;

/// Base trait for all connectors.
///
/// This trait provides common functionality that all connectors must implement,
/// regardless of their specific capabilities.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Get the display name for this connector instance.
    fn display_name(&self) -> &str;

    /// Test the connection to the target system.
    ///
    /// Returns `Ok(())` if the connection is successful, or an error describing
    /// what went wrong.
    async fn test_connection(&self) -> ConnectorResult<()>;
}

/// Capability for discovering the schema of a target system.
#[async_trait]
pub trait SchemaDiscovery: Connector {
    /// Discover all object classes of the target system.
    async fn discover_schema(&self) -> ConnectorResult<Vec<ObjectClass>>;

    /// Get a single object class by name.
    async fn object_class(&self, name: &str) -> ConnectorResult<ObjectClass> {
        self.discover_schema()
            .await?
            .into_iter()
            .find(|oc| oc.name == name)
            .ok_or_else(|| ConnectorError::UnknownObjectClass {
                object_class: name.to_string(),
            })
    }
}

/// Capability for creating objects in the target system.
#[async_trait]
pub trait CreateOp: Connector {
    /// Create a new object in the target system.
    ///
    /// # Arguments
    /// * `object_class` - The type of object to create (e.g., "account", "group")
    /// * `attributes` - The attributes for the new object
    ///
    /// # Returns
    /// The unique identifier (UID) of the created object in the target system.
    async fn create(&self, object_class: &str, attributes: AttributeSet) -> ConnectorResult<Uid>;
}

/// Capability for updating objects in the target system.
#[async_trait]
pub trait UpdateOp: Connector {
    /// Update an existing object in the target system.
    ///
    /// Returns the UID of the updated object (may change for some systems).
    async fn update(
        &self,
        object_class: &str,
        uid: &Uid,
        changes: AttributeDelta,
    ) -> ConnectorResult<Uid>;
}

/// Capability for deleting objects from the target system.
#[async_trait]
pub trait DeleteOp: Connector {
    /// Delete an object from the target system.
    async fn delete(&self, object_class: &str, uid: &Uid) -> ConnectorResult<()>;
}

/// Capability for searching objects in the target system.
#[async_trait]
pub trait SearchOp: Connector {
    /// Search for objects of a class, optionally narrowed by a filter.
    async fn search(
        &self,
        object_class: &str,
        filter: Option<Filter>,
    ) -> ConnectorResult<Vec<ConnectorObject>>;

    /// Get a single object by its UID.
    ///
    /// This is a convenience method that searches for a specific object.
    async fn get(&self, object_class: &str, uid: &Uid) -> ConnectorResult<Option<ConnectorObject>> {
        let filter = Filter::eq(uid.attribute_name(), uid.value());
        let objects = self.search(object_class, Some(filter)).await?;
        Ok(objects.into_iter().next())
    }
}

/// A connector bundle with full CRUD and schema capabilities.
pub trait FullConnector:
    Connector + CreateOp + UpdateOp + DeleteOp + SearchOp + SchemaDiscovery + Send + Sync
{
}

impl<T> FullConnector for T where
    T: Connector + CreateOp + UpdateOp + DeleteOp + SearchOp + SchemaDiscovery + Send + Sync
{
}

/// Provider resolving resources to connector instances.
#[async_trait]
pub trait ConnectorProvider: Send + Sync {
    /// Get the connector configured for a resource.
    async fn get_connector(&self, resource_id: ResourceId) -> Option<Arc<dyn FullConnector>>;

    /// Resolve the object class used for a kind/intent on a resource.
    ///
    /// Defaults to the kind name for every intent.
    async fn object_class(
        &self,
        resource_id: ResourceId,
        kind: ShadowKind,
        intent: &str,
    ) -> Option<String> {
        let _ = (resource_id, intent);
        Some(kind.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MockConnector {
        name: String,
        healthy: Arc<AtomicBool>,
    }

    impl MockConnector {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                healthy: Arc::new(AtomicBool::new(true)),
            }
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        fn display_name(&self) -> &str {
            &self.name
        }

        async fn test_connection(&self) -> ConnectorResult<()> {
            if self.healthy.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(ConnectorError::unreachable("not healthy"))
            }
        }
    }

    #[async_trait]
    impl SchemaDiscovery for MockConnector {
        async fn discover_schema(&self) -> ConnectorResult<Vec<ObjectClass>> {
            Ok(vec![ObjectClass::new("account")])
        }
    }

    #[async_trait]
    impl SearchOp for MockConnector {
        async fn search(
            &self,
            object_class: &str,
            filter: Option<Filter>,
        ) -> ConnectorResult<Vec<ConnectorObject>> {
            let object = ConnectorObject {
                uid: Uid::from_value("jack"),
                object_class: object_class.to_string(),
                attributes: AttributeSet::new().with("uid", "jack"),
            };
            Ok(vec![object]
                .into_iter()
                .filter(|o| filter.as_ref().map_or(true, |f| f.matches(&o.attributes)))
                .collect())
        }
    }

    #[tokio::test]
    async fn test_mock_connector() {
        let connector = MockConnector::new("test");
        assert_eq!(connector.display_name(), "test");
        assert!(connector.test_connection().await.is_ok());

        connector.healthy.store(false, Ordering::SeqCst);
        assert!(connector.test_connection().await.is_err());
    }

    #[tokio::test]
    async fn test_default_object_class_lookup() {
        let connector = MockConnector::new("test");
        assert!(connector.object_class("account").await.is_ok());
        let err = connector.object_class("group").await.unwrap_err();
        assert_eq!(err.error_code(), "OBJECT_CLASS_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_default_get_uses_search() {
        let connector = MockConnector::new("test");
        let found = connector
            .get("account", &Uid::from_value("jack"))
            .await
            .unwrap();
        assert!(found.is_some());

        let missing = connector
            .get("account", &Uid::from_value("will"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
