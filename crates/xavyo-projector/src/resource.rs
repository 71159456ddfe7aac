//! Resource layer backed by `xavyo-connector` connectors, and the context
//! loader that refreshes projections through it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};
use xavyo_connector::{
    AttributeDelta, AttributeSet, ConnectorObject, ConnectorProvider, Filter, FullConnector, Uid,
};

use crate::collaborators::{ContextLoader, ObjectStore, ResourceLayer};
use crate::context::{ProjectionState, SyncContext, SyncDecision};
use crate::definition::ResourceObjectDefinition;
use crate::delta::{ItemDelta, ObjectSnapshot, ObjectType, ShadowCoordinates};
use crate::error::{ProjectorError, ProjectorResult};
use crate::shadow::{SyncSituation, SITUATION_ITEM};

/// Default attribute holding the account identifier.
pub const DEFAULT_UID_ATTRIBUTE: &str = "uid";

/// [`ResourceLayer`] talking to connectors. The shadow oid is the connector uid value.
pub struct ConnectorResourceLayer {
    provider: Arc<dyn ConnectorProvider>,
    uid_attribute: String,
}

impl ConnectorResourceLayer {
    pub fn new(provider: Arc<dyn ConnectorProvider>) -> Self {
        Self {
            provider,
            uid_attribute: DEFAULT_UID_ATTRIBUTE.to_string(),
        }
    }

    #[must_use]
    pub fn with_uid_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.uid_attribute = attribute.into();
        self
    }

    async fn target(
        &self,
        coordinates: &ShadowCoordinates,
    ) -> ProjectorResult<(Arc<dyn FullConnector>, String)> {
        let connector = self
            .provider
            .get_connector(coordinates.resource_id)
            .await
            .ok_or_else(|| ProjectorError::not_found("resource", coordinates.resource_id.to_string()))?;
        let object_class = self
            .provider
            .object_class(coordinates.resource_id, coordinates.kind, &coordinates.intent)
            .await
            .ok_or_else(|| {
                ProjectorError::schema(format!("no object class defined for {coordinates}"))
            })?;
        Ok((connector, object_class))
    }

    fn uid(&self, oid: &str) -> Uid {
        Uid::new(self.uid_attribute.clone(), oid)
    }

    fn to_snapshot(coordinates: &ShadowCoordinates, object: ConnectorObject) -> ObjectSnapshot {
        let mut snapshot = ObjectSnapshot::shadow(coordinates.clone()).with_oid(object.uid.value());
        for (name, values) in object.attributes.into_map() {
            snapshot.set_values(name, values);
        }
        snapshot
    }
}

/// Convert item changes into a connector attribute delta.
pub fn to_attribute_delta(modifications: &[ItemDelta]) -> AttributeDelta {
    let mut delta = AttributeDelta::new();
    for item in modifications {
        if let Some(values) = &item.values_to_replace {
            delta.replace_values(item.name.clone(), values.clone());
            continue;
        }
        if !item.values_to_add.is_empty() {
            delta.add_values(item.name.clone(), item.values_to_add.clone());
        }
        if !item.values_to_delete.is_empty() {
            delta.remove_values(item.name.clone(), item.values_to_delete.clone());
        }
    }
    delta
}

#[async_trait]
impl ResourceLayer for ConnectorResourceLayer {
    async fn get(&self, coordinates: &ShadowCoordinates, oid: &str) -> ProjectorResult<ObjectSnapshot> {
        let (connector, object_class) = self.target(coordinates).await?;
        let object = connector
            .get(&object_class, &self.uid(oid))
            .await?
            .ok_or_else(|| ProjectorError::not_found("shadow", oid))?;
        Ok(Self::to_snapshot(coordinates, object))
    }

    #[instrument(skip(self, object), fields(coordinates = tracing::field::Empty))]
    async fn add(&self, object: ObjectSnapshot) -> ProjectorResult<String> {
        let coordinates = object
            .coordinates
            .clone()
            .ok_or_else(|| ProjectorError::schema("shadow to add has no coordinates"))?;
        tracing::Span::current().record("coordinates", tracing::field::display(&coordinates));
        let (connector, object_class) = self.target(&coordinates).await?;
        let attributes: AttributeSet = object
            .items
            .into_iter()
            .filter(|(_, values)| !values.is_empty())
            .collect();
        let uid = connector.create(&object_class, attributes).await?;
        debug!(uid = %uid, "Created account");
        Ok(uid.value().to_string())
    }

    #[instrument(skip(self, coordinates, modifications), fields(coordinates = %coordinates))]
    async fn modify(
        &self,
        coordinates: &ShadowCoordinates,
        oid: &str,
        modifications: &[ItemDelta],
    ) -> ProjectorResult<String> {
        let delta = to_attribute_delta(modifications);
        if delta.is_empty() {
            return Ok(oid.to_string());
        }
        let (connector, object_class) = self.target(coordinates).await?;
        debug!(attributes = ?delta.affected_attributes(), "Updating account");
        let uid = connector.update(&object_class, &self.uid(oid), delta).await?;
        Ok(uid.value().to_string())
    }

    #[instrument(skip(self, coordinates), fields(coordinates = %coordinates))]
    async fn delete(&self, coordinates: &ShadowCoordinates, oid: &str) -> ProjectorResult<()> {
        let (connector, object_class) = self.target(coordinates).await?;
        connector.delete(&object_class, &self.uid(oid)).await?;
        Ok(())
    }

    async fn search(
        &self,
        coordinates: &ShadowCoordinates,
        filter: Option<Filter>,
    ) -> ProjectorResult<Vec<ObjectSnapshot>> {
        let (connector, object_class) = self.target(coordinates).await?;
        let objects = connector.search(&object_class, filter).await?;
        Ok(objects
            .into_iter()
            .map(|o| Self::to_snapshot(coordinates, o))
            .collect())
    }

    async fn apply_definition(
        &self,
        coordinates: &ShadowCoordinates,
    ) -> ProjectorResult<ResourceObjectDefinition> {
        let (connector, object_class) = self.target(coordinates).await?;
        let object_class = connector.object_class(&object_class).await?;
        Ok(ResourceObjectDefinition::from_object_class(&object_class))
    }
}

/// Loads the focus from the object store and projections from the resource layer.
pub struct ResourceContextLoader {
    store: Arc<dyn ObjectStore>,
    resources: Arc<dyn ResourceLayer>,
}

impl ResourceContextLoader {
    pub fn new(store: Arc<dyn ObjectStore>, resources: Arc<dyn ResourceLayer>) -> Self {
        Self { store, resources }
    }

    /// Read the synchronization situation from the shadow record, if there is one.
    async fn load_situation(&self, projection: &mut ProjectionState, oid: &str) {
        match self.store.get(ObjectType::Shadow, oid).await {
            Ok(record) => {
                projection.synchronization_situation = record
                    .values(SITUATION_ITEM)
                    .first()
                    .and_then(serde_json::Value::as_str)
                    .and_then(|s| s.parse::<SyncSituation>().ok());
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => {
                warn!(shadow = %oid, error = %err, "Cannot read shadow record");
            }
        }
    }
}

#[async_trait]
impl ContextLoader for ResourceContextLoader {
    async fn load(&self, ctx: &mut SyncContext) -> ProjectorResult<()> {
        if let Some(oid) = ctx.focus.oid().map(str::to_string) {
            let current = self.store.get(ctx.focus.object_type, &oid).await?;
            ctx.focus.object_current = Some(current);
        }
        for projection in &mut ctx.projections {
            self.ensure_loaded(projection).await?;
        }
        Ok(())
    }

    async fn ensure_loaded(&self, projection: &mut ProjectionState) -> ProjectorResult<()> {
        if projection.fresh || projection.is_broken() {
            return Ok(());
        }
        let coordinates = projection.coordinates();

        if projection.definition.is_none() {
            match self.resources.apply_definition(&coordinates).await {
                Ok(definition) => projection.definition = Some(definition),
                Err(err) => {
                    warn!(projection = %projection.discriminator, error = %err, "Cannot load object definition");
                    projection.mark_broken(err.to_string());
                    projection.fresh = true;
                    return Ok(());
                }
            }
        }

        let Some(oid) = projection.oid.clone() else {
            projection.full_shadow = false;
            projection.fresh = true;
            return Ok(());
        };

        match self.resources.get(&coordinates, &oid).await {
            Ok(object) => {
                projection.object_current = Some(object);
                projection.full_shadow = true;
                self.load_situation(projection, &oid).await;
            }
            Err(err) if err.is_not_found() => {
                debug!(projection = %projection.discriminator, oid = %oid, "Account is gone");
                projection.object_current = None;
                projection.full_shadow = false;
                projection.oid = None;
                if projection.sync_decision == SyncDecision::Keep {
                    projection.sync_decision = SyncDecision::Add;
                } else {
                    projection.discriminator.tombstone = true;
                }
            }
            Err(err) => {
                warn!(projection = %projection.discriminator, error = %err, "Cannot load account");
                projection.mark_broken(err.to_string());
            }
        }
        projection.fresh = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use serde_json::json;
    use xavyo_connector::{
        Connector, ConnectorError, ConnectorResult, CreateOp, DeleteOp, ObjectClass, ResourceId,
        SchemaAttribute, SchemaDiscovery, SearchOp, ShadowKind, UpdateOp,
    };

    #[derive(Default)]
    struct MemoryConnector {
        accounts: Mutex<BTreeMap<String, AttributeSet>>,
    }

    #[async_trait]
    impl Connector for MemoryConnector {
        fn display_name(&self) -> &str {
            "memory"
        }

        async fn test_connection(&self) -> ConnectorResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl SchemaDiscovery for MemoryConnector {
        async fn discover_schema(&self) -> ConnectorResult<Vec<ObjectClass>> {
            Ok(vec![ObjectClass::new("account")
                .with_attribute(SchemaAttribute::new("uid").as_primary_identifier())
                .with_attribute(SchemaAttribute::new("title"))
                .with_attribute(SchemaAttribute::new("groups").multi_valued())])
        }
    }

    #[async_trait]
    impl CreateOp for MemoryConnector {
        async fn create(&self, _object_class: &str, attributes: AttributeSet) -> ConnectorResult<Uid> {
            let uid = attributes
                .get_string("uid")
                .ok_or_else(|| ConnectorError::SchemaViolation {
                    attribute: "uid".to_string(),
                    message: "required".to_string(),
                })?
                .to_string();
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.contains_key(&uid) {
                return Err(ConnectorError::already_exists(uid));
            }
            accounts.insert(uid.clone(), attributes);
            Ok(Uid::from_value(uid))
        }
    }

    #[async_trait]
    impl UpdateOp for MemoryConnector {
        async fn update(
            &self,
            _object_class: &str,
            uid: &Uid,
            changes: AttributeDelta,
        ) -> ConnectorResult<Uid> {
            let mut accounts = self.accounts.lock().unwrap();
            let account = accounts
                .get_mut(uid.value())
                .ok_or_else(|| ConnectorError::not_found(uid.value()))?;
            for (name, values) in changes.replace {
                account.set(name, values);
            }
            for (name, values) in changes.add {
                let mut current = account.get(&name).map(<[_]>::to_vec).unwrap_or_default();
                current.extend(values);
                account.set(name, current);
            }
            for (name, values) in changes.remove {
                let mut current = account.get(&name).map(<[_]>::to_vec).unwrap_or_default();
                current.retain(|v| !values.contains(v));
                account.set(name, current);
            }
            Ok(uid.clone())
        }
    }

    #[async_trait]
    impl DeleteOp for MemoryConnector {
        async fn delete(&self, _object_class: &str, uid: &Uid) -> ConnectorResult<()> {
            self.accounts
                .lock()
                .unwrap()
                .remove(uid.value())
                .map(|_| ())
                .ok_or_else(|| ConnectorError::not_found(uid.value()))
        }
    }

    #[async_trait]
    impl SearchOp for MemoryConnector {
        async fn search(
            &self,
            object_class: &str,
            filter: Option<Filter>,
        ) -> ConnectorResult<Vec<ConnectorObject>> {
            let accounts = self.accounts.lock().unwrap();
            Ok(accounts
                .iter()
                .filter(|(_, attrs)| filter.as_ref().map_or(true, |f| f.matches(attrs)))
                .map(|(uid, attrs)| ConnectorObject {
                    uid: Uid::from_value(uid.clone()),
                    object_class: object_class.to_string(),
                    attributes: attrs.clone(),
                })
                .collect())
        }
    }

    struct SingleProvider {
        resource_id: ResourceId,
        connector: Arc<MemoryConnector>,
    }

    #[async_trait]
    impl ConnectorProvider for SingleProvider {
        async fn get_connector(&self, resource_id: ResourceId) -> Option<Arc<dyn FullConnector>> {
            (resource_id == self.resource_id)
                .then(|| self.connector.clone() as Arc<dyn FullConnector>)
        }

        async fn object_class(
            &self,
            _resource_id: ResourceId,
            _kind: ShadowKind,
            _intent: &str,
        ) -> Option<String> {
            Some("account".to_string())
        }
    }

    fn layer() -> (ConnectorResourceLayer, ShadowCoordinates) {
        let resource_id = ResourceId::new();
        let provider = SingleProvider {
            resource_id,
            connector: Arc::new(MemoryConnector::default()),
        };
        (
            ConnectorResourceLayer::new(Arc::new(provider)),
            ShadowCoordinates::new(resource_id, ShadowKind::Account, "default"),
        )
    }

    #[test]
    fn test_to_attribute_delta() {
        let delta = to_attribute_delta(&[
            ItemDelta::replace("title", vec![json!("Captain")]),
            ItemDelta::add("groups", vec![json!("crew")]),
            ItemDelta::delete("groups", vec![json!("brig")]),
        ]);
        assert_eq!(delta.replace["title"], vec![json!("Captain")]);
        assert_eq!(delta.add["groups"], vec![json!("crew")]);
        assert_eq!(delta.remove["groups"], vec![json!("brig")]);
    }

    #[test]
    fn test_uid_attribute() {
        let (layer, _) = layer();
        assert_eq!(layer.uid("jack").attribute_name(), DEFAULT_UID_ATTRIBUTE);

        let layer = layer.with_uid_attribute("entryUUID");
        let uid = layer.uid("6f1c");
        assert_eq!(uid.attribute_name(), "entryUUID");
        assert_eq!(uid.value(), "6f1c");
    }

    #[tokio::test]
    async fn test_account_lifecycle() {
        let (layer, coords) = layer();
        let account = ObjectSnapshot::shadow(coords.clone())
            .with_value("uid", "jack")
            .with_value("title", "Mate");
        let oid = layer.add(account.clone()).await.unwrap();
        assert_eq!(oid, "jack");

        let err = layer.add(account).await.unwrap_err();
        assert!(err.is_already_exists());

        layer
            .modify(&coords, &oid, &[ItemDelta::replace("title", vec![json!("Captain")])])
            .await
            .unwrap();
        let current = layer.get(&coords, &oid).await.unwrap();
        assert_eq!(current.values("title"), &[json!("Captain")]);
        assert_eq!(current.oid.as_deref(), Some("jack"));

        let found = layer
            .search(&coords, Some(Filter::eq("title", "Captain")))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        layer.delete(&coords, &oid).await.unwrap();
        assert!(layer.get(&coords, &oid).await.unwrap_err().is_not_found());
        assert!(layer.delete(&coords, &oid).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_definition_and_unknown_resource() {
        let (layer, coords) = layer();
        let definition = layer.apply_definition(&coords).await.unwrap();
        assert!(definition.attribute("groups").multi_valued);

        let other = ShadowCoordinates::new(ResourceId::new(), ShadowKind::Account, "default");
        let err = layer.get(&other, "jack").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
