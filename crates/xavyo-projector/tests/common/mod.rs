//! Integration test helpers for xavyo-projector.
//!
//! Provides an in-memory object store, a mock resource layer with call
//! counters and failure injection, and a small mapping evaluator.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;
use xavyo_connector::{Filter, ResourceId, ShadowKind};
use xavyo_projector::collaborators::{MappingBindings, MappingEvaluator, ObjectStore, ResourceLayer};
use xavyo_projector::{
    ChangeExecutor, Clockwork, DeltaSetTriple, Discriminator, ItemDelta, MappingSpec,
    MappingStrength, ObjectSnapshot, ObjectType, ProjectionState, Projector, ProjectorConfig,
    ProjectorError, ProjectorResult, ResourceContextLoader, ResourceObjectDefinition,
    ShadowCoordinates, SyncDecision,
};

static INIT: Once = Once::new();

/// Initialize logging for tests (once).
pub fn init_test_logging() {
    INIT.call_once(|| {
        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

fn apply(object: &mut ObjectSnapshot, modifications: &[ItemDelta]) {
    for delta in modifications {
        let mut values = object.values(&delta.name).to_vec();
        delta.apply_to(&mut values);
        object.set_values(delta.name.clone(), values);
    }
}

// =============================================================================
// Object store
// =============================================================================

/// Focus objects and shadow records kept in memory.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<(ObjectType, String), ObjectSnapshot>>,
    fail_writes: AtomicBool,
    pub modify_calls: AtomicUsize,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object as is. Panics without an oid.
    pub fn seed(&self, object: ObjectSnapshot) {
        let oid = object.oid.clone().expect("seeded object needs an oid");
        self.objects
            .lock()
            .unwrap()
            .insert((object.object_type, oid), object);
    }

    pub fn object(&self, object_type: ObjectType, oid: &str) -> Option<ObjectSnapshot> {
        self.objects
            .lock()
            .unwrap()
            .get(&(object_type, oid.to_string()))
            .cloned()
    }

    /// Make every write fail with a communication error.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    fn check_writable(&self) -> ProjectorResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ProjectorError::communication("repository is read-only"));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get(&self, object_type: ObjectType, oid: &str) -> ProjectorResult<ObjectSnapshot> {
        self.object(object_type, oid)
            .ok_or_else(|| ProjectorError::not_found(object_type.as_str(), oid))
    }

    async fn add(&self, mut object: ObjectSnapshot) -> ProjectorResult<String> {
        self.check_writable()?;
        let oid = object
            .oid
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut objects = self.objects.lock().unwrap();
        let key = (object.object_type, oid.clone());
        if objects.contains_key(&key) {
            return Err(ProjectorError::already_exists(oid));
        }
        object.oid = Some(oid.clone());
        objects.insert(key, object);
        Ok(oid)
    }

    async fn modify(
        &self,
        object_type: ObjectType,
        oid: &str,
        modifications: &[ItemDelta],
    ) -> ProjectorResult<()> {
        self.check_writable()?;
        self.modify_calls.fetch_add(1, Ordering::SeqCst);
        let mut objects = self.objects.lock().unwrap();
        let object = objects
            .get_mut(&(object_type, oid.to_string()))
            .ok_or_else(|| ProjectorError::not_found(object_type.as_str(), oid))?;
        apply(object, modifications);
        Ok(())
    }

    async fn delete(&self, object_type: ObjectType, oid: &str) -> ProjectorResult<()> {
        self.check_writable()?;
        self.objects
            .lock()
            .unwrap()
            .remove(&(object_type, oid.to_string()))
            .map(|_| ())
            .ok_or_else(|| ProjectorError::not_found(object_type.as_str(), oid))
    }
}

// =============================================================================
// Resource layer
// =============================================================================

/// Accounts kept in memory, keyed by resource and uid.
pub struct MockResourceLayer {
    accounts: Mutex<HashMap<(ResourceId, String), ObjectSnapshot>>,
    failing: Mutex<HashSet<ResourceId>>,
    apply_writes: AtomicBool,
    /// Write operations in call order, as `"<op> <resource>"`.
    pub calls: Mutex<Vec<String>>,
    pub add_calls: AtomicUsize,
    pub modify_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl Default for MockResourceLayer {
    fn default() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            apply_writes: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
            add_calls: AtomicUsize::new(0),
            modify_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }
}

impl MockResourceLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an account; its uid becomes the oid.
    pub fn seed(&self, coordinates: &ShadowCoordinates, uid: &str, items: &[(&str, Value)]) {
        let mut account = ObjectSnapshot::shadow(coordinates.clone())
            .with_oid(uid)
            .with_value("uid", uid);
        for (name, value) in items {
            account = account.with_value(*name, value.clone());
        }
        self.accounts
            .lock()
            .unwrap()
            .insert((coordinates.resource_id, uid.to_string()), account);
    }

    pub fn account(&self, resource_id: ResourceId, uid: &str) -> Option<ObjectSnapshot> {
        self.accounts
            .lock()
            .unwrap()
            .get(&(resource_id, uid.to_string()))
            .cloned()
    }

    /// Make every write to the resource fail.
    pub fn fail_resource(&self, resource_id: ResourceId) {
        self.failing.lock().unwrap().insert(resource_id);
    }

    /// Count writes without changing the stored accounts.
    pub fn freeze(&self) {
        self.apply_writes.store(false, Ordering::SeqCst);
    }

    pub fn adds(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    pub fn modifies(&self) -> usize {
        self.modify_calls.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &str, resource_id: ResourceId) -> ProjectorResult<()> {
        self.calls.lock().unwrap().push(format!("{op} {resource_id}"));
        if self.failing.lock().unwrap().contains(&resource_id) {
            return Err(ProjectorError::communication(format!(
                "resource {resource_id} is down"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceLayer for MockResourceLayer {
    async fn get(&self, coordinates: &ShadowCoordinates, oid: &str) -> ProjectorResult<ObjectSnapshot> {
        self.account(coordinates.resource_id, oid)
            .ok_or_else(|| ProjectorError::not_found("account", oid))
    }

    async fn add(&self, mut object: ObjectSnapshot) -> ProjectorResult<String> {
        let coordinates = object
            .coordinates
            .clone()
            .ok_or_else(|| ProjectorError::schema("account without coordinates"))?;
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        self.record("add", coordinates.resource_id)?;
        let uid = object
            .values("uid")
            .first()
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProjectorError::schema("account without uid"))?;
        let mut accounts = self.accounts.lock().unwrap();
        let key = (coordinates.resource_id, uid.clone());
        if accounts.contains_key(&key) {
            return Err(ProjectorError::already_exists(uid));
        }
        if self.apply_writes.load(Ordering::SeqCst) {
            object.oid = Some(uid.clone());
            accounts.insert(key, object);
        }
        Ok(uid)
    }

    async fn modify(
        &self,
        coordinates: &ShadowCoordinates,
        oid: &str,
        modifications: &[ItemDelta],
    ) -> ProjectorResult<String> {
        self.modify_calls.fetch_add(1, Ordering::SeqCst);
        self.record("modify", coordinates.resource_id)?;
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .get_mut(&(coordinates.resource_id, oid.to_string()))
            .ok_or_else(|| ProjectorError::not_found("account", oid))?;
        if self.apply_writes.load(Ordering::SeqCst) {
            apply(account, modifications);
        }
        Ok(oid.to_string())
    }

    async fn delete(&self, coordinates: &ShadowCoordinates, oid: &str) -> ProjectorResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.record("delete", coordinates.resource_id)?;
        let mut accounts = self.accounts.lock().unwrap();
        let key = (coordinates.resource_id, oid.to_string());
        if !accounts.contains_key(&key) {
            return Err(ProjectorError::not_found("account", oid));
        }
        if self.apply_writes.load(Ordering::SeqCst) {
            accounts.remove(&key);
        }
        Ok(())
    }

    async fn search(
        &self,
        coordinates: &ShadowCoordinates,
        _filter: Option<Filter>,
    ) -> ProjectorResult<Vec<ObjectSnapshot>> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .filter(|((resource_id, _), _)| *resource_id == coordinates.resource_id)
            .map(|(_, account)| account.clone())
            .collect())
    }

    async fn apply_definition(
        &self,
        _coordinates: &ShadowCoordinates,
    ) -> ProjectorResult<ResourceObjectDefinition> {
        Ok(ResourceObjectDefinition::new("account"))
    }
}

// =============================================================================
// Mapping evaluator
// =============================================================================

/// Understands two expression forms:
///
/// - `{"const": v}`: `v` (or each element of an array) in the zero set
/// - `{"source": "item", "iteration": true}`: old/new diff of a focus item,
///   optionally suffixed with the iteration token
pub struct StaticMappingEvaluator;

impl MappingEvaluator for StaticMappingEvaluator {
    fn evaluate(
        &self,
        mapping: &MappingSpec,
        bindings: &MappingBindings<'_>,
    ) -> ProjectorResult<DeltaSetTriple<Value>> {
        if let Some(value) = mapping.expression.get("const") {
            let mut triple = DeltaSetTriple::new();
            match value {
                Value::Array(values) => values.iter().cloned().for_each(|v| triple.add_to_zero_set(v)),
                value => triple.add_to_zero_set(value.clone()),
            }
            return Ok(triple);
        }

        let Some(source) = mapping.expression.get("source").and_then(Value::as_str) else {
            return Err(ProjectorError::expression(&mapping.name, "unsupported expression"));
        };
        let suffixed = mapping
            .expression
            .get("iteration")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let read = |object: Option<&ObjectSnapshot>| -> Vec<Value> {
            object
                .map(|o| o.values(source).to_vec())
                .unwrap_or_default()
                .into_iter()
                .map(|v| match (&v, suffixed) {
                    (Value::String(s), true) => json!(format!("{s}{}", bindings.iteration_token)),
                    _ => v,
                })
                .collect()
        };
        Ok(DeltaSetTriple::diff(
            &read(bindings.focus_old),
            &read(bindings.focus_new),
        ))
    }
}

// =============================================================================
// Builders
// =============================================================================

pub fn user(oid: &str, name: &str) -> ObjectSnapshot {
    ObjectSnapshot::new(ObjectType::User)
        .with_oid(oid)
        .with_value("name", name)
}

pub fn coordinates(resource_id: ResourceId) -> ShadowCoordinates {
    ShadowCoordinates::new(resource_id, ShadowKind::Account, "default")
}

pub fn projection(resource_id: ResourceId, decision: SyncDecision) -> ProjectionState {
    ProjectionState::new(
        Discriminator::new(resource_id, ShadowKind::Account, "default"),
        decision,
    )
}

/// Strong outbound `uid` mapping from the focus name, suffixed per iteration.
pub fn uid_mapping() -> MappingSpec {
    MappingSpec::new("uid-out", "uid", json!({"source": "name", "iteration": true}))
        .with_strength(MappingStrength::Strong)
}

pub fn title_mapping(title: &str) -> MappingSpec {
    MappingSpec::new("title-out", "title", json!({ "const": title }))
        .with_strength(MappingStrength::Strong)
}

/// Store, resource layer and a wired clockwork.
pub struct Harness {
    pub store: Arc<InMemoryObjectStore>,
    pub resources: Arc<MockResourceLayer>,
    pub projector: Arc<Projector>,
    pub clockwork: Clockwork,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ProjectorConfig::default())
    }

    pub fn with_config(config: ProjectorConfig) -> Self {
        Self::build(config, |projector| projector)
    }

    /// Harness whose projector is customised before it is wired.
    pub fn with_projector(configure: impl FnOnce(Projector) -> Projector) -> Self {
        Self::build(ProjectorConfig::default(), configure)
    }

    fn build(config: ProjectorConfig, configure: impl FnOnce(Projector) -> Projector) -> Self {
        init_test_logging();
        let store = Arc::new(InMemoryObjectStore::new());
        let resources = Arc::new(MockResourceLayer::new());
        let loader = Arc::new(ResourceContextLoader::new(store.clone(), resources.clone()));
        let projector = Arc::new(configure(
            Projector::new(loader, Arc::new(StaticMappingEvaluator)).with_config(config.clone()),
        ));
        let executor = Arc::new(ChangeExecutor::new(store.clone(), resources.clone()));
        let clockwork = Clockwork::new(projector.clone(), executor).with_config(config);
        Self {
            store,
            resources,
            projector,
            clockwork,
        }
    }
}
