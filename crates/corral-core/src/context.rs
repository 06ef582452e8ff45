//! # Corral Context
//!
//! The explicit context every operation hangs off: the store registry, the
//! knowledge base, the relations manager, the event log and the interrupt
//! latch. There is no process-global state; tests build as many isolated
//! contexts as they need.

use crate::config::StoreConfig;
use crate::critical::InterruptLatch;
use crate::events::EventLog;
use crate::formats::{Fields, Record};
use crate::knowledge::KnowledgeBase;
use crate::primitives::{EVENTS_DB, RESOURCES_DB};
use crate::relations::{RelationFilter, RelationsManager};
use crate::resource::{
    Application, Cluster, DnsRecord, IpAddress, LiveResource, Node, Persistent, Pod, Port,
    Request, Resource, ResourceBase, Service,
};
use crate::storage::{Database, Persistency, Session};
use crate::types::{CorralResult, RelationType, ResourceId, ResourceType};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of `Corral::load_all_from_disk`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Resources loaded, per kind.
    pub per_kind: BTreeMap<ResourceType, usize>,
    /// Rows skipped because they are disabled.
    pub skipped: usize,
    pub total: usize,
}

/// A resource persistence context.
#[derive(Debug)]
pub struct Corral {
    persistency: Persistency,
    resources: Arc<Database>,
    knowledge: KnowledgeBase,
    relations: RelationsManager,
    events: EventLog,
    interrupts: Arc<InterruptLatch>,
}

impl Corral {
    /// Build a context over the configured stores.
    ///
    /// Stores are opened lazily; fails only if the `resources` or `events`
    /// store is not configured.
    pub fn open(config: &StoreConfig) -> CorralResult<Self> {
        let interrupts = InterruptLatch::new();
        let persistency = Persistency::new(config, &interrupts);
        let resources = Arc::clone(persistency.database(RESOURCES_DB)?);
        let events = EventLog::new(Arc::clone(persistency.database(EVENTS_DB)?));
        debug!(
            resources = %resources.location(),
            stores = ?persistency.names().collect::<Vec<_>>(),
            "context created"
        );
        Ok(Self {
            relations: RelationsManager::new(Arc::clone(&resources)),
            knowledge: KnowledgeBase::new(),
            persistency,
            resources,
            events,
            interrupts,
        })
    }

    /// Context with every store in memory.
    pub fn in_memory() -> CorralResult<Self> {
        Self::open(&StoreConfig::in_memory())
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    #[must_use]
    pub fn relations(&self) -> &RelationsManager {
        &self.relations
    }

    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    #[must_use]
    pub fn persistency(&self) -> &Persistency {
        &self.persistency
    }

    /// The store holding resource tables and relations.
    #[must_use]
    pub fn resources(&self) -> &Arc<Database> {
        &self.resources
    }

    /// Latch deferring interrupts during store writes.
    #[must_use]
    pub fn interrupts(&self) -> &Arc<InterruptLatch> {
        &self.interrupts
    }

    /// Enter a session scope on the resources store.
    pub fn session(&self) -> CorralResult<Session<'_>> {
        self.resources.session()
    }

    /// Run `f` inside a session scope on the resources store.
    pub fn in_session<T>(
        &self,
        f: impl FnOnce(&Session<'_>) -> CorralResult<T>,
    ) -> CorralResult<T> {
        self.resources.in_session(f)
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    /// Validate, commit and index a resource.
    ///
    /// The row and its initial status events are written in one session;
    /// nothing is stored or indexed if validation or any write fails.
    pub fn register<R: Resource>(&self, resource: R) -> CorralResult<Arc<Persistent<R>>> {
        resource.validate()?;
        let history = resource.base().status.clone();
        let live = Arc::new(Persistent::new(
            resource,
            Arc::clone(&self.resources),
            self.events.clone(),
        ));
        self.in_session(|_| {
            live.commit()?;
            history
                .iter()
                .try_for_each(|status| self.events.record(live.id(), R::KIND, status))
        })?;
        self.knowledge.set(live.id().clone(), live.clone());
        Ok(live)
    }

    /// Register a resource and link it to others inside one session.
    ///
    /// If `link` fails the batch is rolled back and the resource is dropped
    /// from the knowledge base again.
    pub fn register_with<R: Resource>(
        &self,
        resource: R,
        link: impl FnOnce(&Arc<Persistent<R>>) -> CorralResult<()>,
    ) -> CorralResult<Arc<Persistent<R>>> {
        let mut registered = None;
        let outcome = self.in_session(|_| {
            let live = self.register(resource)?;
            registered = Some(live.id().clone());
            link(&live)?;
            Ok(live)
        });
        if let (Err(_), Some(id)) = (&outcome, registered) {
            self.knowledge.remove(&id);
        }
        outcome
    }

    /// Build a resource of kind `R` from an untyped field record.
    ///
    /// `fields` holds the kind's own fields (`_value`, `_ttl`, ...). Every
    /// field goes through the same type checks as a payload being decoded.
    pub fn create<R: Resource>(
        &self,
        name: &str,
        description: Option<&str>,
        fields: &Record,
    ) -> CorralResult<Arc<Persistent<R>>> {
        let base = ResourceBase::new(R::KIND, name, description);
        let resource = R::decode_fields(base, &Fields::new(fields))?;
        self.register(resource)
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    /// Typed lookup in the knowledge base.
    pub fn get<R: Resource>(&self, id: &ResourceId) -> CorralResult<Arc<Persistent<R>>> {
        self.knowledge.get_as(id)
    }

    /// Untyped lookup in the knowledge base.
    pub fn lookup(&self, id: &ResourceId) -> CorralResult<Arc<dyn LiveResource>> {
        self.knowledge.get(id)
    }

    /// Destinations of kind `R` reached from `origin` through `relation`.
    pub fn related<R: Resource>(
        &self,
        origin: &ResourceId,
        relation: RelationType,
    ) -> CorralResult<Vec<Arc<Persistent<R>>>> {
        let filter = RelationFilter::any()
            .origin(origin.clone())
            .relation(relation)
            .destination_type(R::KIND);
        self.relations
            .get(&filter)?
            .iter()
            .map(|row| self.get::<R>(&row.destination))
            .collect()
    }

    /// Origins of kind `R` pointing at `destination` through `relation`.
    pub fn referrers<R: Resource>(
        &self,
        destination: &ResourceId,
        relation: RelationType,
    ) -> CorralResult<Vec<Arc<Persistent<R>>>> {
        let filter = RelationFilter::any()
            .destination(destination.clone())
            .relation(relation)
            .origin_type(R::KIND);
        self.relations
            .get(&filter)?
            .iter()
            .map(|row| self.get::<R>(&row.origin))
            .collect()
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Index every enabled row of every resource table.
    ///
    /// The relations table is not loaded; edges are queried on demand.
    pub fn load_all_from_disk(&self) -> CorralResult<LoadReport> {
        let mut report = LoadReport::default();
        for kind in ResourceType::ALL {
            let (loaded, skipped) = match kind {
                ResourceType::Cluster => self.load_kind::<Cluster>()?,
                ResourceType::Node => self.load_kind::<Node>()?,
                ResourceType::Pod => self.load_kind::<Pod>()?,
                ResourceType::Application => self.load_kind::<Application>()?,
                ResourceType::Service => self.load_kind::<Service>()?,
                ResourceType::IpAddress => self.load_kind::<IpAddress>()?,
                ResourceType::Port => self.load_kind::<Port>()?,
                ResourceType::DnsRecord => self.load_kind::<DnsRecord>()?,
                ResourceType::Request => self.load_kind::<Request>()?,
                ResourceType::Relation => continue,
            };
            info!(kind = %kind, count = loaded, "loaded resources");
            report.per_kind.insert(*kind, loaded);
            report.skipped += skipped;
            report.total += loaded;
        }
        info!(total = report.total, skipped = report.skipped, "loaded resources from disk");
        Ok(report)
    }

    fn load_kind<R: Resource>(&self) -> CorralResult<(usize, usize)> {
        let (mut loaded, mut skipped) = (0, 0);
        for row in self.resources.all(R::KIND.table())? {
            if !row.enabled {
                debug!(id = %row.id, "skipping disabled row");
                skipped += 1;
                continue;
            }
            let resource = R::deserialize(&row.value, Some(&row.id))?;
            let live = Arc::new(Persistent::new(
                resource,
                Arc::clone(&self.resources),
                self.events.clone(),
            ));
            self.knowledge.set(row.id, live);
            loaded += 1;
        }
        Ok((loaded, skipped))
    }

    /// Exclude a resource from future loads. The knowledge base is untouched.
    pub fn disable(&self, id: &ResourceId) -> CorralResult<bool> {
        let kind = self.lookup(id)?.kind();
        let changed = self.resources.set_enabled(kind.table(), id, false)?;
        self.resources.commit()?;
        Ok(changed)
    }

    /// Flush every live resource.
    pub fn shutdown(&self) -> CorralResult<()> {
        info!(resources = self.knowledge.len(), "shutting down");
        self.knowledge.shutdown()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::Encoded;
    use crate::types::{CorralError, ValidationError};

    #[test]
    fn missing_resources_store_is_reported() {
        let mut config = StoreConfig::in_memory();
        config.databases.retain(|name| name != RESOURCES_DB);
        let err = Corral::open(&config).expect_err("no resources store");
        assert!(matches!(err, CorralError::DatabaseNotFound(ref name) if name == RESOURCES_DB));
    }

    #[test]
    fn register_rejects_invalid_and_indexes_nothing() {
        let corral = Corral::in_memory().expect("context");
        let err = corral.register(Cluster::new("", None)).expect_err("invalid");
        assert!(err.is_validation());
        assert!(corral.knowledge().is_empty());
    }

    #[test]
    fn register_logs_initial_status() {
        let corral = Corral::in_memory().expect("context");
        let cluster = corral.register(Cluster::new("edge", None)).expect("register");
        let history = corral.events().history(cluster.id()).expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status.key, "created");
    }

    #[test]
    fn dynamic_create_type_checks_fields() {
        let corral = Corral::in_memory().expect("context");
        let mut fields = Record::new();
        fields.insert("_type".to_string(), Encoded::Int(4));
        fields.insert("_value".to_string(), Encoded::Int(10));

        let err = corral
            .create::<IpAddress>("eth0", None, &fields)
            .expect_err("mismatch");
        assert!(matches!(
            err,
            CorralError::Validation(ValidationError::TypeMismatch { ref field, .. }) if field == "_value"
        ));
        assert!(corral.knowledge().is_empty());
    }

    #[test]
    fn failed_link_unindexes_resource() {
        let corral = Corral::in_memory().expect("context");
        let err = corral
            .register_with(Cluster::new("edge", None), |_| {
                Err(CorralError::Storage("link failed".to_string()))
            })
            .expect_err("link failure");

        assert!(matches!(err, CorralError::Storage(_)));
        assert!(corral.knowledge().is_empty());
        assert!(corral.resources().all("clusters").expect("all").is_empty());
    }

    #[test]
    fn register_stores_nothing_when_event_store_is_unusable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").expect("write blocker");

        let mut config = StoreConfig::in_memory();
        config.overrides.insert(
            EVENTS_DB.to_string(),
            blocker.join("events.db").display().to_string(),
        );
        let corral = Corral::open(&config).expect("context");

        let err = corral
            .register(Cluster::new("edge", None))
            .expect_err("event store cannot open");
        assert!(matches!(err, CorralError::Io(_)));
        assert!(corral.knowledge().is_empty());
        assert!(corral.resources().all("clusters").expect("all").is_empty());
    }

    #[test]
    fn outer_session_reports_failed_inner_registration() {
        let corral = Corral::in_memory().expect("context");
        let outer = corral.session().expect("outer");
        Cluster::make(&corral, "edge", None).expect("cluster");
        corral
            .register_with(Cluster::new("core", None), |_| {
                Err(CorralError::Storage("link failed".to_string()))
            })
            .expect_err("link failure");

        let err = outer.close().expect_err("batch rolled back");
        assert!(matches!(err, CorralError::Storage(ref msg) if msg.contains("rolled back")));
        assert!(corral.resources().all("clusters").expect("all").is_empty());
        assert_eq!(corral.resources().commit_count(), 0);
    }

    #[test]
    fn disabled_rows_are_skipped_on_load() {
        let corral = Corral::in_memory().expect("context");
        let keep = corral.register(Cluster::new("keep", None)).expect("register");
        let gone = corral.register(Cluster::new("gone", None)).expect("register");
        assert!(corral.disable(gone.id()).expect("disable"));

        corral.knowledge().clear();
        let report = corral.load_all_from_disk().expect("load");

        assert_eq!(report.total, 1);
        assert_eq!(report.skipped, 1);
        assert!(corral.knowledge().contains(keep.id()));
        assert!(!corral.knowledge().contains(gone.id()));
    }
}
