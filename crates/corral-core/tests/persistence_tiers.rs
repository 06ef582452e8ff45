//! # Persistence Tier Tests (T0-T4)
//!
//! If ANY tier fails, the store cannot be trusted.
//!
//! ## Tiers
//! - T0: Payload Round-Trip
//! - T1: Row Upsert
//! - T2: Relation Fan-Out
//! - T3: Validation & Lookup
//! - T4: Session Batching & Disk Reload

use corral_core::{
    Application, Cluster, Corral, CorralError, DnsRecord, DnsRecordType, Encoded, IpAddress,
    IpAddressType, Node, Pod, Port, Record, RelationFilter, RelationType, Relation, Request,
    Resource, ResourceId, ResourceStatus, ResourceType, Service, Status, StoreConfig,
    TransportProtocol, ValidationError,
};

fn roundtrip<R: Resource>(resource: &R) -> R {
    let bytes = resource.serialize().expect("serialize");
    R::deserialize(&bytes, Some(resource.id())).expect("deserialize")
}

fn maximal_status() -> Vec<ResourceStatus> {
    vec![
        ResourceStatus::created(),
        ResourceStatus::new("scheduled", Status::Failure)
            .with_description("no capacity")
            .with_reason(ResourceId::make(ResourceType::Node)),
        ResourceStatus::new("scheduled", Status::Unknown),
    ]
}

// =============================================================================
// TIER T0: PAYLOAD ROUND-TRIP
// =============================================================================

mod t0_payload_roundtrip {
    use super::*;

    /// T0.1: Kinds without own fields round-trip, minimal and maximal.
    #[test]
    fn plain_kinds_roundtrip() {
        let minimal = Cluster::new("c", None);
        assert_eq!(roundtrip(&minimal), minimal);

        let mut maximal = Pod::new("web-0", Some("canary pod"));
        maximal.base.status = maximal_status();
        assert_eq!(roundtrip(&maximal), maximal);

        for app in [Application::new("a", None), Application::new("b", Some("d"))] {
            assert_eq!(roundtrip(&app), app);
        }
        let node = Node::new("n", None);
        assert_eq!(roundtrip(&node), node);
        let service = Service::new("s", Some("svc"));
        assert_eq!(roundtrip(&service), service);
    }

    /// T0.2: Network kinds round-trip with every field set.
    #[test]
    fn network_kinds_roundtrip() {
        let ip = IpAddress::new("eth0", "2001:db8::1", IpAddressType::V6, Some("uplink"));
        assert_eq!(roundtrip(&ip), ip);

        let mut dns = DnsRecord::new("www", DnsRecordType::Aaaa, "2001:db8::1", 3600, None);
        dns.base.status = maximal_status();
        assert_eq!(roundtrip(&dns), dns);

        let port = Port::new("dns", 53, 5353, TransportProtocol::Udp, None);
        assert_eq!(roundtrip(&port), port);
    }

    /// T0.3: Containers inside payloads keep their kind.
    #[test]
    fn request_and_relation_roundtrip() {
        let mut fragment = Record::new();
        fragment.insert("hosts".to_string(), Encoded::List(vec![Encoded::text("a")]));
        fragment.insert("empty".to_string(), Encoded::Null);
        let request = Request::new("deploy", fragment, None);
        assert_eq!(roundtrip(&request), request);

        let mut value = Record::new();
        value.insert("weight".to_string(), Encoded::Int(-4));
        let relation = Relation::new(
            "edge",
            ResourceId::make(ResourceType::Pod),
            RelationType::BelongsTo,
            ResourceId::make(ResourceType::Node),
            Some(value),
            Some("placement"),
        );
        assert_eq!(roundtrip(&relation), relation);
    }

    /// T0.4: Serialization is canonical.
    #[test]
    fn equal_resources_give_equal_bytes() {
        let port = Port::new("http", 8080, 80, TransportProtocol::Tcp, None);
        let again = roundtrip(&port);
        assert_eq!(
            port.serialize().expect("first"),
            again.serialize().expect("second")
        );
    }
}

// =============================================================================
// TIER T1: ROW UPSERT
// =============================================================================

mod t1_row_upsert {
    use super::*;

    /// T1.1: Committing twice keeps exactly one row with the latest payload.
    #[test]
    fn commit_is_idempotent() {
        let corral = Corral::in_memory().expect("context");
        let app = Application::make(&corral, "shop", None).expect("app");

        app.commit().expect("second commit");
        app.set_description(Some("storefront")).expect("update");

        let rows = corral.resources().all("applications").expect("rows");
        assert_eq!(rows.len(), 1);
        let stored = Application::deserialize(&rows[0].value, Some(&rows[0].id)).expect("decode");
        assert_eq!(stored.base.description.as_deref(), Some("storefront"));
    }

    /// T1.2: Every kind lands in its own table.
    #[test]
    fn kinds_land_in_their_tables() {
        let corral = Corral::in_memory().expect("context");
        let port = Port::make(&corral, "http", 8080, 80, TransportProtocol::Tcp, None).expect("port");
        let dns = DnsRecord::make(&corral, "www", DnsRecordType::A, "10.1.1.1", None, None)
            .expect("dns");

        assert!(corral.resources().get("ports", port.id()).expect("get").is_some());
        assert!(corral.resources().get("dns_records", dns.id()).expect("get").is_some());
        assert!(corral.resources().get("ports", dns.id()).expect("get").is_none());
    }
}

// =============================================================================
// TIER T2: RELATION FAN-OUT
// =============================================================================

mod t2_relation_fanout {
    use super::*;
    use corral_core::Persistent;
    use std::sync::Arc;

    fn node_with_two_ips(corral: &Corral) -> (Arc<Persistent<Node>>, Arc<Persistent<Cluster>>) {
        let cluster = Cluster::make(corral, "edge", None).expect("cluster");
        let ips = vec![
            IpAddress::make(corral, "eth0", "10.0.0.1", IpAddressType::V4, None).expect("ip"),
            IpAddress::make(corral, "eth1", "10.0.0.2", IpAddressType::V4, None).expect("ip"),
        ];
        let node = Node::make(corral, "worker-1", &ips, &cluster, None).expect("node");
        (node, cluster)
    }

    /// T2.1: A node with two IPs and a cluster yields three edges.
    #[test]
    fn node_factory_yields_three_edges() {
        let corral = Corral::in_memory().expect("context");
        let (node, _) = node_with_two_ips(&corral);

        let all = corral.relations().get(&RelationFilter::any()).expect("rows");
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|r| r.relation == RelationType::BelongsTo));

        let into_node = corral
            .relations()
            .get(&RelationFilter::any().destination(node.id().clone()))
            .expect("rows");
        assert_eq!(into_node.len(), 2);
        assert!(into_node.iter().all(|r| r.origin_type == ResourceType::IpAddress));
    }

    /// T2.2: A pod adds two edges; re-asserting one adds none.
    #[test]
    fn pod_fanout_and_dedup() {
        let corral = Corral::in_memory().expect("context");
        let (node, cluster) = node_with_two_ips(&corral);
        let app = Application::make(&corral, "shop", None).expect("app");

        let pod = Pod::make(&corral, "shop-0", &node, &app, None).expect("pod");
        assert_eq!(corral.relations().count(&RelationFilter::any()).expect("count"), 5);

        let first = corral
            .relations()
            .get(&RelationFilter::any().origin(pod.id().clone()).destination(node.id().clone()))
            .expect("rows");
        let again = corral
            .relations()
            .create(&*pod, RelationType::BelongsTo, &*node, None)
            .expect("re-create");
        assert_eq!(corral.relations().count(&RelationFilter::any()).expect("count"), 5);
        assert_eq!(again.id, first[0].id);

        corral
            .relations()
            .create(&*pod, RelationType::BelongsTo, &*cluster, None)
            .expect("new edge");
        assert_eq!(corral.relations().count(&RelationFilter::any()).expect("count"), 6);
    }

    /// T2.3: Empty store has no edges.
    #[test]
    fn empty_store_has_no_edges() {
        let corral = Corral::in_memory().expect("context");
        assert!(corral.relations().get(&RelationFilter::any()).expect("rows").is_empty());
    }
}

// =============================================================================
// TIER T3: VALIDATION & LOOKUP
// =============================================================================

mod t3_validation_lookup {
    use super::*;

    /// T3.1: A field of the wrong type is rejected and nothing is indexed.
    #[test]
    fn type_mismatch_leaves_knowledge_base_unchanged() {
        let corral = Corral::in_memory().expect("context");
        Cluster::make(&corral, "edge", None).expect("cluster");
        let before = corral.knowledge().ids();

        let mut fields = Record::new();
        fields.insert("_type".to_string(), Encoded::Int(4));
        fields.insert("_value".to_string(), Encoded::Int(10));
        let err = corral
            .create::<IpAddress>("eth0", None, &fields)
            .expect_err("mismatch");

        assert!(matches!(
            err,
            CorralError::Validation(ValidationError::TypeMismatch { ref field, expected: "text", received: "int" })
                if field == "_value"
        ));
        assert_eq!(corral.knowledge().ids(), before);
    }

    /// T3.2: A missing required field is reported by name.
    #[test]
    fn missing_field_is_reported() {
        let corral = Corral::in_memory().expect("context");
        let mut fields = Record::new();
        fields.insert("_internal".to_string(), Encoded::Int(80));
        fields.insert("_protocol".to_string(), Encoded::text("TCP"));

        let err = corral.create::<Port>("http", None, &fields).expect_err("missing");
        assert!(matches!(
            err,
            CorralError::Validation(ValidationError::MissingField { ref field }) if field == "_external"
        ));
    }

    /// T3.3: Lookup of an unknown identifier fails with ResourceNotFound.
    #[test]
    fn unknown_id_is_not_found() {
        let corral = Corral::in_memory().expect("context");
        let id = ResourceId::make(ResourceType::Service);
        let err = corral.lookup(&id).expect_err("miss");
        assert!(matches!(err, CorralError::ResourceNotFound(ref raw) if raw == id.as_str()));
    }

    /// T3.4: Dynamic construction of a valid record is indexed.
    #[test]
    fn dynamic_create_registers() {
        let corral = Corral::in_memory().expect("context");
        let mut fields = Record::new();
        fields.insert("_type".to_string(), Encoded::text("CNAME"));
        fields.insert("_value".to_string(), Encoded::text("shop.example"));

        let dns = corral
            .create::<DnsRecord>("www", None, &fields)
            .expect("create");
        assert_eq!(dns.snapshot().ttl, 30);
        assert!(corral.get::<DnsRecord>(dns.id()).is_ok());
    }
}

// =============================================================================
// TIER T4: SESSION BATCHING & DISK RELOAD
// =============================================================================

mod t4_sessions_and_reload {
    use super::*;

    /// T4.1: Nested sessions issue exactly one physical commit at the outer exit.
    #[test]
    fn nested_sessions_commit_once() {
        let corral = Corral::in_memory().expect("context");
        let outer = corral.session().expect("outer");

        let cluster = Cluster::make(&corral, "edge", None).expect("cluster");
        let app = Application::make(&corral, "shop", None).expect("app");
        {
            let inner = corral.session().expect("inner");
            cluster.set_description(Some("rack 4")).expect("update");
            app.set_name("storefront").expect("rename");
            inner.close().expect("close inner");
        }
        assert_eq!(corral.resources().commit_count(), 0);

        outer.close().expect("close outer");
        assert_eq!(corral.resources().commit_count(), 1);
    }

    /// T4.2: A store on disk reloads every enabled resource into a fresh context.
    #[test]
    fn load_all_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = StoreConfig::under(dir.path());

        let (cluster_id, node_id) = {
            let corral = Corral::open(&config).expect("context");
            let cluster = Cluster::make(&corral, "edge", None).expect("cluster");
            let ip = IpAddress::make(&corral, "eth0", "10.0.0.1", IpAddressType::V4, None)
                .expect("ip");
            let node = Node::make(&corral, "worker-1", &[ip], &cluster, None).expect("node");
            node.push_status(ResourceStatus::new("ready", Status::Success))
                .expect("status");
            corral.shutdown().expect("shutdown");
            (cluster.id().clone(), node.id().clone())
        };

        let corral = Corral::open(&config).expect("reopen");
        let report = corral.load_all_from_disk().expect("load");

        assert_eq!(report.total, 3);
        assert_eq!(report.per_kind.get(&ResourceType::Node), Some(&1));
        assert!(!report.per_kind.contains_key(&ResourceType::Relation));

        let node = corral.get::<Node>(&node_id).expect("node");
        assert_eq!(node.latest_status().map(|s| s.key), Some("ready".to_string()));
        let cluster = node.cluster(&corral).expect("query").expect("linked");
        assert_eq!(cluster.id(), &cluster_id);
        assert_eq!(corral.events().history(&node_id).expect("history").len(), 2);
    }

    /// T4.3: Store files live under the schema version directory.
    #[test]
    fn store_path_carries_schema_version() {
        let dir = tempfile::tempdir().expect("tempdir");
        let corral = Corral::open(&StoreConfig::under(dir.path())).expect("context");
        corral.persistency().open_all().expect("open");

        assert!(dir.path().join("databases/v1.0/resources.db").exists());
        assert!(dir.path().join("databases/v1.0/events.db").exists());
    }
}
