//! Network resources: IP addresses, DNS records, ports and services.

use super::{Application, Persistent, Resource, ResourceBase, Validate};
use crate::context::Corral;
use crate::formats::{Encode, Fields, Record};
use crate::primitives::DEFAULT_DNS_TTL;
use crate::types::{
    CorralResult, DnsRecordType, IpAddressType, RelationType, ResourceType, TransportProtocol,
    ValidationError,
};
use std::net::IpAddr;
use std::sync::Arc;

// =============================================================================
// IP ADDRESS
// =============================================================================

/// An address assigned to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpAddress {
    pub base: ResourceBase,
    pub ip_type: IpAddressType,
    pub value: String,
}

impl IpAddress {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        ip_type: IpAddressType,
        description: Option<&str>,
    ) -> Self {
        Self {
            base: ResourceBase::new(ResourceType::IpAddress, name, description),
            ip_type,
            value: value.into(),
        }
    }

    pub fn make(
        corral: &Corral,
        name: &str,
        value: &str,
        ip_type: IpAddressType,
        description: Option<&str>,
    ) -> CorralResult<Arc<Persistent<Self>>> {
        corral.register(Self::new(name, value, ip_type, description))
    }
}

impl Validate for IpAddress {
    fn validate(&self) -> Result<(), ValidationError> {
        self.base.validate()?;
        if self.value.is_empty() {
            return Err(ValidationError::missing("_value"));
        }
        let family = match self.value.parse::<IpAddr>() {
            Ok(IpAddr::V4(_)) => IpAddressType::V4,
            Ok(IpAddr::V6(_)) => IpAddressType::V6,
            Err(e) => {
                return Err(ValidationError::Malformed {
                    field: "_value".to_string(),
                    reason: e.to_string(),
                });
            }
        };
        if family != self.ip_type {
            return Err(ValidationError::Malformed {
                field: "_value".to_string(),
                reason: format!("{} is not an {} address", self.value, self.ip_type),
            });
        }
        Ok(())
    }
}

impl Resource for IpAddress {
    const KIND: ResourceType = ResourceType::IpAddress;

    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn encode_fields(&self, record: &mut Record) {
        record.insert("_type".to_string(), self.ip_type.encode());
        record.insert("_value".to_string(), self.value.encode());
    }

    fn decode_fields(base: ResourceBase, fields: &Fields<'_>) -> Result<Self, ValidationError> {
        Ok(Self {
            base,
            ip_type: fields.required("_type")?,
            value: fields.required("_value")?,
        })
    }
}

impl Persistent<IpAddress> {
    /// Change the address. The family must still match.
    pub fn set_value(&self, value: &str) -> CorralResult<()> {
        self.update(|ip| ip.value = value.to_string())
    }

    pub fn set_type(&self, ip_type: IpAddressType) -> CorralResult<()> {
        self.update(|ip| ip.ip_type = ip_type)
    }

    /// Change address and family together.
    pub fn reassign(&self, value: &str, ip_type: IpAddressType) -> CorralResult<()> {
        self.update(|ip| {
            ip.value = value.to_string();
            ip.ip_type = ip_type;
        })
    }
}

// =============================================================================
// DNS RECORD
// =============================================================================

/// A DNS record pointing at a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    pub base: ResourceBase,
    pub record_type: DnsRecordType,
    pub value: String,
    /// Time to live, in seconds.
    pub ttl: u32,
}

impl DnsRecord {
    pub fn new(
        name: impl Into<String>,
        record_type: DnsRecordType,
        value: impl Into<String>,
        ttl: u32,
        description: Option<&str>,
    ) -> Self {
        Self {
            base: ResourceBase::new(ResourceType::DnsRecord, name, description),
            record_type,
            value: value.into(),
            ttl,
        }
    }

    pub fn make(
        corral: &Corral,
        name: &str,
        record_type: DnsRecordType,
        value: &str,
        ttl: Option<u32>,
        description: Option<&str>,
    ) -> CorralResult<Arc<Persistent<Self>>> {
        corral.register(Self::new(
            name,
            record_type,
            value,
            ttl.unwrap_or(DEFAULT_DNS_TTL),
            description,
        ))
    }
}

impl Validate for DnsRecord {
    fn validate(&self) -> Result<(), ValidationError> {
        self.base.validate()?;
        if self.value.is_empty() {
            return Err(ValidationError::missing("_value"));
        }
        Ok(())
    }
}

impl Resource for DnsRecord {
    const KIND: ResourceType = ResourceType::DnsRecord;

    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn encode_fields(&self, record: &mut Record) {
        record.insert("_type".to_string(), self.record_type.encode());
        record.insert("_value".to_string(), self.value.encode());
        record.insert("_ttl".to_string(), self.ttl.encode());
    }

    fn decode_fields(base: ResourceBase, fields: &Fields<'_>) -> Result<Self, ValidationError> {
        Ok(Self {
            base,
            record_type: fields.required("_type")?,
            value: fields.required("_value")?,
            ttl: fields.or("_ttl", DEFAULT_DNS_TTL)?,
        })
    }
}

impl Persistent<DnsRecord> {
    pub fn set_value(&self, value: &str) -> CorralResult<()> {
        self.update(|dns| dns.value = value.to_string())
    }

    pub fn set_type(&self, record_type: DnsRecordType) -> CorralResult<()> {
        self.update(|dns| dns.record_type = record_type)
    }

    pub fn set_ttl(&self, ttl: u32) -> CorralResult<()> {
        self.update(|dns| dns.ttl = ttl)
    }
}

// =============================================================================
// PORT
// =============================================================================

/// A port mapping exposed by a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub base: ResourceBase,
    pub internal: u16,
    pub external: u16,
    pub protocol: TransportProtocol,
}

impl Port {
    pub fn new(
        name: impl Into<String>,
        internal: u16,
        external: u16,
        protocol: TransportProtocol,
        description: Option<&str>,
    ) -> Self {
        Self {
            base: ResourceBase::new(ResourceType::Port, name, description),
            internal,
            external,
            protocol,
        }
    }

    pub fn make(
        corral: &Corral,
        name: &str,
        internal: u16,
        external: u16,
        protocol: TransportProtocol,
        description: Option<&str>,
    ) -> CorralResult<Arc<Persistent<Self>>> {
        corral.register(Self::new(name, internal, external, protocol, description))
    }
}

impl Validate for Port {
    fn validate(&self) -> Result<(), ValidationError> {
        self.base.validate()?;
        for (field, port) in [("_internal", self.internal), ("_external", self.external)] {
            if port == 0 {
                return Err(ValidationError::Malformed {
                    field: field.to_string(),
                    reason: "port 0 is reserved".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Resource for Port {
    const KIND: ResourceType = ResourceType::Port;

    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn encode_fields(&self, record: &mut Record) {
        record.insert("_internal".to_string(), self.internal.encode());
        record.insert("_external".to_string(), self.external.encode());
        record.insert("_protocol".to_string(), self.protocol.encode());
    }

    fn decode_fields(base: ResourceBase, fields: &Fields<'_>) -> Result<Self, ValidationError> {
        Ok(Self {
            base,
            internal: fields.required("_internal")?,
            external: fields.required("_external")?,
            protocol: fields.required("_protocol")?,
        })
    }
}

impl Persistent<Port> {
    pub fn set_internal(&self, internal: u16) -> CorralResult<()> {
        self.update(|port| port.internal = internal)
    }

    pub fn set_external(&self, external: u16) -> CorralResult<()> {
        self.update(|port| port.external = external)
    }

    pub fn set_protocol(&self, protocol: TransportProtocol) -> CorralResult<()> {
        self.update(|port| port.protocol = protocol)
    }
}

// =============================================================================
// SERVICE
// =============================================================================

plain_resource! {
    /// An application exposed on a port under a DNS name.
    Service => Service
}

impl Service {
    /// Register a service and link it to its application, port and DNS record.
    pub fn make(
        corral: &Corral,
        name: &str,
        application: &Persistent<Application>,
        port: &Persistent<Port>,
        dns: &Persistent<DnsRecord>,
        description: Option<&str>,
    ) -> CorralResult<Arc<Persistent<Self>>> {
        corral.register_with(Self::new(name, description), |service| {
            let relations = corral.relations();
            relations.create(&**service, RelationType::BelongsTo, application, None)?;
            relations.create(&**service, RelationType::BelongsTo, port, None)?;
            relations.create(&**service, RelationType::BelongsTo, dns, None)?;
            Ok(())
        })
    }
}

impl Persistent<Service> {
    pub fn application(
        &self,
        corral: &Corral,
    ) -> CorralResult<Option<Arc<Persistent<Application>>>> {
        Ok(corral
            .related(self.id(), RelationType::BelongsTo)?
            .into_iter()
            .next())
    }

    pub fn port(&self, corral: &Corral) -> CorralResult<Option<Arc<Persistent<Port>>>> {
        Ok(corral
            .related(self.id(), RelationType::BelongsTo)?
            .into_iter()
            .next())
    }

    pub fn dns(&self, corral: &Corral) -> CorralResult<Option<Arc<Persistent<DnsRecord>>>> {
        Ok(corral
            .related(self.id(), RelationType::BelongsTo)?
            .into_iter()
            .next())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::Encoded;
    use crate::relations::RelationFilter;
    use crate::types::CorralError;

    #[test]
    fn ip_family_must_match_value() {
        let ip = IpAddress::new("eth0", "fe80::1", IpAddressType::V4, None);
        let err = ip.validate().expect_err("family mismatch");
        assert_eq!(err.field(), "_value");

        assert!(IpAddress::new("eth0", "fe80::1", IpAddressType::V6, None).validate().is_ok());
        assert!(IpAddress::new("eth0", "not-an-ip", IpAddressType::V4, None).validate().is_err());
    }

    #[test]
    fn reassign_changes_both_fields_atomically() {
        let corral = Corral::in_memory().expect("context");
        let ip = IpAddress::make(&corral, "eth0", "10.0.0.1", IpAddressType::V4, None).expect("ip");

        assert!(ip.set_type(IpAddressType::V6).is_err());
        ip.reassign("fd00::1", IpAddressType::V6).expect("reassign");

        let state = ip.snapshot();
        assert_eq!(state.ip_type, IpAddressType::V6);
        assert_eq!(state.value, "fd00::1");
    }

    #[test]
    fn dns_ttl_defaults_when_absent() {
        let corral = Corral::in_memory().expect("context");
        let dns = DnsRecord::make(&corral, "www", DnsRecordType::Cname, "shop.example", None, None)
            .expect("dns");
        assert_eq!(dns.snapshot().ttl, 30);

        let mut record = dns.snapshot().to_record();
        record.remove("_ttl");
        let decoded = DnsRecord::from_record(&record, dns.id().clone()).expect("decode");
        assert_eq!(decoded.ttl, DEFAULT_DNS_TTL);
    }

    #[test]
    fn port_out_of_range_is_rejected_on_decode() {
        let corral = Corral::in_memory().expect("context");
        let mut fields = Record::new();
        fields.insert("_internal".to_string(), Encoded::Int(8080));
        fields.insert("_external".to_string(), Encoded::Int(70_000));
        fields.insert("_protocol".to_string(), Encoded::text("TCP"));

        let err = corral.create::<Port>("http", None, &fields).expect_err("range");
        assert!(matches!(
            err,
            CorralError::Validation(ValidationError::Malformed { ref field, .. }) if field == "_external"
        ));
    }

    #[test]
    fn port_setters_revalidate() {
        let corral = Corral::in_memory().expect("context");
        let port = Port::make(&corral, "http", 8080, 80, TransportProtocol::Tcp, None).expect("port");

        assert!(port.set_external(0).is_err());
        port.set_protocol(TransportProtocol::Udp).expect("protocol");
        assert_eq!(port.snapshot().external, 80);
        assert_eq!(port.snapshot().protocol, TransportProtocol::Udp);
    }

    #[test]
    fn service_factory_creates_three_edges() {
        let corral = Corral::in_memory().expect("context");
        let app = Application::make(&corral, "shop", None).expect("app");
        let port = Port::make(&corral, "http", 8080, 80, TransportProtocol::Tcp, None).expect("port");
        let dns = DnsRecord::make(&corral, "www", DnsRecordType::A, "10.0.0.9", Some(60), None)
            .expect("dns");

        let service = Service::make(&corral, "shop-web", &app, &port, &dns, None).expect("service");

        assert_eq!(corral.relations().count(&RelationFilter::any()).expect("count"), 3);
        assert_eq!(
            service.port(&corral).expect("port").map(|p| p.id().clone()),
            Some(port.id().clone())
        );
        assert_eq!(
            service.dns(&corral).expect("dns").map(|d| d.id().clone()),
            Some(dns.id().clone())
        );
        assert_eq!(
            service.application(&corral).expect("app").map(|a| a.id().clone()),
            Some(app.id().clone())
        );
        assert_eq!(app.services(&corral).expect("services").len(), 1);
    }
}
