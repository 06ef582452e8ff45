//! Compute resources: clusters, nodes, applications and pods.
//!
//! None of these kinds carries fields of its own; their structure lives in
//! the relations created by their factories:
//!
//! ```text
//! ip ──belongsto──▶ node ──belongsto──▶ cluster
//! pod ──belongsto──▶ node
//! pod ──belongsto──▶ application
//! ```

use super::{IpAddress, Persistent, Service};
use crate::context::Corral;
use crate::types::{CorralResult, RelationType};
use std::sync::Arc;

plain_resource! {
    /// A group of nodes.
    Cluster => Cluster
}

plain_resource! {
    /// A machine in a cluster.
    Node => Node
}

plain_resource! {
    /// A deployable unit, run by pods and exposed by services.
    Application => Application
}

plain_resource! {
    /// One running instance of an application on a node.
    Pod => Pod
}

// =============================================================================
// FACTORIES
// =============================================================================

impl Cluster {
    pub fn make(
        corral: &Corral,
        name: &str,
        description: Option<&str>,
    ) -> CorralResult<Arc<Persistent<Self>>> {
        corral.register(Self::new(name, description))
    }
}

impl Node {
    /// Register a node, attach `ip_addresses` to it and the node to `cluster`.
    pub fn make(
        corral: &Corral,
        name: &str,
        ip_addresses: &[Arc<Persistent<IpAddress>>],
        cluster: &Persistent<Cluster>,
        description: Option<&str>,
    ) -> CorralResult<Arc<Persistent<Self>>> {
        corral.register_with(Self::new(name, description), |node| {
            for ip in ip_addresses {
                corral
                    .relations()
                    .create(&**ip, RelationType::BelongsTo, &**node, None)?;
            }
            corral
                .relations()
                .create(&**node, RelationType::BelongsTo, cluster, None)?;
            Ok(())
        })
    }
}

impl Application {
    pub fn make(
        corral: &Corral,
        name: &str,
        description: Option<&str>,
    ) -> CorralResult<Arc<Persistent<Self>>> {
        corral.register(Self::new(name, description))
    }
}

impl Pod {
    /// Register a pod running `application` on `node`.
    pub fn make(
        corral: &Corral,
        name: &str,
        node: &Persistent<Node>,
        application: &Persistent<Application>,
        description: Option<&str>,
    ) -> CorralResult<Arc<Persistent<Self>>> {
        corral.register_with(Self::new(name, description), |pod| {
            let relations = corral.relations();
            relations.create(&**pod, RelationType::BelongsTo, node, None)?;
            relations.create(&**pod, RelationType::BelongsTo, application, None)?;
            Ok(())
        })
    }
}

// =============================================================================
// NAVIGATION
// =============================================================================

impl Persistent<Cluster> {
    pub fn nodes(&self, corral: &Corral) -> CorralResult<Vec<Arc<Persistent<Node>>>> {
        corral.referrers(self.id(), RelationType::BelongsTo)
    }
}

impl Persistent<Node> {
    pub fn cluster(&self, corral: &Corral) -> CorralResult<Option<Arc<Persistent<Cluster>>>> {
        Ok(corral
            .related(self.id(), RelationType::BelongsTo)?
            .into_iter()
            .next())
    }

    pub fn ip_addresses(&self, corral: &Corral) -> CorralResult<Vec<Arc<Persistent<IpAddress>>>> {
        corral.referrers(self.id(), RelationType::BelongsTo)
    }

    pub fn pods(&self, corral: &Corral) -> CorralResult<Vec<Arc<Persistent<Pod>>>> {
        corral.referrers(self.id(), RelationType::BelongsTo)
    }
}

impl Persistent<Pod> {
    pub fn node(&self, corral: &Corral) -> CorralResult<Option<Arc<Persistent<Node>>>> {
        Ok(corral
            .related(self.id(), RelationType::BelongsTo)?
            .into_iter()
            .next())
    }

    pub fn application(
        &self,
        corral: &Corral,
    ) -> CorralResult<Option<Arc<Persistent<Application>>>> {
        Ok(corral
            .related(self.id(), RelationType::BelongsTo)?
            .into_iter()
            .next())
    }
}

impl Persistent<Application> {
    pub fn pods(&self, corral: &Corral) -> CorralResult<Vec<Arc<Persistent<Pod>>>> {
        corral.referrers(self.id(), RelationType::BelongsTo)
    }

    pub fn services(&self, corral: &Corral) -> CorralResult<Vec<Arc<Persistent<Service>>>> {
        corral.referrers(self.id(), RelationType::BelongsTo)
    }
}
