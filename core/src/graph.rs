use crate::config::StackConfig;
use crate::error::{GraphError, Result};
use crate::image::ImageReference;
use crate::target::DeploymentTarget;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub const STACK_NAME: &str = "CdkAppStack";
pub const NETWORK_ID: &str = "TestAppVPC";
pub const CLUSTER_ID: &str = "TestAppCluster";
pub const SERVICE_ID: &str = "TestAppService";

/// Identifier of a node, unique within a graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: &str) -> Self {
        ResourceId(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Isolated network space, the root of the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: ResourceId,
    pub max_azs: u32,
}

/// Compute pool the service runs in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ResourceId,
    pub name: String,
    pub network: ResourceId,
}

/// Containerized, replicated service behind a load balancer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub id: ResourceId,
    pub cluster: ResourceId,
    pub image: ImageReference,
    pub cpu: u32,
    pub memory_mib: u32,
    pub desired_count: u32,
    pub container_port: u16,
    pub public_load_balancer: bool,
}

/// Borrowed view of any node of the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node<'a> {
    Network(&'a Network),
    Cluster(&'a Cluster),
    Service(&'a ServiceDescriptor),
}

impl<'a> Node<'a> {
    pub fn id(&self) -> &'a ResourceId {
        match *self {
            Node::Network(network) => &network.id,
            Node::Cluster(cluster) => &cluster.id,
            Node::Service(service) => &service.id,
        }
    }

    /// The node this one is bound to, none for the root
    pub fn parent(&self) -> Option<&'a ResourceId> {
        match *self {
            Node::Network(_) => None,
            Node::Cluster(cluster) => Some(&cluster.network),
            Node::Service(service) => Some(&service.cluster),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Node::Network(_) => "network",
            Node::Cluster(_) => "cluster",
            Node::Service(_) => "service",
        }
    }
}

/// Declared resources of one stack, handed to the provisioning engine as a whole
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGraph {
    pub stack_name: String,
    pub target: DeploymentTarget,
    pub network: Network,
    pub cluster: Cluster,
    pub service: ServiceDescriptor,
}

impl ResourceGraph {
    /// All nodes, parents before children
    pub fn nodes(&self) -> Vec<Node<'_>> {
        vec![
            Node::Network(&self.network),
            Node::Cluster(&self.cluster),
            Node::Service(&self.service),
        ]
    }

    pub fn node(&self, id: &ResourceId) -> Option<Node<'_>> {
        self.nodes().into_iter().find(|node| node.id() == id)
    }

    pub fn children(&self, id: &ResourceId) -> Vec<Node<'_>> {
        self.nodes()
            .into_iter()
            .filter(|node| node.parent() == Some(id))
            .collect()
    }

    /// Check that ids are unique and every reference points at the right kind of node
    pub fn validate(&self) -> Result<()> {
        let nodes = self.nodes();

        for (i, node) in nodes.iter().enumerate() {
            if nodes[..i].iter().any(|other| other.id() == node.id()) {
                return Err(GraphError::configuration(format!(
                    "Duplicate resource id {}",
                    node.id()
                )));
            }
        }

        match self.node(&self.cluster.network) {
            Some(Node::Network(_)) => {}
            _ => {
                return Err(GraphError::configuration(format!(
                    "Cluster {} references unknown network {}",
                    self.cluster.id, self.cluster.network
                )))
            }
        }

        match self.node(&self.service.cluster) {
            Some(Node::Cluster(_)) => {}
            _ => {
                return Err(GraphError::configuration(format!(
                    "Service {} references unknown cluster {}",
                    self.service.id, self.service.cluster
                )))
            }
        }

        Ok(())
    }
}

/// Build the graph of the reference deployment for a target
///
/// The image build context is resolved relative to the current directory.
pub fn build_graph(target: &DeploymentTarget) -> Result<ResourceGraph> {
    build_graph_with(target, &StackConfig::default())
}

/// Build the graph top-down: network, then cluster, then service
///
/// Target and options are validated before the build context is read, so configuration
/// errors never touch the filesystem.
pub fn build_graph_with(target: &DeploymentTarget, config: &StackConfig) -> Result<ResourceGraph> {
    target.validate()?;
    config.validate()?;

    let image = ImageReference::from_context(&config.image.context, config.image.platform)?;

    let network = Network {
        id: ResourceId::new(NETWORK_ID),
        max_azs: config.network.max_azs,
    };

    let cluster = Cluster {
        id: ResourceId::new(CLUSTER_ID),
        name: config.cluster.name.clone(),
        network: network.id.clone(),
    };

    let service = ServiceDescriptor {
        id: ResourceId::new(SERVICE_ID),
        cluster: cluster.id.clone(),
        image,
        cpu: config.service.cpu,
        memory_mib: config.service.memory,
        desired_count: config.service.desired_count,
        container_port: config.service.container_port,
        public_load_balancer: config.service.public_load_balancer,
    };

    let graph = ResourceGraph {
        stack_name: STACK_NAME.to_string(),
        target: target.clone(),
        network,
        cluster,
        service,
    };

    graph.validate()?;
    log::debug!("Built resource graph {} for {}", graph.stack_name, graph.target);
    Ok(graph)
}
