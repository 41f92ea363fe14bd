//! Declarative resource graph of a load-balanced Fargate service
//!
//! [`build_graph`] turns a [`DeploymentTarget`] into a [`ResourceGraph`] (network, cluster,
//! service), and [`synthesize`] serializes the graph into a provisioning request for an
//! external engine.
mod asset;
pub mod config;
pub mod dockerignore;
mod error;
mod graph;
pub mod image;
pub mod sanitize;
mod target;
pub mod template;

pub use asset::fingerprint;
pub use config::StackConfig;
pub use error::{GraphError, Result};
pub use graph::{
    build_graph, build_graph_with, Cluster, Network, Node, ResourceGraph, ResourceId,
    ServiceDescriptor, CLUSTER_ID, NETWORK_ID, SERVICE_ID, STACK_NAME,
};
pub use image::{ImageReference, Platform};
pub use target::{DeploymentTarget, DEFAULT_REGION};
pub use template::{synthesize, Synthesis, Template};
