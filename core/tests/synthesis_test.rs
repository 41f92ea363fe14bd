use serde_json::json;
use stackgraph_core::image::DOCKERFILE;
use stackgraph_core::template::{repository_name, ASSETS_FILENAME, CONTAINER_NAME};
use stackgraph_core::{build_graph_with, synthesize, DeploymentTarget, ResourceGraph, StackConfig};
use std::fs;
use tempfile::TempDir;

fn graph(account: Option<&str>, public: bool) -> (TempDir, ResourceGraph) {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(DOCKERFILE), "FROM node:22-alpine\n").unwrap();

    let mut config = StackConfig::default();
    config.image.context = dir.path().to_path_buf();
    config.service.public_load_balancer = public;

    let graph = build_graph_with(&DeploymentTarget::new(account, "us-east-1"), &config).unwrap();
    (dir, graph)
}

fn count_of(synthesis: &stackgraph_core::Synthesis, kind: &str) -> usize {
    synthesis
        .template
        .resources
        .values()
        .filter(|r| r.kind == kind)
        .count()
}

#[test]
fn two_zones_expand_into_subnets_and_nat() {
    let (_dir, graph) = graph(None, true);
    let synthesis = synthesize(&graph).unwrap();

    assert_eq!(count_of(&synthesis, "AWS::EC2::VPC"), 1);
    assert_eq!(count_of(&synthesis, "AWS::EC2::Subnet"), 4);
    assert_eq!(count_of(&synthesis, "AWS::EC2::NatGateway"), 2);
    assert_eq!(count_of(&synthesis, "AWS::EC2::RouteTable"), 4);
    assert_eq!(count_of(&synthesis, "AWS::ECS::Cluster"), 1);
    assert_eq!(count_of(&synthesis, "AWS::ECS::Service"), 1);
    assert_eq!(count_of(&synthesis, "AWS::ElasticLoadBalancingV2::LoadBalancer"), 1);
}

#[test]
fn service_properties_follow_the_graph() {
    let (_dir, graph) = graph(None, true);
    let synthesis = synthesize(&graph).unwrap();
    let resources = &synthesis.template.resources;

    let (cluster_id, cluster) = resources
        .iter()
        .find(|(_, r)| r.kind == "AWS::ECS::Cluster")
        .unwrap();
    assert_eq!(cluster.properties["ClusterName"], "testapp-cluster");

    let service = resources
        .values()
        .find(|r| r.kind == "AWS::ECS::Service")
        .unwrap();
    assert_eq!(service.properties["Cluster"], json!({ "Ref": cluster_id }));
    assert_eq!(service.properties["DesiredCount"], 1);
    assert_eq!(service.properties["LoadBalancers"][0]["ContainerPort"], 8000);
    assert_eq!(service.depends_on.len(), 2);

    let target_group = resources
        .values()
        .find(|r| r.kind == "AWS::ElasticLoadBalancingV2::TargetGroup")
        .unwrap();
    assert_eq!(target_group.properties["Port"], 80);
    assert_eq!(target_group.properties["TargetType"], "ip");

    let task = resources
        .values()
        .find(|r| r.kind == "AWS::ECS::TaskDefinition")
        .unwrap();
    assert_eq!(task.properties["Cpu"], "256");
    assert_eq!(task.properties["Memory"], "512");
    assert_eq!(task.properties["RuntimePlatform"]["CpuArchitecture"], "X86_64");

    let container = &task.properties["ContainerDefinitions"][0];
    assert_eq!(container["Name"], CONTAINER_NAME);

    let image = container["Image"]["Fn::Sub"].as_str().unwrap();
    assert!(image.starts_with("${AWS::AccountId}.dkr.ecr.us-east-1."));
    assert!(image.ends_with(&format!(":{}", graph.service.image.fingerprint)));
}

#[test]
fn load_balancer_scheme_follows_the_public_flag() {
    let scheme = |public: bool| {
        let (_dir, graph) = graph(None, public);
        let synthesis = synthesize(&graph).unwrap();

        synthesis
            .template
            .resources
            .values()
            .find(|r| r.kind == "AWS::ElasticLoadBalancingV2::LoadBalancer")
            .unwrap()
            .properties["Scheme"]
            .clone()
    };

    assert_eq!(scheme(true), "internet-facing");
    assert_eq!(scheme(false), "internal");
}

#[test]
fn service_url_is_described_by_reachability() {
    let description = |public: bool| {
        let (_dir, graph) = graph(None, public);
        let synthesis = synthesize(&graph).unwrap();
        synthesis.template.outputs["ServiceURL"].description.clone()
    };

    assert_eq!(description(true), "Public URL of the service");
    assert!(description(false).contains("inside the VPC"));
}

#[test]
fn every_reference_resolves() {
    let (_dir, graph) = graph(Some("123456789012"), true);
    let synthesis = synthesize(&graph).unwrap();
    let resources = &synthesis.template.resources;

    fn refs(value: &serde_json::Value, found: &mut Vec<String>) {
        match value {
            serde_json::Value::Object(map) => {
                if let Some(serde_json::Value::String(id)) = map.get("Ref") {
                    found.push(id.clone());
                }

                if let Some(serde_json::Value::Array(att)) = map.get("Fn::GetAtt") {
                    found.push(att[0].as_str().unwrap().to_string());
                }

                map.values().for_each(|v| refs(v, found));
            }
            serde_json::Value::Array(items) => items.iter().for_each(|v| refs(v, found)),
            _ => {}
        }
    }

    let mut found = vec![];

    for resource in resources.values() {
        refs(&resource.properties, &mut found);
        found.extend(resource.depends_on.iter().cloned());
    }

    assert!(!found.is_empty());

    for id in found {
        assert!(resources.contains_key(&id), "Dangling reference {id}");
    }
}

#[test]
fn synthesis_is_deterministic_and_written_to_disk() {
    let (_dir, graph) = graph(Some("123456789012"), true);
    let first = synthesize(&graph).unwrap();
    assert_eq!(first, synthesize(&graph).unwrap());

    let out = TempDir::new().unwrap();
    let written = first.write_to(&out.path().join("stack.out")).unwrap();
    assert_eq!(written.len(), 2);

    let template: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&written[0]).unwrap()).unwrap();
    assert_eq!(template["AWSTemplateFormatVersion"], "2010-09-09");
    assert!(written[0].ends_with("CdkAppStack.template.json"));

    let resources = template["Resources"].as_object().unwrap();
    assert!(resources.keys().all(|id| id.starts_with("CdkAppStack")));

    let assets: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&written[1]).unwrap()).unwrap();
    assert!(written[1].ends_with(ASSETS_FILENAME));

    let asset = &assets["dockerImages"][&graph.service.image.fingerprint];
    assert_eq!(asset["source"]["platform"], "linux/amd64");
    assert_eq!(asset["destination"]["repositoryName"], repository_name(&graph));
    assert_eq!(
        repository_name(&graph),
        "stackgraph-container-assets-123456789012-us-east-1"
    );
}

#[test]
fn tampered_graph_is_rejected() {
    let (_dir, mut graph) = graph(None, true);
    graph.network.max_azs = 0;
    assert!(synthesize(&graph).unwrap_err().is_configuration());
}
