use stackgraph_core::image::DOCKERFILE;
use stackgraph_core::{
    build_graph, build_graph_with, DeploymentTarget, GraphError, Node, Platform, StackConfig,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// A project dir with a buildable image context at the default location
fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let context = dir.path().join("TestApp/TestApp");

    fs::create_dir_all(&context).unwrap();
    fs::write(context.join(DOCKERFILE), "FROM python:3.12-slim\nCOPY . /app\n").unwrap();
    fs::write(context.join("main.py"), "print('hello')\n").unwrap();
    dir
}

fn config(project: &Path) -> StackConfig {
    StackConfig::from_path(project).unwrap()
}

#[test]
fn reference_deployment_in_us_east_1() {
    let dir = project();
    let target = DeploymentTarget::new(None, "us-east-1");
    let graph = build_graph_with(&target, &config(dir.path())).unwrap();

    assert_eq!(graph.stack_name, "CdkAppStack");
    assert_eq!(graph.target.account, None);
    assert_eq!(graph.target.region, "us-east-1");
    assert_eq!(graph.network.max_azs, 2);
    assert_eq!(graph.cluster.name, "testapp-cluster");
    assert_eq!(graph.service.cpu, 256);
    assert_eq!(graph.service.memory_mib, 512);
    assert_eq!(graph.service.desired_count, 1);
    assert_eq!(graph.service.container_port, 8000);
    assert!(graph.service.public_load_balancer);
    assert_eq!(graph.service.image.platform, Platform::LinuxAmd64);
}

#[test]
fn graph_is_a_single_path_tree() {
    let dir = project();
    let graph = build_graph_with(&DeploymentTarget::default(), &config(dir.path())).unwrap();

    let nodes = graph.nodes();
    let networks = nodes.iter().filter(|n| matches!(n, Node::Network(_))).count();
    let clusters = nodes.iter().filter(|n| matches!(n, Node::Cluster(_))).count();
    let services = nodes.iter().filter(|n| matches!(n, Node::Service(_))).count();
    assert_eq!((networks, clusters, services), (1, 1, 1));

    assert_eq!(graph.cluster.network, graph.network.id);
    assert_eq!(graph.service.cluster, graph.cluster.id);
    assert!(graph.validate().is_ok());
}

#[test]
fn unchanged_inputs_build_equal_graphs() {
    let dir = project();
    let target = DeploymentTarget::new(Some("123456789012"), "eu-west-1");

    let first = build_graph_with(&target, &config(dir.path())).unwrap();
    let second = build_graph_with(&target, &config(dir.path())).unwrap();
    assert_eq!(first, second);

    fs::write(
        dir.path().join("TestApp/TestApp/main.py"),
        "print('changed')\n",
    )
    .unwrap();

    let third = build_graph_with(&target, &config(dir.path())).unwrap();
    assert_ne!(first.service.image.fingerprint, third.service.image.fingerprint);
    assert_eq!(first.cluster, third.cluster);
}

#[test]
fn empty_region_fails_before_the_filesystem() {
    // The default context does not exist here, a build context error would mean it was read
    let err = build_graph(&DeploymentTarget::new(None, "")).unwrap_err();
    assert!(matches!(err, GraphError::Configuration { .. }), "{err}");
}

#[test]
fn missing_build_context_is_reported() {
    let dir = TempDir::new().unwrap();
    let err = build_graph_with(&DeploymentTarget::default(), &config(dir.path())).unwrap_err();

    match err {
        GraphError::BuildContext { path, .. } => {
            assert_eq!(path, dir.path().join("TestApp/TestApp"))
        }
        other => panic!("Unexpected error: {other}"),
    }
}

#[test]
fn stack_toml_overrides_defaults() {
    let dir = project();

    fs::write(
        dir.path().join("stack.toml"),
        r#"
        [network]
        max_azs = 3

        [service]
        cpu = 512
        memory = 1024
        desired_count = 2
        public_load_balancer = false
        "#,
    )
    .unwrap();

    let graph = build_graph_with(&DeploymentTarget::default(), &config(dir.path())).unwrap();

    assert_eq!(graph.network.max_azs, 3);
    assert_eq!(graph.service.cpu, 512);
    assert_eq!(graph.service.memory_mib, 1024);
    assert_eq!(graph.service.desired_count, 2);
    assert!(!graph.service.public_load_balancer);
    assert_eq!(graph.service.container_port, 8000);
}

#[test]
fn dockerignored_files_do_not_change_the_graph() {
    let dir = project();
    let context = dir.path().join("TestApp/TestApp");
    fs::write(context.join(".dockerignore"), "__pycache__\n").unwrap();

    let first = build_graph_with(&DeploymentTarget::default(), &config(dir.path())).unwrap();

    fs::create_dir_all(context.join("__pycache__")).unwrap();
    fs::write(context.join("__pycache__/app.pyc"), "bytecode").unwrap();

    let second = build_graph_with(&DeploymentTarget::default(), &config(dir.path())).unwrap();
    assert_eq!(first, second);
}
