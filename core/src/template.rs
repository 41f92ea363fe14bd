use crate::config::MAX_AZS_LIMIT;
use crate::error::{GraphError, Result};
use crate::graph::ResourceGraph;
use crate::image::Platform;
use crate::sanitize::{escape_repository_name, logical_id};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

pub const VPC_CIDR: &str = "10.0.0.0/16";
pub const ASSETS_FILENAME: &str = "assets.json";
pub const CONTAINER_NAME: &str = "web";
const LISTENER_PORT: u16 = 80;
const ACCOUNT_PLACEHOLDER: &str = "${AWS::AccountId}";

/// A provisioning request in CloudFormation shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    pub description: String,
    pub resources: BTreeMap<String, Resource>,
    pub outputs: BTreeMap<String, Output>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    #[serde(rename = "Type")]
    pub kind: String,
    pub properties: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    pub description: String,
    pub value: Value,
}

/// Container images the build step has to produce before the template is deployed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetManifest {
    pub version: String,
    pub docker_images: BTreeMap<String, DockerImageAsset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerImageAsset {
    pub source: DockerImageSource,
    pub destination: DockerImageDestination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerImageSource {
    pub directory: PathBuf,
    pub platform: Platform,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerImageDestination {
    pub repository_name: String,
    pub image_tag: String,
    pub region: String,
}

/// Everything the provisioning engine and the image build step consume
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub stack_name: String,
    pub template: Template,
    pub assets: AssetManifest,
}

impl Synthesis {
    pub fn template_filename(&self) -> String {
        format!("{}.template.json", self.stack_name)
    }

    /// Write the template and the asset manifest into a directory, creating it if needed
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;

        let template_path = dir.join(self.template_filename());
        fs::write(&template_path, serde_json::to_string_pretty(&self.template)?)?;

        let assets_path = dir.join(ASSETS_FILENAME);
        fs::write(&assets_path, serde_json::to_string_pretty(&self.assets)?)?;

        log::debug!("Wrote {template_path:?} and {assets_path:?}");
        Ok(vec![template_path, assets_path])
    }
}

/// Subnet CIDRs for the given number of zones, public ones first
///
/// The VPC range is split into the smallest power of two of equal blocks that fits one public
/// and one private subnet per zone. Zone counts outside `1..=MAX_AZS_LIMIT` do not fit the /16.
pub fn subnet_cidrs(max_azs: u32) -> Result<Vec<String>> {
    if !(1..=MAX_AZS_LIMIT).contains(&max_azs) {
        return Err(GraphError::configuration(format!(
            "max_azs must be between 1 and {MAX_AZS_LIMIT}, got {max_azs}"
        )));
    }

    let count = 2 * max_azs;
    let prefix = 16 + count.next_power_of_two().trailing_zeros();
    let size = 1u32 << (32 - prefix);
    let base = u32::from(Ipv4Addr::new(10, 0, 0, 0));

    Ok((0..count)
        .map(|i| format!("{}/{prefix}", Ipv4Addr::from(base + i * size)))
        .collect())
}

/// ECR repository the image is pushed to
pub fn repository_name(graph: &ResourceGraph) -> String {
    let account = match &graph.target.account {
        Some(account) => escape_repository_name(account),
        None => ACCOUNT_PLACEHOLDER.to_string(),
    };

    format!(
        "stackgraph-container-assets-{account}-{}",
        escape_repository_name(&graph.target.region)
    )
}

/// Turn the resource graph into a template and an asset manifest
pub fn synthesize(graph: &ResourceGraph) -> Result<Synthesis> {
    graph.validate()?;
    let cidrs = subnet_cidrs(graph.network.max_azs)?;

    let mut builder = Builder {
        graph,
        resources: BTreeMap::new(),
    };

    let network = builder.network(&cidrs);
    let cluster = builder.cluster();
    let load_balancer = builder.service(&network, &cluster);

    let outputs = BTreeMap::from([
        (
            "LoadBalancerDNS".to_string(),
            Output {
                description: "DNS name of the service load balancer".into(),
                value: get_att(&load_balancer, "DNSName"),
            },
        ),
        (
            "ServiceURL".to_string(),
            Output {
                description: if graph.service.public_load_balancer {
                    "Public URL of the service".into()
                } else {
                    "URL of the service, reachable from inside the VPC only".into()
                },
                value: json!({ "Fn::Join": ["", ["http://", get_att(&load_balancer, "DNSName")]] }),
            },
        ),
    ]);

    let template = Template {
        format_version: "2010-09-09".into(),
        description: format!(
            "{} in {}: load-balanced Fargate service",
            graph.stack_name, graph.target.region
        ),
        resources: builder.resources,
        outputs,
    };

    let image = &graph.service.image;

    let assets = AssetManifest {
        version: "1".into(),
        docker_images: BTreeMap::from([(
            image.fingerprint.clone(),
            DockerImageAsset {
                source: DockerImageSource {
                    directory: image.context.clone(),
                    platform: image.platform,
                },
                destination: DockerImageDestination {
                    repository_name: repository_name(graph),
                    image_tag: image.fingerprint.clone(),
                    region: graph.target.region.clone(),
                },
            },
        )]),
    };

    log::debug!(
        "Synthesized {} resources for {}",
        template.resources.len(),
        graph.stack_name
    );

    Ok(Synthesis {
        stack_name: graph.stack_name.clone(),
        template,
        assets,
    })
}

fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

fn assume_role_policy(service: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": service },
            "Action": "sts:AssumeRole"
        }]
    })
}

/// Logical IDs of the network resources the service attaches to
struct NetworkIds {
    vpc: String,
    public_subnets: Vec<String>,
    public_routes: Vec<String>,
    private_subnets: Vec<String>,
}

struct Builder<'a> {
    graph: &'a ResourceGraph,
    resources: BTreeMap<String, Resource>,
}

impl Builder<'_> {
    fn add(&mut self, path: &[&str], kind: &str, properties: Value) -> String {
        self.add_with_deps(path, kind, properties, vec![])
    }

    fn add_with_deps(
        &mut self,
        path: &[&str],
        kind: &str,
        properties: Value,
        depends_on: Vec<String>,
    ) -> String {
        let mut full_path = vec![self.graph.stack_name.as_str()];
        full_path.extend_from_slice(path);
        let id = logical_id(&full_path);

        let previous = self.resources.insert(
            id.clone(),
            Resource {
                kind: kind.to_string(),
                properties,
                depends_on,
            },
        );

        debug_assert!(previous.is_none(), "Duplicate logical id {id}");
        id
    }

    fn name_tag(&self, path: &[&str]) -> Value {
        let mut full_path = vec![self.graph.stack_name.as_str()];
        full_path.extend_from_slice(path);
        json!([{ "Key": "Name", "Value": full_path.join("/") }])
    }

    /// VPC with one public and one private subnet per zone, NAT in every public subnet
    fn network(&mut self, cidrs: &[String]) -> NetworkIds {
        let graph = self.graph;
        let net = graph.network.id.as_str();
        let max_azs = graph.network.max_azs as usize;

        let vpc = self.add(
            &[net],
            "AWS::EC2::VPC",
            json!({
                "CidrBlock": VPC_CIDR,
                "EnableDnsHostnames": true,
                "EnableDnsSupport": true,
                "InstanceTenancy": "default",
                "Tags": self.name_tag(&[net]),
            }),
        );

        let gateway = self.add(
            &[net, "IGW"],
            "AWS::EC2::InternetGateway",
            json!({ "Tags": self.name_tag(&[net]) }),
        );

        let attachment = self.add(
            &[net, "VPCGW"],
            "AWS::EC2::VPCGatewayAttachment",
            json!({ "VpcId": reference(&vpc), "InternetGatewayId": reference(&gateway) }),
        );

        let mut ids = NetworkIds {
            vpc,
            public_subnets: vec![],
            public_routes: vec![],
            private_subnets: vec![],
        };

        let mut nat_gateways = vec![];

        for (zone, cidr) in cidrs[..max_azs].iter().enumerate() {
            let name = format!("PublicSubnet{}", zone + 1);
            let (subnet, route_table) = self.subnet(&name, zone, cidr, true, &ids.vpc);

            let association = self.add(
                &[net, name.as_str(), "RouteTableAssociation"],
                "AWS::EC2::SubnetRouteTableAssociation",
                json!({ "RouteTableId": reference(&route_table), "SubnetId": reference(&subnet) }),
            );

            let route = self.add_with_deps(
                &[net, name.as_str(), "DefaultRoute"],
                "AWS::EC2::Route",
                json!({
                    "RouteTableId": reference(&route_table),
                    "DestinationCidrBlock": "0.0.0.0/0",
                    "GatewayId": reference(&gateway),
                }),
                vec![attachment.clone()],
            );

            let eip = self.add(
                &[net, name.as_str(), "EIP"],
                "AWS::EC2::EIP",
                json!({ "Domain": "vpc", "Tags": self.name_tag(&[net, name.as_str()]) }),
            );

            let nat = self.add_with_deps(
                &[net, name.as_str(), "NATGateway"],
                "AWS::EC2::NatGateway",
                json!({
                    "SubnetId": reference(&subnet),
                    "AllocationId": get_att(&eip, "AllocationId"),
                    "Tags": self.name_tag(&[net, name.as_str()]),
                }),
                vec![route.clone(), association],
            );

            ids.public_subnets.push(subnet);
            ids.public_routes.push(route);
            nat_gateways.push(nat);
        }

        for (zone, cidr) in cidrs[max_azs..].iter().enumerate() {
            let name = format!("PrivateSubnet{}", zone + 1);
            let (subnet, route_table) = self.subnet(&name, zone, cidr, false, &ids.vpc);

            self.add(
                &[net, name.as_str(), "RouteTableAssociation"],
                "AWS::EC2::SubnetRouteTableAssociation",
                json!({ "RouteTableId": reference(&route_table), "SubnetId": reference(&subnet) }),
            );

            self.add(
                &[net, name.as_str(), "DefaultRoute"],
                "AWS::EC2::Route",
                json!({
                    "RouteTableId": reference(&route_table),
                    "DestinationCidrBlock": "0.0.0.0/0",
                    "NatGatewayId": reference(&nat_gateways[zone]),
                }),
            );

            ids.private_subnets.push(subnet);
        }

        ids
    }

    /// A subnet and its route table, returns their logical IDs
    fn subnet(
        &mut self,
        name: &str,
        zone: usize,
        cidr: &str,
        is_public: bool,
        vpc: &str,
    ) -> (String, String) {
        let graph = self.graph;
        let net = graph.network.id.as_str();

        let subnet = self.add(
            &[net, name, "Subnet"],
            "AWS::EC2::Subnet",
            json!({
                "VpcId": reference(vpc),
                "AvailabilityZone": { "Fn::Select": [zone, { "Fn::GetAZs": "" }] },
                "CidrBlock": cidr,
                "MapPublicIpOnLaunch": is_public,
                "Tags": self.name_tag(&[net, name]),
            }),
        );

        let route_table = self.add(
            &[net, name, "RouteTable"],
            "AWS::EC2::RouteTable",
            json!({ "VpcId": reference(vpc), "Tags": self.name_tag(&[net, name]) }),
        );

        (subnet, route_table)
    }

    fn cluster(&mut self) -> String {
        let graph = self.graph;
        let cluster = &graph.cluster;

        self.add(
            &[cluster.id.as_str()],
            "AWS::ECS::Cluster",
            json!({ "ClusterName": cluster.name }),
        )
    }

    /// Load balancer, task definition and the ECS service, returns the load balancer's ID
    fn service(&mut self, network: &NetworkIds, cluster: &str) -> String {
        let graph = self.graph;
        let service = &graph.service;
        let svc = service.id.as_str();
        let region = graph.target.region.as_str();
        let port = service.container_port;

        let (scheme, lb_subnets, lb_deps, ingress_cidr) = if service.public_load_balancer {
            (
                "internet-facing",
                &network.public_subnets,
                network.public_routes.clone(),
                "0.0.0.0/0",
            )
        } else {
            ("internal", &network.private_subnets, vec![], VPC_CIDR)
        };

        let lb_subnets: Vec<Value> = lb_subnets.iter().map(|s| reference(s)).collect();

        let private_subnets: Vec<Value> = network
            .private_subnets
            .iter()
            .map(|s| reference(s))
            .collect();

        let lb_security_group = self.add(
            &[svc, "LB", "SecurityGroup"],
            "AWS::EC2::SecurityGroup",
            json!({
                "GroupDescription": format!("Load balancer of {svc}"),
                "VpcId": reference(&network.vpc),
                "SecurityGroupIngress": [{
                    "CidrIp": ingress_cidr,
                    "IpProtocol": "tcp",
                    "FromPort": LISTENER_PORT,
                    "ToPort": LISTENER_PORT,
                }],
            }),
        );

        let load_balancer = self.add_with_deps(
            &[svc, "LB"],
            "AWS::ElasticLoadBalancingV2::LoadBalancer",
            json!({
                "Type": "application",
                "Scheme": scheme,
                "Subnets": lb_subnets,
                "SecurityGroups": [get_att(&lb_security_group, "GroupId")],
                "LoadBalancerAttributes": [{ "Key": "deletion_protection.enabled", "Value": "false" }],
            }),
            lb_deps,
        );

        let target_group = self.add(
            &[svc, "LB", "Listener", "ECSGroup"],
            "AWS::ElasticLoadBalancingV2::TargetGroup",
            json!({
                "Port": LISTENER_PORT,
                "Protocol": "HTTP",
                "TargetType": "ip",
                "VpcId": reference(&network.vpc),
            }),
        );

        let listener = self.add(
            &[svc, "LB", "Listener"],
            "AWS::ElasticLoadBalancingV2::Listener",
            json!({
                "LoadBalancerArn": reference(&load_balancer),
                "Port": LISTENER_PORT,
                "Protocol": "HTTP",
                "DefaultActions": [{ "Type": "forward", "TargetGroupArn": reference(&target_group) }],
            }),
        );

        let log_group = self.add(
            &[svc, "TaskDef", CONTAINER_NAME, "LogGroup"],
            "AWS::Logs::LogGroup",
            json!({}),
        );

        let task_role = self.add(
            &[svc, "TaskDef", "TaskRole"],
            "AWS::IAM::Role",
            json!({ "AssumeRolePolicyDocument": assume_role_policy("ecs-tasks.amazonaws.com") }),
        );

        let execution_role = self.add(
            &[svc, "TaskDef", "ExecutionRole"],
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": assume_role_policy("ecs-tasks.amazonaws.com"),
                "Policies": [{
                    "PolicyName": "PullImageAndWriteLogs",
                    "PolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [
                            {
                                "Effect": "Allow",
                                "Action": [
                                    "ecr:BatchCheckLayerAvailability",
                                    "ecr:BatchGetImage",
                                    "ecr:GetDownloadUrlForLayer",
                                ],
                                "Resource": { "Fn::Sub": format!(
                                    "arn:${{AWS::Partition}}:ecr:{region}:${{AWS::AccountId}}:repository/{}",
                                    repository_name(graph)
                                ) },
                            },
                            {
                                "Effect": "Allow",
                                "Action": "ecr:GetAuthorizationToken",
                                "Resource": "*",
                            },
                            {
                                "Effect": "Allow",
                                "Action": ["logs:CreateLogStream", "logs:PutLogEvents"],
                                "Resource": get_att(&log_group, "Arn"),
                            },
                        ],
                    },
                }],
            }),
        );

        let task_definition = self.add(
            &[svc, "TaskDef"],
            "AWS::ECS::TaskDefinition",
            json!({
                "Family": format!("{}{svc}TaskDef", graph.stack_name),
                "Cpu": service.cpu.to_string(),
                "Memory": service.memory_mib.to_string(),
                "NetworkMode": "awsvpc",
                "RequiresCompatibilities": ["FARGATE"],
                "RuntimePlatform": {
                    "CpuArchitecture": service.image.platform.cpu_architecture(),
                    "OperatingSystemFamily": "LINUX",
                },
                "ExecutionRoleArn": get_att(&execution_role, "Arn"),
                "TaskRoleArn": get_att(&task_role, "Arn"),
                "ContainerDefinitions": [{
                    "Name": CONTAINER_NAME,
                    "Image": self.image_uri(),
                    "Essential": true,
                    "PortMappings": [{ "ContainerPort": port, "Protocol": "tcp" }],
                    "LogConfiguration": {
                        "LogDriver": "awslogs",
                        "Options": {
                            "awslogs-group": reference(&log_group),
                            "awslogs-stream-prefix": svc,
                            "awslogs-region": region,
                        },
                    },
                }],
            }),
        );

        let service_security_group = self.add(
            &[svc, "Service", "SecurityGroup"],
            "AWS::EC2::SecurityGroup",
            json!({
                "GroupDescription": format!("Tasks of {svc}"),
                "VpcId": reference(&network.vpc),
                "SecurityGroupEgress": [{ "CidrIp": "0.0.0.0/0", "IpProtocol": "-1" }],
            }),
        );

        self.add(
            &[svc, "Service", "SecurityGroup", "from LB"],
            "AWS::EC2::SecurityGroupIngress",
            json!({
                "GroupId": get_att(&service_security_group, "GroupId"),
                "SourceSecurityGroupId": get_att(&lb_security_group, "GroupId"),
                "IpProtocol": "tcp",
                "FromPort": port,
                "ToPort": port,
            }),
        );

        self.add_with_deps(
            &[svc, "Service", "Service"],
            "AWS::ECS::Service",
            json!({
                "Cluster": reference(cluster),
                "DesiredCount": service.desired_count,
                "LaunchType": "FARGATE",
                "TaskDefinition": reference(&task_definition),
                "HealthCheckGracePeriodSeconds": 60,
                "DeploymentConfiguration": { "MaximumPercent": 200, "MinimumHealthyPercent": 50 },
                "LoadBalancers": [{
                    "ContainerName": CONTAINER_NAME,
                    "ContainerPort": port,
                    "TargetGroupArn": reference(&target_group),
                }],
                "NetworkConfiguration": {
                    "AwsvpcConfiguration": {
                        "AssignPublicIp": "DISABLED",
                        "Subnets": private_subnets,
                        "SecurityGroups": [get_att(&service_security_group, "GroupId")],
                    },
                },
            }),
            vec![listener, target_group],
        );

        load_balancer
    }

    /// Image tagged with the build context fingerprint in the assets repository
    fn image_uri(&self) -> Value {
        let account = self
            .graph
            .target
            .account
            .as_deref()
            .unwrap_or(ACCOUNT_PLACEHOLDER);

        json!({
            "Fn::Sub": format!(
                "{account}.dkr.ecr.{region}.${{AWS::URLSuffix}}/{repository}:{tag}",
                region = self.graph.target.region,
                repository = repository_name(self.graph),
                tag = self.graph.service.image.fingerprint,
            )
        })
    }
}
