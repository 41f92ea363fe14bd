use super::ShowCommand;
use crate::error::Error;
use crate::runner::Runner;
use crate::writer::Writer;
use eyre::WrapErr;
use stackgraph_core::{Node, ResourceGraph};

pub(crate) struct ShowRunner<'a> {
    pub(super) command: ShowCommand,
    pub(super) writer: &'a Writer,
}

impl Runner for ShowRunner<'_> {
    fn run(&mut self) -> Result<(), Error> {
        let graph = self.graph(&self.command.target)?;

        self.writer.text(&render(&graph))?;

        self.writer.json(
            serde_json::to_value(&graph).wrap_err("Failed to serialize the resource graph")?,
        )?;

        Ok(())
    }
}

/// Indented tree of the graph, roots first
fn render(graph: &ResourceGraph) -> String {
    let mut output = format!("{} ({})\n", graph.stack_name, graph.target);

    for root in graph.nodes().into_iter().filter(|n| n.parent().is_none()) {
        render_node(graph, root, 0, &mut output);
    }

    output
}

fn render_node(graph: &ResourceGraph, node: Node<'_>, depth: usize, output: &mut String) {
    let indent = "    ".repeat(depth);
    output.push_str(&format!("{indent}└── {} [{}] {}\n", node.id(), node.kind(), describe(node)));

    if let Node::Service(service) = node {
        output.push_str(&format!(
            "{indent}    image {} ({}) {}\n",
            service.image.context.display(),
            service.image.platform,
            service.image.fingerprint
        ));
    }

    for child in graph.children(node.id()) {
        render_node(graph, child, depth + 1, output);
    }
}

fn describe(node: Node<'_>) -> String {
    match node {
        Node::Network(network) => format!("max_azs={}", network.max_azs),
        Node::Cluster(cluster) => format!("name={}", cluster.name),
        Node::Service(service) => format!(
            "cpu={} memory={}MiB desired={} port={} lb={}",
            service.cpu,
            service.memory_mib,
            service.desired_count,
            service.container_port,
            if service.public_load_balancer { "public" } else { "internal" }
        ),
    }
}
