//! Topology graph projection of a model.
//!
//! Edge-class instances (lines, switches, transformers and the rest)
//! become undirected edges between their `from` and `to` objects; a
//! node-class instance with a `parent` contributes a virtual containment
//! edge tagged `parent`. Node data is back-filled from the model after
//! edge insertion so that objects first seen as an endpoint still pick up
//! their class and attributes.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::diagnostics::Diagnostics;
use crate::model::Model;
use crate::schema::{is_edge_class, is_node_class};
use crate::value::AttributeValue;

/// Graph node: one network object, class and attributes back-filled from
/// the model when a matching instance exists.
#[derive(Debug, Clone)]
pub struct TopologyNode {
    pub name: String,
    pub class_name: Option<String>,
    pub attributes: IndexMap<String, Option<AttributeValue>>,
}

impl TopologyNode {
    fn placeholder(name: &str) -> Self {
        Self {
            name: name.to_string(),
            class_name: None,
            attributes: IndexMap::new(),
        }
    }
}

/// Graph edge: the connecting instance, or the virtual `parent` edge.
#[derive(Debug, Clone)]
pub struct TopologyEdge {
    pub class_name: String,
    pub instance: String,
    pub attributes: IndexMap<String, Option<AttributeValue>>,
}

/// Summary statistics for a topology graph.
#[derive(Debug)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub connected_components: usize,
}

/// Undirected topology graph plus a name lookup table.
#[derive(Debug, Default)]
pub struct TopologyGraph {
    pub graph: UnGraph<TopologyNode, TopologyEdge>,
    index: HashMap<String, NodeIndex>,
}

impl TopologyGraph {
    fn ensure_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&index) = self.index.get(name) {
            return index;
        }
        let index = self.graph.add_node(TopologyNode::placeholder(name));
        self.index.insert(name.to_string(), index);
        index
    }

    pub fn node_index(&self, name: &str) -> Option<NodeIndex> {
        self.index.get(name).copied()
    }

    pub fn node(&self, name: &str) -> Option<&TopologyNode> {
        self.node_index(name).map(|i| &self.graph[i])
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            node_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
            connected_components: connected_components(&self.graph),
        }
    }

    /// Breadth-first node order, covering every component. Components and
    /// neighbor visits follow insertion order, so the order is stable for
    /// a given model.
    pub fn traversal_order(&self) -> Vec<NodeIndex> {
        let mut visited = HashSet::new();
        let mut order = Vec::with_capacity(self.graph.node_count());
        for start in self.graph.node_indices() {
            if visited.contains(&start) {
                continue;
            }
            let mut queue = VecDeque::new();
            queue.push_back(start);
            while let Some(node) = queue.pop_front() {
                if !visited.insert(node) {
                    continue;
                }
                order.push(node);
                for neighbor in self.graph.neighbors(node) {
                    if !visited.contains(&neighbor) {
                        queue.push_back(neighbor);
                    }
                }
            }
        }
        order
    }

    /// Traversal-ordered (class, identity) pairs: each node followed by
    /// its not-yet-listed incident edges, virtual `parent` edges skipped.
    /// Used to keep electrically connected objects contiguous on output.
    pub fn ordered_instances(&self) -> Vec<(String, String)> {
        let mut listed_edges = HashSet::new();
        let mut out = Vec::new();
        for node in self.traversal_order() {
            let data = &self.graph[node];
            if let Some(class_name) = &data.class_name {
                out.push((class_name.clone(), data.name.clone()));
            }
            for edge in self.graph.edges(node) {
                if !listed_edges.insert(edge.id()) {
                    continue;
                }
                let weight = edge.weight();
                if weight.class_name != "parent" {
                    out.push((weight.class_name.clone(), weight.instance.clone()));
                }
            }
        }
        out
    }

    /// Export the topology to a DOT string (Graphviz).
    pub fn to_dot(&self) -> String {
        let mut buffer = String::new();
        buffer.push_str("graph glm_network {\n");
        for node in self.graph.node_indices() {
            let label = sanitize_label(&self.graph[node].name);
            buffer.push_str(&format!("  n{} [label=\"{}\"];\n", node.index(), label));
        }
        for edge in self.graph.edge_references() {
            let source = edge.source().index();
            let target = edge.target().index();
            let label = sanitize_label(&edge.weight().class_name);
            buffer.push_str(&format!("  n{source} -- n{target} [label=\"{label}\"];\n"));
        }
        buffer.push('}');
        buffer
    }
}

fn sanitize_label(label: &str) -> String {
    label.replace('"', "\\\"")
}

/// Project `model` into a topology graph. Objects referenced as an
/// endpoint but never defined stay as placeholder nodes and are reported
/// under the `orphaned-node` category.
pub fn build_graph(model: &Model, diag: &mut Diagnostics) -> TopologyGraph {
    let mut topo = TopologyGraph::default();

    for store in model.stores() {
        if !is_edge_class(store.class_name()) {
            continue;
        }
        for instance in store.instances() {
            let (Some(from), Some(to)) = (instance.reference("from"), instance.reference("to"))
            else {
                continue;
            };
            let from = topo.ensure_node(from);
            let to = topo.ensure_node(to);
            topo.graph.add_edge(
                from,
                to,
                TopologyEdge {
                    class_name: instance.class_name.clone(),
                    instance: instance.identity.clone(),
                    attributes: instance.attributes.clone(),
                },
            );
        }
    }

    for store in model.stores() {
        if !is_node_class(store.class_name()) {
            continue;
        }
        for instance in store.instances() {
            let Some(parent) = instance.reference("parent") else {
                continue;
            };
            let child = topo.ensure_node(&instance.identity);
            let parent = topo.ensure_node(parent);
            topo.graph.add_edge(
                child,
                parent,
                TopologyEdge {
                    class_name: "parent".to_string(),
                    instance: instance.identity.clone(),
                    attributes: IndexMap::new(),
                },
            );
        }
    }

    // back-fill node data from the model
    for index in topo.graph.node_indices() {
        let name = topo.graph[index].name.clone();
        match model.class_of(&name) {
            Some(class_name) => {
                let class_name = class_name.to_string();
                let attributes = model
                    .instance(&class_name, &name)
                    .map(|i| i.attributes.clone())
                    .unwrap_or_default();
                let node = &mut topo.graph[index];
                node.class_name = Some(class_name);
                node.attributes = attributes;
            }
            None => {
                diag.add_warning_with_entity(
                    "orphaned-node",
                    "graph node has no matching object definition",
                    &name,
                );
            }
        }
    }

    topo
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feeder_model() -> Model {
        let mut diag = Diagnostics::new();
        let mut model = Model::with_bundled_schema(&mut diag).unwrap();
        model.add_object("node", "n1", &[("bustype", "SWING")], &mut diag);
        model.add_object("node", "n2", &[], &mut diag);
        model.add_object("node", "n3", &[], &mut diag);
        model.add_object(
            "overhead_line",
            "line_1_2",
            &[("from", "n1"), ("to", "n2")],
            &mut diag,
        );
        model.add_object("switch", "sw_2_3", &[("from", "n2"), ("to", "n3")], &mut diag);
        model.add_object("meter", "m1", &[("parent", "n3")], &mut diag);
        assert!(!diag.has_errors());
        model
    }

    #[test]
    fn test_build_graph_edges_and_parents() {
        let model = feeder_model();
        let mut diag = Diagnostics::new();
        let topo = build_graph(&model, &mut diag);

        let stats = topo.stats();
        assert_eq!(stats.node_count, 4); // n1 n2 n3 m1
        assert_eq!(stats.edge_count, 3); // two lines + one parent edge
        assert_eq!(stats.connected_components, 1);
        assert!(!diag.has_issues());

        let n1 = topo.node("n1").unwrap();
        assert_eq!(n1.class_name.as_deref(), Some("node"));
        assert_eq!(
            n1.attributes.get("bustype").unwrap().as_ref().unwrap().to_string(),
            "SWING"
        );
    }

    #[test]
    fn test_orphaned_endpoint_reported() {
        let mut diag = Diagnostics::new();
        let mut model = Model::with_bundled_schema(&mut diag).unwrap();
        model.add_object("node", "n1", &[], &mut diag);
        model.add_object("switch", "sw1", &[("from", "n1"), ("to", "ghost")], &mut diag);

        let mut graph_diag = Diagnostics::new();
        let topo = build_graph(&model, &mut graph_diag);

        assert!(topo.node("ghost").is_some());
        assert!(topo.node("ghost").unwrap().class_name.is_none());
        let issues: Vec<_> = graph_diag.issues_by_category("orphaned-node").collect();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].entity.as_deref(), Some("ghost"));
    }

    #[test]
    fn test_ordered_instances_contiguous() {
        let model = feeder_model();
        let mut diag = Diagnostics::new();
        let topo = build_graph(&model, &mut diag);

        let ordered = topo.ordered_instances();
        // every node-class and edge-class instance listed exactly once,
        // parent edges excluded
        assert_eq!(ordered.len(), 6);
        let names: Vec<&str> = ordered.iter().map(|(_, n)| n.as_str()).collect();
        assert!(names.contains(&"line_1_2"));
        assert!(names.contains(&"sw_2_3"));
        assert!(names.contains(&"m1"));
        assert_eq!(names[0], "n1");
    }

    #[test]
    fn test_dot_export() {
        let model = feeder_model();
        let mut diag = Diagnostics::new();
        let topo = build_graph(&model, &mut diag);

        let dot = topo.to_dot();
        assert!(dot.starts_with("graph glm_network {"));
        assert!(dot.contains("label=\"n1\""));
        assert!(dot.contains("label=\"switch\""));
        assert!(dot.ends_with('}'));
    }
}
