//! Module for creating and analysing the carrier graph of a hub.
//!
//! Nodes are carriers plus a special SOURCE node standing for everything outside the hub (grid
//! imports and free resources). There is an edge from carrier A to carrier B for each technology
//! that consumes A and produces B.
use crate::carrier::CarrierID;
use crate::error::HubError;
use crate::input::format_items_with_cap;
use crate::parameter_table::ParameterTable;
use crate::technology::TechnologyID;
use anyhow::Result;
use itertools::Itertools;
use petgraph::Directed;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{Graph, NodeIndex};
use std::collections::HashMap;
use std::fmt::Display;

/// A graph of carrier flows through the hub
type CarriersGraph = Graph<GraphNode, GraphEdge, Directed>;

#[derive(Eq, PartialEq, Clone, Hash, Debug)]
/// A node in the carrier graph
enum GraphNode {
    /// A node representing a carrier
    Carrier(CarrierID),
    /// Everything outside the hub
    Source,
}

impl Display for GraphNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphNode::Carrier(id) => write!(f, "{id}"),
            GraphNode::Source => write!(f, "SOURCE"),
        }
    }
}

#[derive(Eq, PartialEq, Clone, Hash, Debug)]
/// An edge in the carrier graph
enum GraphEdge {
    /// An edge representing a technology
    Technology(TechnologyID),
    /// A grid connection or a free resource
    Supply,
}

/// Creates a directed graph of carrier flows for the hub
fn create_carriers_graph(table: &ParameterTable) -> (CarriersGraph, HashMap<GraphNode, NodeIndex>) {
    let mut graph = Graph::new();
    let mut node_index = HashMap::new();
    let mut get_node = |graph: &mut CarriersGraph, node: GraphNode| {
        *node_index
            .entry(node.clone())
            .or_insert_with(|| graph.add_node(node))
    };

    let source = get_node(&mut graph, GraphNode::Source);
    for carrier in table.carriers.values() {
        let node = get_node(&mut graph, GraphNode::Carrier(carrier.id.clone()));
        if carrier.is_supply() {
            graph.add_edge(source, node, GraphEdge::Supply);
        }
    }

    for technology in table.technologies.values() {
        let input = get_node(&mut graph, GraphNode::Carrier(technology.input.id.clone()));
        for output in &technology.outputs {
            let output = get_node(&mut graph, GraphNode::Carrier(output.carrier.id.clone()));
            graph.add_edge(input, output, GraphEdge::Technology(technology.id.clone()));
        }
    }

    (graph, node_index)
}

/// Check that every carrier with a demand can be supplied.
///
/// A carrier can be supplied if there is a path to it from the SOURCE node, i.e. it can be
/// imported or produced by a chain of technologies from something which can be imported.
pub fn validate_carrier_graph(table: &ParameterTable) -> Result<()> {
    let (graph, node_index) = create_carriers_graph(table);
    let source = node_index[&GraphNode::Source];

    let unreachable = table
        .demand_carriers()
        .into_iter()
        .filter(|carrier| {
            node_index
                .get(&GraphNode::Carrier(carrier.clone()))
                .is_none_or(|&node| !has_path_connecting(&graph, source, node, None))
        })
        .sorted()
        .collect_vec();

    if !unreachable.is_empty() {
        Err(HubError::Configuration(format!(
            "No way to supply demand for carriers: {}",
            format_items_with_cap(&unreachable)
        )))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::is_hub_error;
    use crate::fixture::parameter_table;
    use rstest::rstest;

    #[rstest]
    fn test_create_carriers_graph(parameter_table: ParameterTable) {
        let (graph, node_index) = create_carriers_graph(&parameter_table);

        // One node per carrier plus SOURCE
        assert_eq!(graph.node_count(), parameter_table.carriers.len() + 1);
        let gas = node_index[&GraphNode::Carrier("gas".into())];
        let heat = node_index[&GraphNode::Carrier("heat".into())];
        assert!(graph.contains_edge(gas, heat));
        assert!(!graph.contains_edge(heat, gas));
    }

    #[rstest]
    fn test_validate_carrier_graph(parameter_table: ParameterTable) {
        validate_carrier_graph(&parameter_table).unwrap();
    }

    #[rstest]
    fn test_validate_carrier_graph_unreachable(mut parameter_table: ParameterTable) {
        parameter_table.technologies.clear();
        let err = validate_carrier_graph(&parameter_table).unwrap_err();
        assert!(is_hub_error(&err, |e| *e
            == HubError::Configuration("No way to supply demand for carriers: heat".into())));
    }
}
