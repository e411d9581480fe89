//! Load ordering from the entity reference graph

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::catalog::Catalog;
use crate::config::ConfigError;

/// Every catalog entity ordered so referenced entities come first.
///
/// Edges run from a referenced entity to the entity holding the reference.
/// Self-references impose no order and are ignored.
pub fn load_order(catalog: &Catalog) -> Result<Vec<String>, ConfigError> {
    let mut graph = DiGraph::<&str, ()>::new();
    let nodes: HashMap<&str, NodeIndex> = catalog
        .names()
        .map(|name| (name, graph.add_node(name)))
        .collect();

    for entity in catalog.entities() {
        let to = nodes[entity.name()];
        for dependency in entity.rules.dependencies() {
            if let Some(&from) = nodes.get(dependency) {
                graph.update_edge(from, to, ());
            }
        }
    }

    let sorted = toposort(&graph, None)
        .map_err(|cycle| ConfigError::DependencyCycle(graph[cycle.node_id()].to_string()))?;
    Ok(sorted.into_iter().map(|node| graph[node].to_string()).collect())
}

/// The given entities in load order; unknown names are kept at the end
pub fn order_entities<'a>(
    catalog: &Catalog,
    entities: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<String>, ConfigError> {
    let requested: Vec<&str> = entities.into_iter().collect();
    let mut ordered: Vec<String> = load_order(catalog)?
        .into_iter()
        .filter(|name| requested.contains(&name.as_str()))
        .collect();
    for name in requested {
        if catalog.entity(name).is_none() && !ordered.iter().any(|o| o == name) {
            ordered.push(name.to_string());
        }
    }
    Ok(ordered)
}
