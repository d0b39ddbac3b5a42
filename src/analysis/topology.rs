use crate::store::{IndicatorId, Registry, StoreError};
use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graphmap::DiGraphMap;

/// Builds the parameter graph. Edges point owner -> operand, weighted by order.
pub fn parameter_graph(registry: &Registry) -> DiGraphMap<IndicatorId, i32> {
    let mut graph = DiGraphMap::new();
    for (idx, slot) in registry.indicators.iter().enumerate() {
        if slot.is_some() {
            graph.add_node(IndicatorId::new(idx));
        }
    }
    for p in &registry.parameters {
        graph.add_edge(p.owner, p.indicator, p.order);
    }
    graph
}

/// Whether binding `parameter` under `owner` would make `owner` reach itself.
pub fn would_create_cycle(registry: &Registry, owner: IndicatorId, parameter: IndicatorId) -> bool {
    if owner == parameter {
        return true;
    }
    let graph = parameter_graph(registry);
    if !graph.contains_node(parameter) || !graph.contains_node(owner) {
        return false;
    }
    has_path_connecting(&graph, parameter, owner, None)
}

/// Orders every indicator so that operands come before their owners.
///
/// Fails on the first cycle found. Bind-time checks keep the registry
/// acyclic, so this only trips on externally produced data (e.g. snapshots).
pub fn evaluation_order(registry: &Registry) -> Result<Vec<IndicatorId>, StoreError> {
    let graph = parameter_graph(registry);
    let mut order = toposort(&graph, None).map_err(|cycle| {
        let at = cycle.node_id();
        StoreError::CyclicParameter { owner: at, parameter: at }
    })?;
    // toposort yields owners first; operands must come first.
    order.reverse();
    Ok(order)
}

/// Every indicator reachable from `root` through parameters, `root` included.
pub fn upstream_of(registry: &Registry, root: IndicatorId) -> Vec<IndicatorId> {
    let graph = parameter_graph(registry);
    if !graph.contains_node(root) {
        return Vec::new();
    }
    let mut dfs = petgraph::visit::Dfs::new(&graph, root);
    let mut found = Vec::new();
    while let Some(node) = dfs.next(&graph) {
        found.push(node);
    }
    found.sort();
    found
}
