//! Dependency graph between canonical components.
//!
//! Edges always point from a dependent to what it needs: a Route depends on the
//! Service it targets, a Service depends on every Workload its selector picks.
//! Since edges only ever go Route → Service → Workload the graph cannot contain
//! a cycle; [`topological_order`] still checks, and reports a cycle as an
//! inconsistency rather than looping.

use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::component::{CanonicalComponent, ComponentId, ComponentKind};
use crate::error::{ConvertError, Result};
use crate::resource::Labels;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeVia {
    SelectorMatch,
    RouteTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DependencyEdge {
    pub from: ComponentId,
    pub to: ComponentId,
    pub via: EdgeVia,
}

/// Something odd about the project that does not stop the conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphWarning {
    /// A service with no selector; it is emitted but fronts nothing.
    EmptySelector(ComponentId),
    /// A service whose selector matches no workload.
    UnmatchedSelector(ComponentId),
    /// A workload no service fronts.
    OrphanedWorkload(ComponentId),
}

impl fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphWarning::EmptySelector(id) => {
                write!(f, "{} has an empty selector and will match no workload", id)
            }
            GraphWarning::UnmatchedSelector(id) => {
                write!(f, "{} selects no workload in the project", id)
            }
            GraphWarning::OrphanedWorkload(id) => {
                write!(f, "{} is not fronted by any service", id)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    pub edges: BTreeSet<DependencyEdge>,
    pub warnings: Vec<GraphWarning>,
}

impl DependencyGraph {
    /// Direct dependencies of `id`.
    pub fn dependencies_of<'a>(
        &'a self,
        id: &'a ComponentId,
    ) -> impl Iterator<Item = &'a ComponentId> {
        self.edges
            .iter()
            .filter(move |edge| &edge.from == id)
            .map(|edge| &edge.to)
    }
}

/// True when every pair of a non-empty `selector` is present, byte for byte, in `labels`.
pub fn selector_matches(selector: &Labels, labels: &Labels) -> bool {
    !selector.is_empty()
        && selector
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
}

pub fn build_graph(components: &[CanonicalComponent]) -> Result<DependencyGraph> {
    let mut graph = DependencyGraph::default();

    let of_kind = |kind: ComponentKind| components.iter().filter(move |c| c.kind() == kind);

    for service in of_kind(ComponentKind::Service) {
        if service.selector.is_empty() {
            graph
                .warnings
                .push(GraphWarning::EmptySelector(service.id.clone()));
            continue;
        }

        let mut matched = 0;
        for workload in of_kind(ComponentKind::Workload) {
            if workload.id.namespace() == service.id.namespace()
                && selector_matches(&service.selector, &workload.labels)
            {
                debug!("{} selects {}", service.id, workload.id);
                graph.edges.insert(DependencyEdge {
                    from: service.id.clone(),
                    to: workload.id.clone(),
                    via: EdgeVia::SelectorMatch,
                });
                matched += 1;
            }
        }
        if matched == 0 {
            graph
                .warnings
                .push(GraphWarning::UnmatchedSelector(service.id.clone()));
        }
    }

    for route in of_kind(ComponentKind::Route) {
        let Some(target) = route.route_target() else {
            return Err(ConvertError::kind_conflict(
                &route.id,
                "route carries no target service",
            ));
        };

        let candidates: Vec<ComponentId> = of_kind(ComponentKind::Service)
            .filter(|service| service.id.name() == target)
            .map(|service| service.id.clone())
            .collect();

        let resolved = match candidates.as_slice() {
            [service] if service.namespace() == route.id.namespace() => Some(service.clone()),
            _ => None,
        };
        let Some(service) = resolved else {
            return Err(ConvertError::AmbiguousRouteTarget {
                route: route.id.clone(),
                target: target.to_string(),
                candidates,
            });
        };

        debug!("{} targets {}", route.id, service);
        graph.edges.insert(DependencyEdge {
            from: route.id.clone(),
            to: service,
            via: EdgeVia::RouteTarget,
        });
    }

    let fronted: BTreeSet<&ComponentId> = graph
        .edges
        .iter()
        .filter(|edge| edge.via == EdgeVia::SelectorMatch)
        .map(|edge| &edge.to)
        .collect();
    let orphans: Vec<GraphWarning> = of_kind(ComponentKind::Workload)
        .filter(|workload| !fronted.contains(&workload.id))
        .map(|workload| GraphWarning::OrphanedWorkload(workload.id.clone()))
        .collect();
    graph.warnings.extend(orphans);

    info!(
        "Built dependency graph: {} components, {} edges, {} warnings",
        components.len(),
        graph.edges.len(),
        graph.warnings.len()
    );
    Ok(graph)
}

/// Orders components so that every dependency comes before its dependents.
///
/// Among components that are free to go, the smallest id goes first, which puts
/// workloads before services before routes and sorts by name within a kind.
pub fn topological_order(
    components: &[CanonicalComponent],
    edges: &BTreeSet<DependencyEdge>,
) -> Result<Vec<ComponentId>> {
    let mut pending: BTreeMap<&ComponentId, usize> = BTreeMap::new();
    for component in components {
        if pending.insert(&component.id, 0).is_some() {
            return Err(ConvertError::InconsistentGraph(format!(
                "{} appears more than once",
                component.id
            )));
        }
    }

    let mut dependents: BTreeMap<&ComponentId, Vec<&ComponentId>> = BTreeMap::new();
    for edge in edges {
        for end in [&edge.from, &edge.to] {
            if !pending.contains_key(end) {
                return Err(ConvertError::InconsistentGraph(format!(
                    "edge {} -> {} references unknown component {}",
                    edge.from, edge.to, end
                )));
            }
        }
        if let Some(count) = pending.get_mut(&edge.from) {
            *count += 1;
        }
        dependents.entry(&edge.to).or_default().push(&edge.from);
    }

    let mut ready: BTreeSet<&ComponentId> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(components.len());

    while let Some(id) = ready.pop_first() {
        order.push(id.clone());
        for dependent in dependents.get(id).into_iter().flatten() {
            if let Some(count) = pending.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    if order.len() != components.len() {
        return Err(ConvertError::InconsistentGraph(format!(
            "dependency cycle among {} components",
            components.len() - order.len()
        )));
    }
    Ok(order)
}
