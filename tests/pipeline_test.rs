//! Normalize → graph → emit over saved project exports.

mod common;

use anyhow::Result;
use openshift2nulecule::component::{ComponentId, ComponentKind};
use openshift2nulecule::graph::{build_graph, topological_order, GraphWarning};
use openshift2nulecule::{convert_resources, ConvertError, Normalizer};
use std::collections::BTreeMap;

use common::{load, AMBIGUOUS_ROUTE, IN_CLUSTER_BUILD, MULTI_TIER, SCENARIO};

fn id(kind: ComponentKind, namespace: &str, name: &str) -> ComponentId {
    ComponentId::new(kind, namespace, name)
}

fn render_all(name: &str, project: &str) -> Result<Vec<String>> {
    let conversion = convert_resources(load(name, project), &Normalizer::new())?;
    Ok(conversion
        .bundle
        .artifacts
        .iter()
        .map(|artifact| artifact.render())
        .collect::<std::result::Result<_, _>>()?)
}

#[test]
fn test_scenario_orders_workload_service_route() -> Result<()> {
    let conversion = convert_resources(load(SCENARIO, "demo"), &Normalizer::new())?;
    let bundle = &conversion.bundle;

    let summary: Vec<(&str, &str)> = bundle
        .artifacts
        .iter()
        .map(|artifact| (artifact.document.kind(), artifact.document.name()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Deployment", "app"),
            ("Service", "app-svc"),
            ("Ingress", "app-route"),
        ]
    );

    let app = id(ComponentKind::Workload, "demo", "app");
    let svc = id(ComponentKind::Service, "demo", "app-svc");
    let route = id(ComponentKind::Route, "demo", "app-route");
    assert_eq!(bundle.manifest.len(), 3);
    assert!(bundle.manifest.get(&app).unwrap().depends_on.is_empty());
    assert_eq!(bundle.manifest.get(&svc).unwrap().depends_on, vec![app]);
    assert_eq!(bundle.manifest.get(&route).unwrap().depends_on, vec![svc]);
    assert!(conversion.warnings.is_empty());
    Ok(())
}

#[test]
fn test_scenario_resolves_public_image_and_portable_labels() -> Result<()> {
    let rendered = render_all(SCENARIO, "demo")?;
    let deployment: serde_json::Value = serde_json::from_str(&rendered[0])?;

    let container = &deployment["spec"]["template"]["spec"]["containers"][0];
    // The status history points at the internal registry; the tag's public source wins.
    assert_eq!(container["image"], "docker.io/example/app:1.0");
    assert_eq!(container["env"].as_array().map(Vec::len), Some(1));
    assert_eq!(container["env"][0]["name"], "MODE");

    assert_eq!(deployment["spec"]["replicas"], 2);
    let selector = &deployment["spec"]["selector"]["matchLabels"];
    assert_eq!(selector["app"], "app");
    assert_eq!(selector["app.kubernetes.io/instance"], "app");
    assert!(selector.get("deploymentconfig").is_none());
    assert!(!rendered.iter().any(|doc| doc.contains("172.30.1.1")));

    let ingress: serde_json::Value = serde_json::from_str(&rendered[2])?;
    let path = &ingress["spec"]["rules"][0]["http"]["paths"][0];
    assert_eq!(path["backend"]["service"]["name"], "app-svc");
    assert_eq!(path["backend"]["service"]["port"]["number"], 8080);
    Ok(())
}

#[test]
fn test_conversion_is_deterministic() -> Result<()> {
    for (name, project) in [(SCENARIO, "demo"), (MULTI_TIER, "shop")] {
        let first = render_all(name, project)?;
        let second = render_all(name, project)?;
        assert_eq!(first, second, "{} rendered differently", name);
    }

    // The order the cluster lists objects in does not matter either.
    let forward = convert_resources(load(MULTI_TIER, "shop"), &Normalizer::new())?;
    let mut reversed_input = load(MULTI_TIER, "shop");
    reversed_input.reverse();
    let reversed = convert_resources(reversed_input, &Normalizer::new())?;
    assert_eq!(forward.bundle, reversed.bundle);
    Ok(())
}

#[test]
fn test_multi_tier_emission_order() -> Result<()> {
    let conversion = convert_resources(load(MULTI_TIER, "shop"), &Normalizer::new())?;
    let summary: Vec<(&str, &str)> = conversion
        .bundle
        .artifacts
        .iter()
        .map(|artifact| (artifact.document.kind(), artifact.document.name()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Deployment", "backend"),
            ("Deployment", "database"),
            ("Deployment", "frontend"),
            ("Deployment", "worker"),
            ("Service", "backend"),
            ("Service", "database"),
            ("Service", "external-cache"),
            ("Service", "frontend"),
            ("Ingress", "api"),
            ("Ingress", "shop"),
        ]
    );

    assert_eq!(
        conversion.warnings,
        vec![
            GraphWarning::EmptySelector(id(ComponentKind::Service, "shop", "external-cache")),
            GraphWarning::OrphanedWorkload(id(ComponentKind::Workload, "shop", "worker")),
        ]
    );
    Ok(())
}

#[test]
fn test_every_dependency_is_emitted_first() -> Result<()> {
    let conversion = convert_resources(load(MULTI_TIER, "shop"), &Normalizer::new())?;
    let bundle = &conversion.bundle;

    let position: BTreeMap<&ComponentId, usize> = bundle
        .artifacts
        .iter()
        .enumerate()
        .map(|(index, artifact)| (&artifact.id, index))
        .collect();

    // One artifact per manifest entry, and each entry points at its own artifact.
    assert_eq!(position.len(), bundle.artifacts.len());
    assert_eq!(bundle.manifest.len(), bundle.artifacts.len());
    for (component, entry) in bundle.manifest.iter() {
        assert_eq!(&bundle.artifacts[entry.artifact].id, component);
        for dependency in &entry.depends_on {
            assert!(
                position[dependency] < entry.artifact,
                "{} is emitted after {}",
                dependency,
                component
            );
        }
    }
    Ok(())
}

#[test]
fn test_named_route_port_and_tls() -> Result<()> {
    let rendered = render_all(MULTI_TIER, "shop")?;
    let shop: serde_json::Value = serde_json::from_str(&rendered[9])?;
    assert_eq!(shop["metadata"]["name"], "shop");
    assert_eq!(shop["spec"]["tls"][0]["hosts"][0], "shop.example.com");
    let path = &shop["spec"]["rules"][0]["http"]["paths"][0];
    assert_eq!(path["path"], "/store");
    assert_eq!(path["backend"]["service"]["name"], "frontend");
    // The route names the service port, so the ingress does too.
    assert_eq!(path["backend"]["service"]["port"]["name"], "http");
    assert!(path["backend"]["service"]["port"].get("number").is_none());

    let api: serde_json::Value = serde_json::from_str(&rendered[8])?;
    let path = &api["spec"]["rules"][0]["http"]["paths"][0];
    assert_eq!(path["path"], "/");
    assert_eq!(path["backend"]["service"]["port"]["number"], 9000);
    assert!(api["spec"].get("tls").is_none());
    Ok(())
}

#[test]
fn test_route_target_in_two_namespaces_is_ambiguous() {
    let result = convert_resources(load(AMBIGUOUS_ROUTE, "demo"), &Normalizer::new());
    match result {
        Err(ConvertError::AmbiguousRouteTarget {
            route,
            target,
            candidates,
        }) => {
            assert_eq!(route, id(ComponentKind::Route, "demo", "app-route"));
            assert_eq!(target, "app-svc");
            assert_eq!(
                candidates,
                vec![
                    id(ComponentKind::Service, "demo", "app-svc"),
                    id(ComponentKind::Service, "staging", "app-svc"),
                ]
            );
        }
        other => panic!("expected an ambiguous route target, got {:?}", other),
    }
}

#[test]
fn test_in_cluster_build_is_unsupported() {
    let result = convert_resources(load(IN_CLUSTER_BUILD, "demo"), &Normalizer::new());
    match result {
        Err(ConvertError::UnsupportedSource { component, reason }) => {
            assert_eq!(component, id(ComponentKind::Workload, "demo", "builder"));
            assert!(reason.contains("builder"), "reason: {}", reason);
        }
        other => panic!("expected an unsupported source, got {:?}", other),
    }
}

#[test]
fn test_graph_is_acyclic_and_complete() -> Result<()> {
    let components = Normalizer::new().normalize(load(MULTI_TIER, "shop"))?;
    let graph = build_graph(&components)?;

    // Services point at workloads, routes at services; nothing points back.
    for edge in &graph.edges {
        assert!(edge.from.kind() > edge.to.kind(), "{} -> {}", edge.from, edge.to);
    }
    let order = topological_order(&components, &graph.edges)?;
    assert_eq!(order.len(), components.len());
    Ok(())
}
