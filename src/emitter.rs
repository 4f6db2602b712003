//! Canonical components + dependency edges → an ordered, portable [`Bundle`].
//!
//! Artifacts come out in dependency order (workloads, then services, then routes;
//! by id within each group) and each one is a self-contained Kubernetes document.
//! The same input always renders to the same bytes.

use log::debug;
use std::collections::{BTreeMap, BTreeSet};

use crate::component::{CanonicalComponent, ComponentId, ComponentSpec, ServicePort};
use crate::error::{ConvertError, Result};
use crate::graph::{topological_order, DependencyEdge, EdgeVia};
use crate::kube;
use crate::resource::{IntOrString, Labels};

/// Label key that replaces the cluster's own workload-identity keys.
pub const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";

/// Label keys the cluster attaches to workload pods on its own.
const CLUSTER_ONLY_LABEL_KEYS: &[&str] =
    &["deploymentconfig", "openshift.io/deployment-config.name"];

/// Rewrites cluster-only keys to [`INSTANCE_LABEL`].
///
/// Each key is mapped on its own, so a selector rewritten separately still matches
/// the rewritten labels it matched before. Keys that land on [`INSTANCE_LABEL`]
/// with different values are a conflict for `id`.
pub fn portable_labels(id: &ComponentId, labels: &Labels) -> Result<Labels> {
    let mut portable = Labels::new();
    for (key, value) in labels {
        let key = if CLUSTER_ONLY_LABEL_KEYS.contains(&key.as_str()) {
            INSTANCE_LABEL
        } else {
            key.as_str()
        };
        match portable.get(key) {
            Some(existing) if existing != value => {
                return Err(ConvertError::kind_conflict(
                    id,
                    format!("label '{}' would be both '{}' and '{}'", key, existing, value),
                ));
            }
            _ => {
                portable.insert(key.to_string(), value.clone());
            }
        }
    }
    Ok(portable)
}

/// Output names carry no namespace, so one bundle holds a single namespace.
fn check_single_namespace(components: &[CanonicalComponent]) -> Result<()> {
    let namespaces: BTreeSet<&str> = components.iter().map(|c| c.id.namespace()).collect();
    let Some(expected) = namespaces.first().copied() else {
        return Ok(());
    };
    let stray = components
        .iter()
        .filter(|component| component.id.namespace() != expected)
        .map(|component| &component.id)
        .min();
    match stray {
        Some(id) => Err(ConvertError::kind_conflict(
            id,
            format!(
                "project resources span namespaces {}; a bundle holds one namespace",
                namespaces.into_iter().collect::<Vec<_>>().join(", ")
            ),
        )),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub id: ComponentId,
    pub document: kube::Document,
}

impl Artifact {
    /// Pretty JSON with a trailing newline.
    pub fn render(&self) -> std::result::Result<String, serde_json::Error> {
        let mut rendered = serde_json::to_string_pretty(&self.document)?;
        rendered.push('\n');
        Ok(rendered)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Position of the component's artifact in [`Bundle::artifacts`].
    pub artifact: usize,
    /// Direct dependencies, sorted.
    pub depends_on: Vec<ComponentId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<ComponentId, ManifestEntry>,
}

impl Manifest {
    pub fn get(&self, id: &ComponentId) -> Option<&ManifestEntry> {
        self.entries.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ComponentId, &ManifestEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Output of one conversion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub artifacts: Vec<Artifact>,
    pub manifest: Manifest,
}

impl Bundle {
    /// The manifest entry for an artifact, by emission position.
    pub fn entry_for(&self, artifact: &Artifact) -> Option<&ManifestEntry> {
        self.manifest.get(&artifact.id)
    }
}

pub fn emit(components: &[CanonicalComponent], edges: &BTreeSet<DependencyEdge>) -> Result<Bundle> {
    check_single_namespace(components)?;
    let order = topological_order(components, edges)?;
    let by_id: BTreeMap<&ComponentId, &CanonicalComponent> =
        components.iter().map(|component| (&component.id, component)).collect();

    let mut artifacts = Vec::with_capacity(order.len());
    let mut entries = BTreeMap::new();
    for id in order {
        let component = by_id
            .get(&id)
            .copied()
            .ok_or_else(|| ConvertError::InconsistentGraph(format!("{} has no component", id)))?;

        let depends_on: Vec<ComponentId> = edges
            .iter()
            .filter(|edge| edge.from == id)
            .map(|edge| edge.to.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let document = match &component.spec {
            ComponentSpec::Workload { .. } => kube::Document::Deployment(deployment(component)?),
            ComponentSpec::Service { .. } => kube::Document::Service(service(component)?),
            ComponentSpec::Route { .. } => {
                let target = edges
                    .iter()
                    .find(|edge| edge.from == id && edge.via == EdgeVia::RouteTarget)
                    .and_then(|edge| by_id.get(&edge.to).copied())
                    .ok_or_else(|| {
                        ConvertError::InconsistentGraph(format!("{} has no target service", id))
                    })?;
                kube::Document::Ingress(ingress(component, target)?)
            }
        };
        debug!("Emitting {} as {} '{}'", id, document.kind(), document.name());

        entries.insert(
            id.clone(),
            ManifestEntry {
                artifact: artifacts.len(),
                depends_on,
            },
        );
        artifacts.push(Artifact { id, document });
    }

    Ok(Bundle {
        artifacts,
        manifest: Manifest { entries },
    })
}

fn metadata(component: &CanonicalComponent) -> Result<kube::ObjectMeta> {
    Ok(kube::ObjectMeta {
        name: component.id.name().to_string(),
        labels: portable_labels(&component.id, &component.labels)?,
    })
}

fn deployment(component: &CanonicalComponent) -> Result<kube::Deployment> {
    let (replicas, containers) = match &component.spec {
        ComponentSpec::Workload {
            replicas,
            containers,
        } => (*replicas, containers.as_slice()),
        _ => (0, &[][..]),
    };

    let mut pod_labels = portable_labels(&component.id, &component.labels)?;
    let mut selector = portable_labels(&component.id, &component.selector)?;
    if selector.is_empty() {
        let instance = pod_labels
            .get(INSTANCE_LABEL)
            .cloned()
            .unwrap_or_else(|| component.id.name().to_string());
        selector.insert(INSTANCE_LABEL.to_string(), instance);
    }
    // Pods must carry every label the selector asks for.
    for (key, value) in &selector {
        match pod_labels.get(key) {
            Some(existing) if existing != value => {
                return Err(ConvertError::kind_conflict(
                    &component.id,
                    format!(
                        "pod label '{}' is '{}' but the selector asks for '{}'",
                        key, existing, value
                    ),
                ));
            }
            _ => {
                pod_labels.insert(key.clone(), value.clone());
            }
        }
    }

    Ok(kube::Deployment {
        api_version: "apps/v1",
        kind: "Deployment",
        metadata: metadata(component)?,
        spec: kube::DeploymentSpec {
            replicas,
            selector: kube::LabelSelector {
                match_labels: selector,
            },
            template: kube::PodTemplateSpec {
                metadata: kube::TemplateMeta { labels: pod_labels },
                spec: kube::PodSpec {
                    containers: containers
                        .iter()
                        .map(|container| kube::Container {
                            name: container.name.clone(),
                            image: container.image.clone(),
                            command: container.command.clone(),
                            args: container.args.clone(),
                            ports: container
                                .ports
                                .iter()
                                .map(|port| kube::ContainerPort {
                                    container_port: port.port,
                                    protocol: port.protocol.clone(),
                                    name: port.name.clone(),
                                })
                                .collect(),
                            env: container
                                .env
                                .iter()
                                .map(|(name, value)| kube::EnvVar {
                                    name: name.clone(),
                                    value: value.clone(),
                                })
                                .collect(),
                        })
                        .collect(),
                },
            },
        },
    })
}

fn service(component: &CanonicalComponent) -> Result<kube::Service> {
    let (service_type, ports) = match &component.spec {
        ComponentSpec::Service {
            service_type,
            ports,
        } => (service_type.clone(), ports.as_slice()),
        _ => (None, &[][..]),
    };

    Ok(kube::Service {
        api_version: "v1",
        kind: "Service",
        metadata: metadata(component)?,
        spec: kube::ServiceSpec {
            service_type,
            selector: portable_labels(&component.id, &component.selector)?,
            ports: ports
                .iter()
                .map(|port| kube::ServicePort {
                    name: port.name.clone(),
                    port: port.port,
                    target_port: port.target_port.clone(),
                    protocol: port.protocol.clone(),
                })
                .collect(),
        },
    })
}

/// Picks the service port a route sends traffic to.
///
/// A route naming one of the service's ports keeps that name; anything else is
/// resolved to the port number.
fn backend_port(
    route: &ComponentId,
    wanted: Option<&IntOrString>,
    ports: &[ServicePort],
) -> Result<kube::ServiceBackendPort> {
    let number = |port: &ServicePort| kube::ServiceBackendPort::Number(port.port);
    let found = match wanted {
        None => ports.first().map(number),
        Some(IntOrString::Int(wanted)) => ports
            .iter()
            .find(|port| port.target_port == IntOrString::Int(*wanted))
            .or_else(|| ports.iter().find(|port| i32::from(port.port) == *wanted))
            .map(number),
        Some(IntOrString::String(name)) => {
            if ports.iter().any(|port| port.name.as_deref() == Some(name.as_str())) {
                Some(kube::ServiceBackendPort::Name(name.clone()))
            } else {
                ports
                    .iter()
                    .find(|port| port.target_port == IntOrString::String(name.clone()))
                    .map(number)
            }
        }
    };
    found.ok_or_else(|| {
        let wanted = wanted
            .map(|port| format!("port '{}'", port))
            .unwrap_or_else(|| "a port".to_string());
        ConvertError::kind_conflict(route, format!("target service exposes no {}", wanted))
    })
}

fn ingress(component: &CanonicalComponent, target: &CanonicalComponent) -> Result<kube::Ingress> {
    let ComponentSpec::Route {
        host,
        path,
        target_port,
        tls_termination,
        ..
    } = &component.spec
    else {
        return Err(ConvertError::InconsistentGraph(format!(
            "{} is not a route",
            component.id
        )));
    };
    let ComponentSpec::Service { ports, .. } = &target.spec else {
        return Err(ConvertError::kind_conflict(
            &component.id,
            format!("route target {} is not a service", target.id),
        ));
    };

    let port = backend_port(&component.id, target_port.as_ref(), ports)?;
    let tls = match (tls_termination, host) {
        (Some(_), Some(host)) => vec![kube::IngressTls {
            hosts: vec![host.clone()],
        }],
        _ => Vec::new(),
    };

    Ok(kube::Ingress {
        api_version: "networking.k8s.io/v1",
        kind: "Ingress",
        metadata: metadata(component)?,
        spec: kube::IngressSpec {
            tls,
            rules: vec![kube::IngressRule {
                host: host.clone(),
                http: kube::HttpIngressRuleValue {
                    paths: vec![kube::HttpIngressPath {
                        path: path.clone().unwrap_or_else(|| "/".to_string()),
                        path_type: "Prefix",
                        backend: kube::IngressBackend {
                            service: kube::IngressServiceBackend {
                                name: target.id.name().to_string(),
                                port,
                            },
                        },
                    }],
                },
            }],
        },
    })
}
