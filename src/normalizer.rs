//! Raw cluster records → canonical components.
//!
//! [`Normalizer::normalize`] is total over well-formed input: every DeploymentConfig,
//! Service and Route yields exactly one [`CanonicalComponent`]. ImageStreams are
//! consumed while resolving workload images and yield nothing themselves. The
//! result is sorted by component id (kind, then name) so later stages see the same
//! order for the same project regardless of how the cluster listed it.

use log::{debug, trace};
use std::collections::{BTreeMap, BTreeSet};

use crate::component::{
    CanonicalComponent, ComponentId, ComponentKind, ComponentSpec, Container, ContainerPort,
    ServicePort,
};
use crate::error::{ConvertError, Result};
use crate::registry::InternalRegistries;
use crate::resource::{
    DeploymentConfigSpec, ImageStreamSpec, IntOrString, ObjectReference, RawResource, RawSpec,
    RouteSpec, ServiceSpec,
};

/// Maximum number of tag-to-tag hops followed inside image streams.
const MAX_TAG_HOPS: usize = 5;

type StreamIndex<'a> = BTreeMap<(&'a str, &'a str), &'a ImageStreamSpec>;

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    internal_registries: Vec<String>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry hosts to treat as cluster-internal on top of the ones image streams report.
    pub fn with_internal_registries(hosts: Vec<String>) -> Self {
        Self {
            internal_registries: hosts,
        }
    }

    pub fn normalize(&self, raw: Vec<RawResource>) -> Result<Vec<CanonicalComponent>> {
        let registries = InternalRegistries::discover(&raw, &self.internal_registries);
        debug!(
            "Internal registries: {:?}",
            registries.hosts().collect::<Vec<_>>()
        );

        let streams: StreamIndex = raw
            .iter()
            .filter_map(|resource| match &resource.spec {
                RawSpec::ImageStream(stream) => Some((
                    (resource.namespace.as_str(), resource.name.as_str()),
                    stream,
                )),
                _ => None,
            })
            .collect();

        let resolver = ImageResolver {
            streams: &streams,
            registries: &registries,
        };

        let mut seen = BTreeSet::new();
        let mut components = Vec::new();
        for resource in &raw {
            let component = match &resource.spec {
                RawSpec::ImageStream(_) => continue,
                RawSpec::DeploymentConfig(spec) => normalize_workload(resource, spec, &resolver)?,
                RawSpec::Service(spec) => normalize_service(resource, spec),
                RawSpec::Route(spec) => normalize_route(resource, spec)?,
            };
            if !seen.insert(component.id.clone()) {
                return Err(ConvertError::kind_conflict(
                    &component.id,
                    "more than one resource maps to this component",
                ));
            }
            trace!("Normalized {} {} as {}", resource.kind(), resource.name, component.id);
            components.push(component);
        }

        components.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(components)
    }
}

struct ImageResolver<'a> {
    streams: &'a StreamIndex<'a>,
    registries: &'a InternalRegistries,
}

impl ImageResolver<'_> {
    /// Follows an `ImageChange` trigger source to a public pull string.
    fn resolve(
        &self,
        from: &ObjectReference,
        namespace: &str,
        hops: usize,
    ) -> std::result::Result<String, String> {
        if hops > MAX_TAG_HOPS {
            return Err(format!("image stream tag '{}' aliases too deeply", from.name));
        }
        let namespace = from.namespace.as_deref().unwrap_or(namespace);
        match from.kind.as_str() {
            "DockerImage" => self.registries.public_reference(&from.name),
            "ImageStreamTag" => {
                let (stream_name, tag) = from
                    .name
                    .split_once(':')
                    .unwrap_or((from.name.as_str(), "latest"));
                let stream = self.stream(namespace, stream_name)?;

                let resolved = stream
                    .history(tag)
                    .and_then(|history| history.items.first())
                    .map(|event| event.docker_image_reference.as_str());
                if let Some(reference) = resolved {
                    if let Ok(public) = self.registries.public_reference(reference) {
                        return Ok(public);
                    }
                }

                match stream.tag(tag).and_then(|tag| tag.from.as_ref()) {
                    Some(source) if source.kind == "ImageStreamTag" => {
                        // Alias of another tag; same-stream aliases name only the tag.
                        let aliased = if source.name.contains(':') {
                            source.clone()
                        } else {
                            ObjectReference {
                                name: format!("{}:{}", stream_name, source.name),
                                ..source.clone()
                            }
                        };
                        self.resolve(&aliased, namespace, hops + 1)
                    }
                    Some(source) if source.kind == "DockerImage" => {
                        self.registries.public_reference(&source.name)
                    }
                    _ => match resolved {
                        Some(reference) => Err(format!(
                            "tag '{}' resolves to '{}' and no public mirror is recorded",
                            from.name, reference
                        )),
                        None => Err(format!("tag '{}' has never been resolved", from.name)),
                    },
                }
            }
            "ImageStreamImage" => {
                let (stream_name, digest) = from
                    .name
                    .split_once('@')
                    .ok_or_else(|| format!("malformed image stream image '{}'", from.name))?;
                let stream = self.stream(namespace, stream_name)?;
                let event = stream
                    .history
                    .iter()
                    .flat_map(|history| history.items.iter())
                    .find(|event| event.image == digest)
                    .ok_or_else(|| format!("image '{}' is not recorded in its stream", from.name))?;
                self.registries.public_reference(&event.docker_image_reference)
            }
            other => Err(format!("unsupported image source kind '{}'", other)),
        }
    }

    fn stream(&self, namespace: &str, name: &str) -> std::result::Result<&ImageStreamSpec, String> {
        self.streams
            .get(&(namespace, name))
            .copied()
            .ok_or_else(|| {
                format!(
                    "image stream '{}/{}' is not part of the project",
                    namespace, name
                )
            })
    }
}

fn normalize_workload(
    resource: &RawResource,
    spec: &DeploymentConfigSpec,
    resolver: &ImageResolver,
) -> Result<CanonicalComponent> {
    let id = ComponentId::new(ComponentKind::Workload, &resource.namespace, &resource.name);
    if spec.containers.is_empty() {
        return Err(ConvertError::unsupported(&id, "the pod template has no containers"));
    }

    let mut ports = Vec::new();
    let mut containers = Vec::with_capacity(spec.containers.len());
    for raw in &spec.containers {
        let trigger = spec
            .image_triggers
            .iter()
            .find(|trigger| trigger.container_names.iter().any(|name| *name == raw.name));
        let image = match trigger {
            Some(trigger) => resolver.resolve(&trigger.from, &resource.namespace, 0),
            None => resolver.registries.public_reference(&raw.image),
        }
        .map_err(|reason| {
            ConvertError::unsupported(&id, format!("container '{}': {}", raw.name, reason))
        })?;

        let mut container_ports: Vec<ContainerPort> = Vec::new();
        for port in &raw.ports {
            if !ports.contains(&port.container_port) {
                ports.push(port.container_port);
            }
            if container_ports.iter().all(|seen| seen.port != port.container_port) {
                container_ports.push(ContainerPort {
                    port: port.container_port,
                    protocol: port.protocol.clone().unwrap_or_else(|| "TCP".to_string()),
                    name: port.name.clone(),
                });
            }
        }

        let mut env = Vec::new();
        for var in &raw.env {
            match (&var.value, &var.value_from) {
                (_, Some(_)) => debug!(
                    "{}: dropping env '{}' sourced from a cluster object",
                    id, var.name
                ),
                (value, None) => env.push((var.name.clone(), value.clone().unwrap_or_default())),
            }
        }

        containers.push(Container {
            name: raw.name.clone(),
            image,
            ports: container_ports,
            env,
            command: raw.command.clone(),
            args: raw.args.clone(),
        });
    }

    let labels = if spec.template_labels.is_empty() {
        resource.selector.clone()
    } else {
        spec.template_labels.clone()
    };

    Ok(CanonicalComponent {
        id,
        ports,
        labels,
        selector: resource.selector.clone(),
        spec: ComponentSpec::Workload {
            replicas: spec.replicas,
            containers,
        },
    })
}

fn normalize_service(resource: &RawResource, spec: &ServiceSpec) -> CanonicalComponent {
    let mut ports = Vec::new();
    let mut service_ports: Vec<ServicePort> = Vec::new();
    for port in &spec.ports {
        if ports.contains(&port.port) {
            continue;
        }
        ports.push(port.port);
        service_ports.push(ServicePort {
            name: port.name.clone(),
            port: port.port,
            target_port: port
                .target_port
                .clone()
                .unwrap_or(IntOrString::Int(i32::from(port.port))),
            protocol: port.protocol.clone().unwrap_or_else(|| "TCP".to_string()),
        });
    }

    CanonicalComponent {
        id: ComponentId::new(ComponentKind::Service, &resource.namespace, &resource.name),
        ports,
        labels: resource.labels.clone(),
        selector: resource.selector.clone(),
        spec: ComponentSpec::Service {
            service_type: spec.service_type.clone(),
            ports: service_ports,
        },
    }
}

fn normalize_route(resource: &RawResource, spec: &RouteSpec) -> Result<CanonicalComponent> {
    let id = ComponentId::new(ComponentKind::Route, &resource.namespace, &resource.name);
    if !spec.to.kind.is_empty() && spec.to.kind != "Service" {
        return Err(ConvertError::kind_conflict(
            &id,
            format!(
                "route targets {} '{}', only services can be route targets",
                spec.to.kind, spec.to.name
            ),
        ));
    }

    let ports = match &spec.target_port {
        Some(IntOrString::Int(port)) => u16::try_from(*port)
            .map(|port| vec![port])
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    Ok(CanonicalComponent {
        id,
        ports,
        labels: resource.labels.clone(),
        selector: Default::default(),
        spec: ComponentSpec::Route {
            host: spec.host.clone(),
            path: spec.path.clone(),
            target_service: spec.to.name.clone(),
            target_port: spec.target_port.clone(),
            tls_termination: spec.tls_termination.clone(),
        },
    })
}
