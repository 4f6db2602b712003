//! Raw project resources as delivered by a cluster reader.
//!
//! The reader hands over an OpenShift `List` document (the output of
//! `oc get imagestreams,deploymentconfigs,services,routes -o json`). [`decode_list`]
//! turns it into [`RawResource`] records, keeping only the fields the normalizer
//! looks at. Everything else the cluster reports (status blocks, cluster IPs,
//! config-change triggers, annotations) is dropped here.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ConvertError, Result};

pub type Labels = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RawKind {
    ImageStream,
    DeploymentConfig,
    Service,
    Route,
}

impl fmt::Display for RawKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RawKind::ImageStream => "ImageStream",
            RawKind::DeploymentConfig => "DeploymentConfig",
            RawKind::Service => "Service",
            RawKind::Route => "Route",
        };
        f.write_str(name)
    }
}

/// A port given either as a number or as a named port.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntOrString {
    Int(i32),
    String(String),
}

impl fmt::Display for IntOrString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntOrString::Int(value) => write!(f, "{}", value),
            IntOrString::String(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default)]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagReference {
    pub name: String,
    #[serde(default)]
    pub from: Option<ObjectReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagEvent {
    pub docker_image_reference: String,
    #[serde(default)]
    pub image: String,
}

/// Resolution history for one tag, newest event first.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagHistory {
    pub tag: String,
    #[serde(default)]
    pub items: Vec<TagEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageStreamSpec {
    /// Host/path of the stream inside the cluster registry.
    pub docker_image_repository: Option<String>,
    pub tags: Vec<TagReference>,
    pub history: Vec<TagHistory>,
}

impl ImageStreamSpec {
    pub fn tag(&self, name: &str) -> Option<&TagReference> {
        self.tags.iter().find(|tag| tag.name == name)
    }

    pub fn history(&self, tag: &str) -> Option<&TagHistory> {
        self.history.iter().find(|history| history.tag == tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    pub container_port: u16,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub value_from: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContainer {
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub ports: Vec<ContainerPort>,
    #[serde(default)]
    pub env: Vec<EnvVar>,
    #[serde(default)]
    pub command: Option<Vec<String>>,
    #[serde(default)]
    pub args: Option<Vec<String>>,
}

/// An `ImageChange` trigger: which containers take their image from which stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageChangeTrigger {
    #[serde(default)]
    pub container_names: Vec<String>,
    pub from: ObjectReference,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentConfigSpec {
    pub replicas: i32,
    pub template_labels: Labels,
    pub containers: Vec<RawContainer>,
    pub image_triggers: Vec<ImageChangeTrigger>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    #[serde(default)]
    pub name: Option<String>,
    pub port: u16,
    #[serde(default)]
    pub target_port: Option<IntOrString>,
    #[serde(default)]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceSpec {
    pub service_type: Option<String>,
    pub ports: Vec<ServicePort>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub host: Option<String>,
    pub path: Option<String>,
    pub to: ObjectReference,
    pub target_port: Option<IntOrString>,
    pub tls_termination: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSpec {
    ImageStream(ImageStreamSpec),
    DeploymentConfig(DeploymentConfigSpec),
    Service(ServiceSpec),
    Route(RouteSpec),
}

/// One project object as read from the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResource {
    pub name: String,
    pub namespace: String,
    pub labels: Labels,
    /// Present on Services and DeploymentConfigs; empty otherwise.
    pub selector: Labels,
    pub spec: RawSpec,
}

impl RawResource {
    pub fn kind(&self) -> RawKind {
        match self.spec {
            RawSpec::ImageStream(_) => RawKind::ImageStream,
            RawSpec::DeploymentConfig(_) => RawKind::DeploymentConfig,
            RawSpec::Service(_) => RawKind::Service,
            RawSpec::Route(_) => RawKind::Route,
        }
    }
}

/// Decodes an OpenShift `List` document into raw resources, in document order.
///
/// Items of kinds other than the four the converter reads are skipped.
pub fn decode_list(project: &str, document: &str) -> Result<Vec<RawResource>> {
    let list: wire::ObjectList = serde_json::from_str(document)?;
    if list.kind != "List" {
        return Err(ConvertError::cluster_access(
            project,
            format!("expected a document of kind 'List', got '{}'", list.kind),
        ));
    }

    let mut resources = Vec::with_capacity(list.items.len());
    for item in list.items {
        let kind = item
            .get("kind")
            .and_then(|kind| kind.as_str())
            .unwrap_or_default()
            .to_string();
        let resource: RawResource = match kind.as_str() {
            "ImageStream" => serde_json::from_value::<wire::ImageStream>(item)?.into(),
            "DeploymentConfig" => serde_json::from_value::<wire::DeploymentConfig>(item)?.into(),
            "Service" => serde_json::from_value::<wire::Service>(item)?.into(),
            "Route" => serde_json::from_value::<wire::Route>(item)?.into(),
            other => {
                debug!("Skipping list item of kind '{}'", other);
                continue;
            }
        };
        resources.push(resource);
    }

    debug!("Decoded {} resources for project {}", resources.len(), project);
    Ok(resources)
}

/// Shapes of the cluster's JSON documents.
mod wire {
    use super::*;

    #[derive(Deserialize)]
    pub struct ObjectList {
        pub kind: String,
        #[serde(default)]
        pub items: Vec<serde_json::Value>,
    }

    #[derive(Deserialize)]
    pub struct ObjectMeta {
        pub name: String,
        #[serde(default)]
        pub namespace: Option<String>,
        #[serde(default)]
        pub labels: Option<Labels>,
    }

    impl ObjectMeta {
        fn into_parts(self) -> (String, String, Labels) {
            (
                self.name,
                self.namespace.unwrap_or_default(),
                self.labels.unwrap_or_default(),
            )
        }
    }

    #[derive(Deserialize)]
    pub struct ImageStream {
        pub metadata: ObjectMeta,
        #[serde(default)]
        pub spec: Option<ImageStreamSpecWire>,
        #[serde(default)]
        pub status: Option<ImageStreamStatus>,
    }

    #[derive(Deserialize)]
    pub struct ImageStreamSpecWire {
        #[serde(default)]
        pub tags: Option<Vec<TagReference>>,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ImageStreamStatus {
        #[serde(default)]
        pub docker_image_repository: Option<String>,
        #[serde(default)]
        pub tags: Option<Vec<TagHistory>>,
    }

    impl From<ImageStream> for RawResource {
        fn from(stream: ImageStream) -> Self {
            let (name, namespace, labels) = stream.metadata.into_parts();
            let status = stream.status;
            let spec = ImageStreamSpec {
                docker_image_repository: status
                    .as_ref()
                    .and_then(|status| status.docker_image_repository.clone())
                    .filter(|repository| !repository.is_empty()),
                tags: stream.spec.and_then(|spec| spec.tags).unwrap_or_default(),
                history: status.and_then(|status| status.tags).unwrap_or_default(),
            };
            RawResource {
                name,
                namespace,
                labels,
                selector: Labels::new(),
                spec: RawSpec::ImageStream(spec),
            }
        }
    }

    #[derive(Deserialize)]
    pub struct DeploymentConfig {
        pub metadata: ObjectMeta,
        pub spec: DeploymentConfigSpecWire,
    }

    #[derive(Deserialize)]
    pub struct DeploymentConfigSpecWire {
        #[serde(default)]
        pub replicas: Option<i32>,
        #[serde(default)]
        pub selector: Option<Labels>,
        #[serde(default)]
        pub template: Option<PodTemplate>,
        #[serde(default)]
        pub triggers: Option<Vec<Trigger>>,
    }

    #[derive(Deserialize)]
    pub struct PodTemplate {
        #[serde(default)]
        pub metadata: Option<TemplateMeta>,
        #[serde(default)]
        pub spec: Option<PodSpec>,
    }

    #[derive(Deserialize)]
    pub struct TemplateMeta {
        #[serde(default)]
        pub labels: Option<Labels>,
    }

    #[derive(Deserialize)]
    pub struct PodSpec {
        #[serde(default)]
        pub containers: Vec<RawContainer>,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Trigger {
        #[serde(rename = "type")]
        pub trigger_type: String,
        #[serde(default)]
        pub image_change_params: Option<ImageChangeTrigger>,
    }

    impl From<DeploymentConfig> for RawResource {
        fn from(config: DeploymentConfig) -> Self {
            let (name, namespace, labels) = config.metadata.into_parts();
            let spec = config.spec;
            let (template_labels, containers) = match spec.template {
                Some(template) => (
                    template
                        .metadata
                        .and_then(|meta| meta.labels)
                        .unwrap_or_default(),
                    template.spec.map(|pod| pod.containers).unwrap_or_default(),
                ),
                None => (Labels::new(), Vec::new()),
            };
            let image_triggers = spec
                .triggers
                .unwrap_or_default()
                .into_iter()
                .filter(|trigger| trigger.trigger_type == "ImageChange")
                .filter_map(|trigger| trigger.image_change_params)
                .collect();

            RawResource {
                name,
                namespace,
                labels,
                selector: spec.selector.unwrap_or_default(),
                spec: RawSpec::DeploymentConfig(DeploymentConfigSpec {
                    replicas: spec.replicas.unwrap_or(1),
                    template_labels,
                    containers,
                    image_triggers,
                }),
            }
        }
    }

    #[derive(Deserialize)]
    pub struct Service {
        pub metadata: ObjectMeta,
        pub spec: ServiceSpecWire,
    }

    #[derive(Deserialize)]
    pub struct ServiceSpecWire {
        #[serde(default)]
        pub selector: Option<Labels>,
        #[serde(default)]
        pub ports: Option<Vec<ServicePort>>,
        #[serde(default, rename = "type")]
        pub service_type: Option<String>,
    }

    impl From<Service> for RawResource {
        fn from(service: Service) -> Self {
            let (name, namespace, labels) = service.metadata.into_parts();
            RawResource {
                name,
                namespace,
                labels,
                selector: service.spec.selector.unwrap_or_default(),
                spec: RawSpec::Service(ServiceSpec {
                    service_type: service.spec.service_type,
                    ports: service.spec.ports.unwrap_or_default(),
                }),
            }
        }
    }

    #[derive(Deserialize)]
    pub struct Route {
        pub metadata: ObjectMeta,
        pub spec: RouteSpecWire,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RouteSpecWire {
        #[serde(default)]
        pub host: Option<String>,
        #[serde(default)]
        pub path: Option<String>,
        pub to: ObjectReference,
        #[serde(default)]
        pub port: Option<RoutePort>,
        #[serde(default)]
        pub tls: Option<RouteTls>,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RoutePort {
        pub target_port: IntOrString,
    }

    #[derive(Deserialize)]
    pub struct RouteTls {
        #[serde(default)]
        pub termination: Option<String>,
    }

    impl From<Route> for RawResource {
        fn from(route: Route) -> Self {
            let (name, namespace, labels) = route.metadata.into_parts();
            let spec = route.spec;
            RawResource {
                name,
                namespace,
                labels,
                selector: Labels::new(),
                spec: RawSpec::Route(RouteSpec {
                    host: spec.host.filter(|host| !host.is_empty()),
                    path: spec.path.filter(|path| !path.is_empty()),
                    to: spec.to,
                    target_port: spec.port.map(|port| port.target_port),
                    tls_termination: spec
                        .tls
                        .map(|tls| tls.termination.unwrap_or_else(|| "edge".to_string())),
                }),
            }
        }
    }
}
