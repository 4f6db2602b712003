//! Canonical, cluster-independent components.

use serde::{Serialize, Serializer};
use std::fmt;

use crate::resource::{IntOrString, Labels};

/// Kind of a canonical component. Ordering is the emission order: workloads first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentKind {
    Workload,
    Service,
    Route,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Workload => "workload",
            ComponentKind::Service => "service",
            ComponentKind::Route => "route",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identity of a component, derived from its kind, namespace and name.
///
/// Ordered by kind, then name, then namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId {
    kind: ComponentKind,
    name: String,
    namespace: String,
}

impl ComponentId {
    pub fn new(kind: ComponentKind, namespace: &str, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

impl Serialize for ComponentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerPort {
    pub port: u16,
    pub protocol: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub name: String,
    /// Public registry pull string.
    pub image: String,
    pub ports: Vec<ContainerPort>,
    /// Literal environment values only.
    pub env: Vec<(String, String)>,
    pub command: Option<Vec<String>>,
    pub args: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePort {
    pub name: Option<String>,
    pub port: u16,
    pub target_port: IntOrString,
    pub protocol: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentSpec {
    Workload {
        replicas: i32,
        containers: Vec<Container>,
    },
    Service {
        service_type: Option<String>,
        ports: Vec<ServicePort>,
    },
    Route {
        host: Option<String>,
        path: Option<String>,
        target_service: String,
        target_port: Option<IntOrString>,
        tls_termination: Option<String>,
    },
}

/// A normalized project object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalComponent {
    pub id: ComponentId,
    /// Ordered, de-duplicated ports.
    pub ports: Vec<u16>,
    /// For workloads, the labels its pods carry.
    pub labels: Labels,
    pub selector: Labels,
    pub spec: ComponentSpec,
}

impl CanonicalComponent {
    pub fn kind(&self) -> ComponentKind {
        self.id.kind()
    }

    /// Image of the first container; `None` for services and routes.
    pub fn image(&self) -> Option<&str> {
        match &self.spec {
            ComponentSpec::Workload { containers, .. } => {
                containers.first().map(|container| container.image.as_str())
            }
            _ => None,
        }
    }

    pub fn route_target(&self) -> Option<&str> {
        match &self.spec {
            ComponentSpec::Route { target_service, .. } => Some(target_service),
            _ => None,
        }
    }
}
