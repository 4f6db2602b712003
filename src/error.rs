//! Errors raised by the conversion core.
//!
//! Every variant is fatal to the run: the pipeline stops at the stage that detected
//! it and no bundle is produced.

use thiserror::Error;

use crate::component::ComponentId;

#[derive(Error, Debug)]
pub enum ConvertError {
    /// The cluster reader could not deliver the project's resources.
    #[error("Cannot read resources of project '{project}': {message}")]
    ClusterAccess { project: String, message: String },

    /// The reader got a document it cannot decode.
    #[error("Malformed cluster document: {0}")]
    Decode(#[from] serde_json::Error),

    /// A workload image was built in-cluster and has no public registry reference.
    #[error("Unsupported image source for {component}: {reason}")]
    UnsupportedSource {
        component: ComponentId,
        reason: String,
    },

    #[error("Kind conflict for {component}: {reason}")]
    KindConflict {
        component: ComponentId,
        reason: String,
    },

    /// A route target resolved to zero or several services, or to one outside the
    /// route's namespace.
    #[error(
        "Route {route} must target exactly one service named '{target}' in its namespace, found [{}]",
        join_ids(.candidates)
    )]
    AmbiguousRouteTarget {
        route: ComponentId,
        target: String,
        candidates: Vec<ComponentId>,
    },

    #[error("Inconsistent dependency graph: {0}")]
    InconsistentGraph(String),
}

impl ConvertError {
    pub fn cluster_access(project: &str, message: impl Into<String>) -> Self {
        ConvertError::ClusterAccess {
            project: project.to_string(),
            message: message.into(),
        }
    }

    pub fn unsupported(component: &ComponentId, reason: impl Into<String>) -> Self {
        ConvertError::UnsupportedSource {
            component: component.clone(),
            reason: reason.into(),
        }
    }

    pub fn kind_conflict(component: &ComponentId, reason: impl Into<String>) -> Self {
        ConvertError::KindConflict {
            component: component.clone(),
            reason: reason.into(),
        }
    }
}

fn join_ids(ids: &[ComponentId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentKind;

    #[test]
    fn test_messages_name_the_component() {
        let id = ComponentId::new(ComponentKind::Workload, "demo", "app");
        let err = ConvertError::unsupported(&id, "image built in-cluster");
        assert_eq!(
            err.to_string(),
            "Unsupported image source for workload/demo/app: image built in-cluster"
        );

        let route = ComponentId::new(ComponentKind::Route, "demo", "app-route");
        let err = ConvertError::AmbiguousRouteTarget {
            route,
            target: "app-svc".to_string(),
            candidates: vec![
                ComponentId::new(ComponentKind::Service, "demo", "app-svc"),
                ComponentId::new(ComponentKind::Service, "other", "app-svc"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Route route/demo/app-route must target exactly one service named 'app-svc' \
             in its namespace, found [service/demo/app-svc, service/other/app-svc]"
        );
    }

    #[test]
    fn test_cluster_access_is_verbatim() {
        let err = ConvertError::cluster_access("demo", "error: You must be logged in");
        assert_eq!(
            err.to_string(),
            "Cannot read resources of project 'demo': error: You must be logged in"
        );
    }
}
