//! Image reference helpers: parsing pull strings and telling the cluster's
//! internal registry apart from public ones.

use oci_spec::distribution::Reference;
use std::collections::BTreeSet;

use crate::resource::{RawResource, RawSpec};

/// Host suffixes that only resolve inside a cluster.
const CLUSTER_LOCAL_SUFFIXES: &[&str] = &[".svc", ".svc.cluster.local"];

/// Returns the registry host of a `host[:port]/path` repository string.
///
/// A first segment counts as a host only if it looks like one (has a dot or a port,
/// or is `localhost`), the same rule registries use for short names.
pub fn repository_host(repository: &str) -> Option<&str> {
    let (first, rest) = repository.split_once('/')?;
    if rest.is_empty() {
        return None;
    }
    if first.contains('.') || first.contains(':') || first == "localhost" {
        Some(first)
    } else {
        None
    }
}

/// The set of registry hosts that are private to the cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InternalRegistries {
    hosts: BTreeSet<String>,
}

impl InternalRegistries {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
        }
    }

    /// Collects the registry hosts image streams report for themselves.
    pub fn discover(resources: &[RawResource], extra: &[String]) -> Self {
        let mut registries = Self::new(extra.iter().cloned());
        for resource in resources {
            if let RawSpec::ImageStream(stream) = &resource.spec {
                if let Some(host) = stream
                    .docker_image_repository
                    .as_deref()
                    .and_then(repository_host)
                {
                    registries.hosts.insert(host.to_string());
                }
            }
        }
        registries
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(String::as_str)
    }

    /// A host listed without a port covers every port on that host; one listed
    /// with a port covers only that port.
    pub fn is_internal_host(&self, host: &str) -> bool {
        let bare = host.split(':').next().unwrap_or(host);
        self.hosts.contains(host)
            || self.hosts.contains(bare)
            || CLUSTER_LOCAL_SUFFIXES
                .iter()
                .any(|suffix| bare.ends_with(suffix))
    }

    /// Checks a pull string and returns it when it can be pulled from outside the cluster.
    pub fn public_reference(&self, image: &str) -> Result<String, String> {
        let image = image.trim();
        if image.is_empty() {
            return Err("no image reference recorded".to_string());
        }
        let reference: Reference = image
            .parse()
            .map_err(|e| format!("invalid image reference '{}': {}", image, e))?;
        if self.is_internal_host(reference.registry()) {
            return Err(format!(
                "image '{}' lives only in the internal registry {}",
                image,
                reference.registry()
            ));
        }
        Ok(image.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ImageStreamSpec, Labels};

    fn stream(repository: &str) -> RawResource {
        RawResource {
            name: "app".to_string(),
            namespace: "demo".to_string(),
            labels: Labels::new(),
            selector: Labels::new(),
            spec: RawSpec::ImageStream(ImageStreamSpec {
                docker_image_repository: Some(repository.to_string()),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_repository_host() {
        assert_eq!(
            repository_host("172.30.1.1:5000/demo/app"),
            Some("172.30.1.1:5000")
        );
        assert_eq!(
            repository_host("image-registry.openshift-image-registry.svc:5000/demo/app"),
            Some("image-registry.openshift-image-registry.svc:5000")
        );
        assert_eq!(repository_host("localhost/app"), Some("localhost"));
        assert_eq!(repository_host("example/app"), None);
        assert_eq!(repository_host("app"), None);
    }

    #[test]
    fn test_discover_collects_stream_registries() {
        let resources = vec![stream("172.30.1.1:5000/demo/app")];
        let extra = ["registry.corp:443".to_string()];
        let registries = InternalRegistries::discover(&resources, &extra);
        let hosts: Vec<&str> = registries.hosts().collect();
        assert_eq!(hosts, vec!["172.30.1.1:5000", "registry.corp:443"]);
    }

    #[test]
    fn test_public_reference() {
        let registries = InternalRegistries::new(["172.30.1.1:5000"]);

        assert_eq!(
            registries.public_reference("docker.io/example/app:1.0"),
            Ok("docker.io/example/app:1.0".to_string())
        );
        assert_eq!(
            registries.public_reference("nginx"),
            Ok("nginx".to_string())
        );

        let digest = "sha256:0f1e2d3c4b5a69788796a5b4c3d2e1f00f1e2d3c4b5a69788796a5b4c3d2e1f0";
        let internal = registries.public_reference(&format!("172.30.1.1:5000/demo/app@{}", digest));
        assert!(internal.unwrap_err().contains("internal registry"));

        let cluster_local = registries
            .public_reference("image-registry.openshift-image-registry.svc:5000/demo/app:latest");
        assert!(cluster_local.is_err());

        assert!(registries.public_reference("  ").is_err());
        assert!(registries.public_reference("UPPER/Case:tag").is_err());
    }

    #[test]
    fn test_host_without_port_covers_every_port() {
        let registries = InternalRegistries::new(["registry.corp", "172.30.1.1:5000"]);

        assert!(registries.is_internal_host("registry.corp"));
        assert!(registries.is_internal_host("registry.corp:5000"));
        assert!(registries.public_reference("registry.corp:5000/team/app:1.0").is_err());

        // A listed port is matched exactly.
        assert!(registries.is_internal_host("172.30.1.1:5000"));
        assert!(!registries.is_internal_host("172.30.1.1:5001"));
        assert!(!registries.is_internal_host("registry.corp.example.com"));
    }
}
