//! Persists a [`Bundle`] as a Nulecule application directory.
//!
//! ```text
//! <output>/
//!   Nulecule
//!   artifacts/kubernetes/01-app-deployment.json
//!   artifacts/kubernetes/02-app-svc-service.json
//!   ...
//! ```
//!
//! Everything is written to a staging directory next to `<output>` first and moved
//! into place once complete, so a failed write leaves no partial bundle behind.

use anyhow::{anyhow, Context, Result};
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::component::ComponentId;
use crate::emitter::Bundle;

pub const NULECULE_FILE: &str = "Nulecule";
pub const NULECULE_SPEC_VERSION: &str = "0.0.2";
pub const PROVIDER: &str = "kubernetes";

#[derive(Serialize)]
struct Nulecule<'a> {
    specversion: &'static str,
    id: &'a str,
    metadata: NuleculeMetadata,
    graph: Vec<GraphComponent>,
}

#[derive(Serialize)]
struct NuleculeMetadata {
    name: String,
    appversion: &'static str,
    description: String,
}

#[derive(Serialize)]
struct GraphComponent {
    name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dependencies: Vec<String>,
    artifacts: BTreeMap<&'static str, Vec<String>>,
}

/// Name of a component inside the Nulecule graph.
pub fn graph_name(id: &ComponentId) -> String {
    format!("{}-{}", id.name(), id.kind())
}

/// Path of an artifact relative to the bundle root.
pub fn artifact_path(index: usize, id: &ComponentId, kind: &str) -> PathBuf {
    Path::new("artifacts").join(PROVIDER).join(format!(
        "{:02}-{}-{}.json",
        index + 1,
        id.name(),
        kind.to_lowercase()
    ))
}

pub struct BundleWriter {
    output: PathBuf,
}

impl BundleWriter {
    pub fn new(output: &Path) -> Self {
        Self {
            output: output.to_path_buf(),
        }
    }

    /// Writes the bundle and returns the files created, relative to the output directory.
    pub fn write(&self, project: &str, bundle: &Bundle) -> Result<Vec<PathBuf>> {
        self.check_output()?;

        let parent = match self.output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
        let staging = tempfile::Builder::new()
            .prefix(".openshift2nulecule-")
            .tempdir_in(&parent)
            .context("Failed to create staging directory")?;
        debug!("Staging bundle in {}", staging.path().display());

        let mut written = Vec::with_capacity(bundle.artifacts.len() + 1);
        let mut graph = Vec::with_capacity(bundle.artifacts.len());
        for (index, artifact) in bundle.artifacts.iter().enumerate() {
            let relative = artifact_path(index, &artifact.id, artifact.document.kind());
            let path = staging.path().join(&relative);
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            let rendered = artifact
                .render()
                .with_context(|| format!("Failed to render {}", artifact.id))?;
            fs::write(&path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;

            let entry = bundle
                .entry_for(artifact)
                .ok_or_else(|| anyhow!("{} has no manifest entry", artifact.id))?;
            graph.push(GraphComponent {
                name: graph_name(&artifact.id),
                dependencies: entry.depends_on.iter().map(graph_name).collect(),
                artifacts: BTreeMap::from([(
                    PROVIDER,
                    vec![format!("file://{}", relative.display())],
                )]),
            });
            written.push(relative);
        }

        let nulecule = Nulecule {
            specversion: NULECULE_SPEC_VERSION,
            id: project,
            metadata: NuleculeMetadata {
                name: project.to_string(),
                appversion: "0.0.1",
                description: format!("Application exported from OpenShift project {}", project),
            },
            graph,
        };
        let document = serde_yaml::to_string(&nulecule).context("Failed to render Nulecule")?;
        fs::write(staging.path().join(NULECULE_FILE), document)
            .context("Failed to write Nulecule")?;
        written.insert(0, PathBuf::from(NULECULE_FILE));

        if self.output.exists() {
            fs::remove_dir(&self.output)
                .with_context(|| format!("Failed to replace {}", self.output.display()))?;
        }
        fs::rename(staging.path(), &self.output).with_context(|| {
            format!("Failed to move bundle into {}", self.output.display())
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.output, fs::Permissions::from_mode(0o755))?;
        }

        Ok(written)
    }

    /// The output must be absent or an empty directory.
    fn check_output(&self) -> Result<()> {
        if !self.output.exists() {
            return Ok(());
        }
        if !self.output.is_dir() {
            return Err(anyhow!(
                "Output path exists and is not a directory: {}",
                self.output.display()
            ));
        }
        let mut entries = fs::read_dir(&self.output)
            .with_context(|| format!("Failed to read {}", self.output.display()))?;
        if entries.next().is_some() {
            return Err(anyhow!(
                "Output directory is not empty: {}",
                self.output.display()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentKind;
    use crate::emitter::Artifact;
    use crate::kube;
    use crate::resource::Labels;
    use tempfile::TempDir;

    fn empty_bundle() -> Bundle {
        Bundle {
            artifacts: Vec::new(),
            manifest: Default::default(),
        }
    }

    #[test]
    fn test_artifact_path() {
        let id = ComponentId::new(ComponentKind::Workload, "demo", "app");
        assert_eq!(
            artifact_path(0, &id, "Deployment"),
            PathBuf::from("artifacts/kubernetes/01-app-deployment.json")
        );
        assert_eq!(graph_name(&id), "app-workload");
    }

    #[test]
    fn test_empty_bundle_writes_nulecule_only() -> Result<()> {
        let dir = TempDir::new()?;
        let output = dir.path().join("bundle");
        let written = BundleWriter::new(&output).write("demo", &empty_bundle())?;
        assert_eq!(written, vec![PathBuf::from(NULECULE_FILE)]);

        let nulecule: serde_yaml::Value =
            serde_yaml::from_str(&fs::read_to_string(output.join(NULECULE_FILE))?)?;
        assert_eq!(nulecule["specversion"], serde_yaml::Value::from("0.0.2"));
        assert_eq!(nulecule["id"], serde_yaml::Value::from("demo"));
        Ok(())
    }

    #[test]
    fn test_empty_existing_directory_is_reused() -> Result<()> {
        let dir = TempDir::new()?;
        BundleWriter::new(dir.path()).write("demo", &empty_bundle())?;
        assert!(dir.path().join(NULECULE_FILE).is_file());
        Ok(())
    }

    #[test]
    fn test_refuses_non_empty_output() -> Result<()> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("existing.txt"), "keep me")?;
        let result = BundleWriter::new(dir.path()).write("demo", &empty_bundle());
        assert!(result.is_err());
        assert!(dir.path().join("existing.txt").exists());
        Ok(())
    }

    #[test]
    fn test_failed_write_leaves_nothing_behind() -> Result<()> {
        let dir = TempDir::new()?;
        let output = dir.path().join("bundle");
        // An artifact with no manifest entry cannot be written.
        let bundle = Bundle {
            artifacts: vec![Artifact {
                id: ComponentId::new(ComponentKind::Service, "demo", "app-svc"),
                document: kube::Document::Service(kube::Service {
                    api_version: "v1",
                    kind: "Service",
                    metadata: kube::ObjectMeta {
                        name: "app-svc".to_string(),
                        labels: Labels::new(),
                    },
                    spec: kube::ServiceSpec {
                        service_type: None,
                        selector: Labels::new(),
                        ports: Vec::new(),
                    },
                }),
            }],
            manifest: Default::default(),
        };

        assert!(BundleWriter::new(&output).write("demo", &bundle).is_err());
        assert!(!output.exists());
        assert_eq!(fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }
}
