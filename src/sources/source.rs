use std::path::PathBuf;

use crate::error::Result;
use crate::resource::RawResource;

/// Everything a reader needs to reach one project: the connection is passed in
/// explicitly on every call rather than held globally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterContext {
    /// Project (namespace) to read.
    pub project: String,
    /// Path to the `oc` binary; looked up in the usual places when unset.
    pub oc: Option<PathBuf>,
    /// Client configuration file passed as `--config`.
    pub config: Option<PathBuf>,
    /// Label selector restricting which objects are exported.
    pub selector: Option<String>,
}

impl ClusterContext {
    pub fn new(project: &str) -> Self {
        Self {
            project: project.to_string(),
            ..Default::default()
        }
    }
}

/// Source trait for reading a project's resources from different places
pub trait Source {
    /// Returns the name of the source for identification purposes
    fn name(&self) -> &str;

    /// Returns every ImageStream, DeploymentConfig, Service and Route of the
    /// project in one snapshot, or fails as a whole
    fn list_project_resources(&self, context: &ClusterContext) -> Result<Vec<RawResource>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{FileSource, OcSource};
    use std::path::Path;

    #[test]
    fn test_polymorphic_source_names() {
        let sources: Vec<Box<dyn Source>> = vec![
            Box::new(OcSource::new()),
            Box::new(FileSource::new(Path::new("export.json"))),
        ];
        let names: Vec<&str> = sources.iter().map(|source| source.name()).collect();
        assert_eq!(names, vec!["oc", "file"]);
    }

    #[test]
    fn test_context_defaults() {
        let context = ClusterContext::new("demo");
        assert_eq!(context.project, "demo");
        assert!(context.oc.is_none());
        assert!(context.config.is_none());
        assert!(context.selector.is_none());
    }
}
