use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use super::{ClusterContext, Source};
use crate::error::{ConvertError, Result};
use crate::resource::{decode_list, RawResource};

/// Reads a saved `oc get ... -o json` document instead of asking the cluster.
///
/// The document is taken as is; objects from other namespaces are not filtered out.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl Source for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    fn list_project_resources(&self, context: &ClusterContext) -> Result<Vec<RawResource>> {
        if !self.path.is_file() {
            return Err(ConvertError::cluster_access(
                &context.project,
                format!("export file does not exist: {}", self.path.display()),
            ));
        }

        info!("Reading project '{}' from {}", context.project, self.path.display());
        let document = fs::read_to_string(&self.path).map_err(|e| {
            ConvertError::cluster_access(
                &context.project,
                format!("cannot read {}: {}", self.path.display(), e),
            )
        })?;

        decode_list(&context.project, &document)
    }
}
