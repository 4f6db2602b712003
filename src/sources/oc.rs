use log::{debug, info};
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{ClusterContext, Source};
use crate::error::{ConvertError, Result};
use crate::resource::{decode_list, RawResource};

/// Resource types read from the project, in one `oc get` call.
pub const EXPORTED_TYPES: &str = "imagestreams,deploymentconfigs,services,routes";

/// Places `oc` is looked for when no path is given.
const OC_SEARCH_PATHS: &[&str] = &["/usr/bin/oc", "/usr/local/bin/oc"];

/// `oc` client implementation of the Source trait
#[derive(Debug, Default)]
pub struct OcSource;

impl OcSource {
    pub fn new() -> Self {
        Self
    }

    fn find_oc(&self, context: &ClusterContext) -> Result<PathBuf> {
        if let Some(oc) = &context.oc {
            return Ok(oc.clone());
        }
        for candidate in OC_SEARCH_PATHS {
            debug!("Trying oc at {}", candidate);
            if Path::new(candidate).is_file() {
                debug!("Found oc at {}", candidate);
                return Ok(PathBuf::from(candidate));
            }
        }
        Err(ConvertError::cluster_access(
            &context.project,
            format!(
                "no oc binary found in {}; pass its location with --oc",
                OC_SEARCH_PATHS.join(":")
            ),
        ))
    }

    /// Arguments for the single `oc get` call, global flags first.
    pub fn get_args(context: &ClusterContext) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(config) = &context.config {
            args.push("--config".to_string());
            args.push(config.display().to_string());
        }
        args.extend([
            "--namespace".to_string(),
            context.project.clone(),
            "get".to_string(),
            EXPORTED_TYPES.to_string(),
            "-o".to_string(),
            "json".to_string(),
        ]);
        if let Some(selector) = &context.selector {
            args.push("-l".to_string());
            args.push(selector.clone());
        }
        args
    }

    fn run_command(&self, oc: &Path, context: &ClusterContext, args: &[String]) -> Result<String> {
        let output = Command::new(oc).args(args).output().map_err(|e| {
            ConvertError::cluster_access(
                &context.project,
                format!("failed to execute {}: {}", oc.display(), e),
            )
        })?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(ConvertError::cluster_access(
                &context.project,
                error.trim().to_string(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Source for OcSource {
    fn name(&self) -> &str {
        "oc"
    }

    fn list_project_resources(&self, context: &ClusterContext) -> Result<Vec<RawResource>> {
        let oc = self.find_oc(context)?;
        let args = Self::get_args(context);
        info!("Reading project '{}' with {}", context.project, oc.display());
        debug!("Running {} {}", oc.display(), args.join(" "));

        let stdout = self.run_command(&oc, context, &args)?;
        decode_list(&context.project, &stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_args_minimal() {
        let context = ClusterContext::new("demo");
        assert_eq!(
            OcSource::get_args(&context),
            vec![
                "--namespace",
                "demo",
                "get",
                "imagestreams,deploymentconfigs,services,routes",
                "-o",
                "json"
            ]
        );
    }

    #[test]
    fn test_get_args_with_config_and_selector() {
        let context = ClusterContext {
            config: Some(PathBuf::from("/home/me/.kube/config")),
            selector: Some("app=web".to_string()),
            ..ClusterContext::new("demo")
        };
        let args = OcSource::get_args(&context);
        assert_eq!(&args[..2], &["--config", "/home/me/.kube/config"]);
        assert_eq!(&args[args.len() - 2..], &["-l", "app=web"]);
    }

    #[test]
    fn test_explicit_oc_path_wins() {
        let context = ClusterContext {
            oc: Some(PathBuf::from("/opt/oc")),
            ..ClusterContext::new("demo")
        };
        assert_eq!(
            OcSource::new().find_oc(&context).unwrap(),
            PathBuf::from("/opt/oc")
        );
    }

    #[test]
    fn test_missing_binary_is_cluster_access_error() {
        let context = ClusterContext {
            oc: Some(PathBuf::from("/path/that/definitely/does/not/exist/oc")),
            ..ClusterContext::new("demo")
        };
        let result = OcSource::new().list_project_resources(&context);
        match result {
            Err(ConvertError::ClusterAccess { project, message }) => {
                assert_eq!(project, "demo");
                assert!(message.contains("failed to execute"), "{}", message);
            }
            other => panic!("expected ClusterAccess, got {:?}", other),
        }
    }
}
