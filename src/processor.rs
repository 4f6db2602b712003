//! End-to-end "OpenShift project → Nulecule bundle" pipeline.
//!
//! [`ProjectProcessor`] runs the stages strictly in sequence on one snapshot of
//! the project:
//! - reads the raw resources from a concrete [`Source`],
//! - normalizes them into canonical components ([`Normalizer`]),
//! - links them into a dependency graph ([`build_graph`]),
//! - emits the ordered artifacts and manifest ([`emit`]),
//! - and hands the bundle to the [`BundleWriter`].
//!
//! Any error stops the run where it is detected; nothing reaches the output
//! directory unless every stage succeeded.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::emitter::{emit, Bundle};
use crate::error::ConvertError;
use crate::graph::{build_graph, GraphWarning};
use crate::normalizer::Normalizer;
use crate::notifier::Notifier;
use crate::resource::RawResource;
use crate::sources::{ClusterContext, Source};
use crate::writer::BundleWriter;

/// Result of converting one resource snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub bundle: Bundle,
    pub warnings: Vec<GraphWarning>,
}

/// Normalize → graph → emit over an already-read snapshot.
pub fn convert_resources(
    raw: Vec<RawResource>,
    normalizer: &Normalizer,
) -> std::result::Result<Conversion, ConvertError> {
    let components = normalizer.normalize(raw)?;
    let graph = build_graph(&components)?;
    let bundle = emit(&components, &graph.edges)?;
    Ok(Conversion {
        bundle,
        warnings: graph.warnings,
    })
}

/// Orchestrates the conversion of one project read through a concrete [`Source`].
pub struct ProjectProcessor<S: Source> {
    source: S,
    notifier: Notifier,
    normalizer: Normalizer,
}

impl<S: Source> ProjectProcessor<S> {
    pub fn new(source: S, notifier: Notifier) -> Self {
        Self {
            source,
            notifier,
            normalizer: Normalizer::new(),
        }
    }

    /// Treat these registry hosts as cluster-internal in addition to discovered ones.
    pub fn with_internal_registries(mut self, hosts: Vec<String>) -> Self {
        self.normalizer = Normalizer::with_internal_registries(hosts);
        self
    }

    /// Reads the project and produces its bundle without touching the filesystem.
    pub fn export(&self, context: &ClusterContext) -> std::result::Result<Bundle, ConvertError> {
        self.notifier.info(&format!(
            "Reading project '{}' using {} source...",
            context.project,
            self.source.name()
        ));
        let raw = self.source.list_project_resources(context)?;
        self.notifier.debug(&format!("Read {} resources", raw.len()));

        self.notifier.info("Resolving components and dependencies...");
        let conversion = convert_resources(raw, &self.normalizer)?;
        for warning in &conversion.warnings {
            match warning {
                GraphWarning::OrphanedWorkload(_) => self.notifier.debug(&warning.to_string()),
                _ => self.notifier.warn(&warning.to_string()),
            }
        }

        for artifact in &conversion.bundle.artifacts {
            self.notifier.trace(&format!(
                "{} -> {} '{}'",
                artifact.id,
                artifact.document.kind(),
                artifact.document.name()
            ));
        }
        Ok(conversion.bundle)
    }

    /// Converts the project and writes the bundle into `output_dir`.
    ///
    /// Returns the written files relative to `output_dir`.
    pub fn convert(&self, context: &ClusterContext, output_dir: &Path) -> Result<Vec<PathBuf>> {
        let started = Instant::now();
        self.notifier.debug(&format!("Output directory: {}", output_dir.display()));

        let bundle = match self.export(context) {
            Ok(bundle) => bundle,
            Err(e) => {
                self.notifier.abandon();
                return Err(e).with_context(|| {
                    format!("Failed to convert project '{}'", context.project)
                });
            }
        };

        self.notifier.info("Writing bundle...");
        let written = match BundleWriter::new(output_dir).write(&context.project, &bundle) {
            Ok(written) => written,
            Err(e) => {
                self.notifier.abandon();
                return Err(e);
            }
        };

        self.notifier.finish(&format!(
            "Exported {} artifacts from project '{}' to {} in {:.1?}",
            bundle.artifacts.len(),
            context.project,
            output_dir.display(),
            started.elapsed()
        ));
        Ok(written)
    }
}
