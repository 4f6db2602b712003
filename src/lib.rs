pub mod component;
pub mod emitter;
pub mod error;
pub mod graph;
pub mod kube;
pub mod normalizer;
pub mod notifier;
pub mod processor;
pub mod registry;
pub mod resource;
pub mod sources;
pub mod writer;

// Re-exports for easy access
pub use component::{CanonicalComponent, ComponentId, ComponentKind};
pub use emitter::{emit, Artifact, Bundle, Manifest};
pub use error::ConvertError;
pub use graph::{build_graph, DependencyEdge, DependencyGraph};
pub use normalizer::Normalizer;
pub use notifier::Notifier;
pub use processor::{convert_resources, ProjectProcessor};
pub use resource::RawResource;
pub use sources::{ClusterContext, FileSource, OcSource, Source};
pub use writer::BundleWriter;
