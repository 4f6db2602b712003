pub mod file;
pub mod oc;
pub mod source;

pub use file::FileSource;
pub use oc::OcSource;
pub use source::{ClusterContext, Source};
