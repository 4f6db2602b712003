//! Shared helpers for the integration tests.

use openshift2nulecule::resource::{decode_list, RawResource};
use std::fs;
use std::path::PathBuf;

#[allow(dead_code)]
pub const SCENARIO: &str = "scenario.json";
#[allow(dead_code)]
pub const MULTI_TIER: &str = "multi_tier.json";
#[allow(dead_code)]
pub const AMBIGUOUS_ROUTE: &str = "ambiguous_route.json";
#[allow(dead_code)]
pub const IN_CLUSTER_BUILD: &str = "in_cluster_build.json";
#[allow(dead_code)]
pub const TWO_NAMESPACES: &str = "two_namespaces.json";

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Decodes a saved `oc get -o json` fixture.
#[allow(dead_code)]
pub fn load(name: &str, project: &str) -> Vec<RawResource> {
    let document = fs::read_to_string(fixture(name)).expect("fixture should be readable");
    decode_list(project, &document).expect("fixture should decode")
}
