use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use std::path::PathBuf;

use openshift2nulecule::notifier::{Notifier, VerbosityLevel};
use openshift2nulecule::{ClusterContext, FileSource, OcSource, ProjectProcessor};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, help = "OpenShift project to export")]
    project: String,

    #[arg(short, long, help = "Directory to write the Nulecule bundle to (absent or empty)")]
    output: PathBuf,

    #[arg(long, help = "Path to the oc binary (default: /usr/bin/oc or /usr/local/bin/oc)")]
    oc: Option<PathBuf>,

    #[arg(long, help = "oc client configuration file")]
    oc_config: Option<PathBuf>,

    #[arg(short = 'l', long, help = "Only export objects matching this label selector")]
    selector: Option<String>,

    #[arg(
        long,
        help = "Read a saved `oc get -o json` List document instead of querying the cluster"
    )]
    from_file: Option<PathBuf>,

    #[arg(
        long = "internal-registry",
        value_name = "HOST",
        help = "Registry host whose images cannot be pulled from outside the cluster (repeatable)"
    )]
    internal_registries: Vec<String>,

    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Verbose mode (-v for info, -vv for debug, -vvv for trace). Also switches to text-based progress"
    )]
    verbose: u8,
}

/// Installs the process-wide logger so `log` macros in the pipeline reach stderr.
fn init_logging(verbosity: u8) -> std::result::Result<(), log::SetLoggerError> {
    env_logger::Builder::from_env(Env::default())
        .filter_level(VerbosityLevel::from(verbosity).to_log_level())
        .try_init()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;
    let notifier = Notifier::new(cli.verbose);
    notifier.debug(&format!("Project: {}", cli.project));
    notifier.debug(&format!("Output directory: {}", cli.output.display()));

    let context = ClusterContext {
        project: cli.project,
        oc: cli.oc,
        config: cli.oc_config,
        selector: cli.selector,
    };

    match cli.from_file {
        Some(path) => {
            notifier.debug(&format!("Reading resources from {}", path.display()));
            let processor = ProjectProcessor::new(FileSource::new(&path), notifier)
                .with_internal_registries(cli.internal_registries);
            processor.convert(&context, &cli.output)?;
        }
        None => {
            let processor = ProjectProcessor::new(OcSource::new(), notifier)
                .with_internal_registries(cli.internal_registries);
            processor.convert(&context, &cli.output)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_init_logging_enables_pipeline_logs() {
        init_logging(2).unwrap();
        assert_eq!(log::max_level(), log::LevelFilter::Debug);
        assert!(log::log_enabled!(target: "openshift2nulecule::graph", log::Level::Debug));
        assert!(!log::log_enabled!(log::Level::Trace));
    }

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_project_and_output_are_required() {
        assert!(Cli::try_parse_from(["openshift2nulecule", "--output", "out"]).is_err());
        assert!(Cli::try_parse_from(["openshift2nulecule", "--project", "demo"]).is_err());

        let cli = Cli::try_parse_from([
            "openshift2nulecule",
            "--project=demo",
            "--output=out",
            "--internal-registry",
            "172.30.1.1:5000",
            "--internal-registry",
            "registry.corp",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.project, "demo");
        assert_eq!(cli.output, PathBuf::from("out"));
        assert_eq!(cli.internal_registries, vec!["172.30.1.1:5000", "registry.corp"]);
        assert_eq!(cli.verbose, 2);
    }
}
