use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{BufReader, Write};
use std::num::NonZero;
use std::path::PathBuf;
use std::time::Duration;
use test_scheduling::core::Oracle;
use test_scheduling::search::SearchConfig;
use test_scheduling::{init_logging, oracle, run_reader};

#[derive(Copy, Clone, Debug)]
struct OracleName(usize, &'static str);

impl From<OracleName> for Box<dyn Oracle> {
    fn from(value: OracleName) -> Box<dyn Oracle> {
        oracle::ORACLES[value.0]()
    }
}

impl std::fmt::Display for OracleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.1)
    }
}

impl ValueEnum for OracleName {
    fn value_variants<'a>() -> &'a [Self] {
        static ORACLES: std::sync::LazyLock<Vec<OracleName>> = std::sync::LazyLock::new(|| {
            let iter = oracle::ORACLES.iter().enumerate();
            iter.map(|(i, init)| OracleName(i, init().name())).collect()
        });

        ORACLES.as_slice()
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.1))
    }
}

/// Finds a schedule of tests with minimal makespan.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Application {
    /// The instance file.
    input: PathBuf,
    /// Where to write the schedule. Printed to stdout if omitted.
    output: Option<PathBuf>,
    /// The oracle deciding each makespan bound.
    #[clap(short, long, default_value = "BranchAndBound")]
    oracle: OracleName,
    /// Time limit of a single oracle call in seconds.
    #[clap(short, long, default_value = "15")]
    timeout: NonZero<u64>,
    /// Timeout multiplier of the last attempt at the always feasible serial bound.
    #[clap(short, long, default_value = "2")]
    fallback_factor: u32,
    /// Increase logging verbosity.
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let application = Application::parse();
    init_logging(application.verbose);

    let config = SearchConfig {
        timeout: Duration::from_secs(application.timeout.get()),
        fallback_timeout_factor: application.fallback_factor,
        time_limit: None,
    };
    let mut oracle = Box::<dyn Oracle>::from(application.oracle);
    let mut reader = BufReader::new(File::open(&application.input)?);
    let schedule = run_reader(oracle.as_mut(), &mut reader, &config)?;

    match application.output {
        Some(path) => File::create(path)?.write_all(schedule.as_bytes())?,
        None => print!("{schedule}"),
    }

    Ok(())
}
