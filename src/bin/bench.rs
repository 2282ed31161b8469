use clap::Parser;
use std::num::NonZero;
use std::time::Duration;
use test_scheduling::core::Oracle;
use test_scheduling::data::run;
use test_scheduling::search::SearchConfig;

#[derive(Debug, Parser)]
#[command(version, about, long_about = "Solves every instance of a directory.")]
struct Config {
    /// The input directory
    input_dir: String,
    /// Exclude oracles
    #[clap(short, long, value_delimiter = ',')]
    exclude: Vec<String>,
    /// Time limit of a single oracle call in seconds
    #[clap(short, long, default_value = "15")]
    timeout: NonZero<u64>,
    /// Time limit of a whole instance in seconds, counted as a failure when exceeded
    #[clap(short, long, default_value = "90")]
    instance_timeout: NonZero<u64>,
    /// Print reports as JSON
    #[clap(long)]
    json: bool,
    /// Increase logging verbosity
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    test_scheduling::init_logging(config.verbose);

    let search = SearchConfig {
        timeout: Duration::from_secs(config.timeout.get()),
        time_limit: Some(Duration::from_secs(config.instance_timeout.get())),
        ..SearchConfig::default()
    };

    for mut oracle in oracles(&config.exclude) {
        let report = run(&config.input_dir, false, oracle.as_mut(), &search)?;
        if config.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print!("{report}");
        }
    }
    Ok(())
}

fn oracles(exclude: &[String]) -> impl Iterator<Item = Box<dyn Oracle>> + '_ {
    test_scheduling::oracle::ORACLES
        .iter()
        .map(|init| init())
        .filter(|oracle| !exclude.iter().any(|name| name == oracle.name()))
}
