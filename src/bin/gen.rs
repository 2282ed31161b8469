use clap::Parser;
use rand::seq::index::sample;
use rand::Rng;
use std::io::Write;
use std::num::NonZero;
use test_scheduling::core::{Instance, Test};
use test_scheduling::data;

#[derive(Debug, Parser)]
#[command(
    version,
    about,
    long_about = "Generates random instances of the test scheduling problem."
)]
pub struct Config {
    /// The number of tests.
    pub tests: NonZero<usize>,
    /// The number of machines.
    pub machines: NonZero<usize>,
    /// The number of resources.
    pub resources: usize,
    /// The maximum duration of a test.
    pub max_duration: NonZero<u64>,
    /// Probability that a test holds a given resource.
    #[clap(short, long, default_value = "0.2")]
    pub resource_ratio: f64,
    /// Probability that a test is restricted to a subset of machines.
    #[clap(short = 'R', long, default_value = "0.3")]
    pub restrict_ratio: f64,
    /// Number of instances to generate.
    #[clap(short, long, default_value = "1")]
    pub amount: NonZero<u64>,
    /// Path to output the generated instances. If the directory does not exist, it will be created.
    #[clap(short, long, default_value = "output")]
    pub output: String,
}

fn gen(config: &Config) -> anyhow::Result<()> {
    let output = std::path::Path::new(&config.output);
    if !output.exists() {
        std::fs::create_dir_all(output)?;
    }

    let mut rng = rand::thread_rng();
    for i in 0..config.amount.get() {
        let tests = (1..=config.tests.get())
            .map(|t| gen_test(&mut rng, config, t))
            .collect();
        let instance = Instance::from_tests(config.machines.get(), config.resources, tests)?;
        let filename = format!(
            "t{}m{}r{}-{i}.in",
            config.tests, config.machines, config.resources
        );
        std::fs::File::create(output.join(filename))?
            .write_all(data::to_string(&instance).as_bytes())?;
    }

    Ok(())
}

fn gen_test(rng: &mut impl Rng, config: &Config, index: usize) -> Test {
    let machines = config.machines.get();
    let duration = rng.gen_range(1..=config.max_duration.get());
    let resources: Vec<_> = (0..config.resources)
        .filter(|_| rng.gen_bool(config.resource_ratio))
        .collect();

    let mut test = Test::new(format!("t{index}"), duration).using(&resources);
    if machines > 1 && rng.gen_bool(config.restrict_ratio) {
        let amount = rng.gen_range(1..machines);
        let mut allowed = sample(rng, machines, amount).into_vec();
        allowed.sort_unstable();
        test = test.on(&allowed);
    }
    test
}

fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    anyhow::ensure!(
        (0.0..=1.0).contains(&config.resource_ratio) && (0.0..=1.0).contains(&config.restrict_ratio),
        "Ratios must be within [0, 1]"
    );
    gen(&config)
}
