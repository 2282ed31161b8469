use crate::core::Oracle;
use crate::data::deserialize;
use crate::search::{MakespanSearch, SearchConfig};
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result};
use std::fs::File;
use std::io::BufReader;
use tracing::warn;

/// Report of running a directory of instances.
#[derive(Debug, Deserialize, Serialize)]
pub struct Report {
    oracle: String,
    entries: Vec<ReportEntry>,
}

impl Report {
    /// Create a new report.
    fn new(oracle: String) -> Self {
        let entries = Vec::new();
        Self { oracle, entries }
    }

    /// Number of instances solved.
    #[must_use]
    pub fn successes(&self) -> usize {
        self.entries.iter().filter(|e| e.makespan.is_some()).count()
    }

    /// Number of instances that failed.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.entries.len() - self.successes()
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(f, "Oracle: {}", self.oracle)?;
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        writeln!(f, "Number of successes: {}", self.successes())?;
        writeln!(f, "Number of failures: {}", self.failures())?;
        writeln!(f, "-------------------")
    }
}

/// Report of running a single instance.
#[non_exhaustive]
#[derive(Debug, Deserialize, Serialize)]
pub struct ReportEntry {
    pub name: String,
    /// `None` if the instance couldn't be solved.
    pub makespan: Option<u64>,
    pub iterations: usize,
    pub time: f64,
}

impl Display for ReportEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self.makespan {
            Some(makespan) => write!(
                f,
                "{}: {makespan} in {:.2} sec ({} oracle calls)",
                self.name, self.time, self.iterations
            ),
            None => write!(f, "{}: failed after {:.2} sec", self.name, self.time),
        }
    }
}

/// Solve all samples in the `samples` directory and check their optimal makespan.
/// Print the report to stdout.
///
/// # Errors
/// - If a file cannot be read.
/// - If no samples are found.
///
/// # Panics
/// - If a schedule is invalid.
/// - If a makespan differs from the optimum in the file name.
pub fn samples(oracle: &mut dyn Oracle) -> anyhow::Result<()> {
    run("samples", true, oracle, &SearchConfig::default()).and_then(|report| {
        if report.entries.is_empty() {
            Err(anyhow!("No samples found"))
        } else {
            println!("{report}");
            Ok(())
        }
    })
}

/// Solve all instances in the `dir` directory.
///
/// # Arguments
/// - `valid` is true, check the makespan against the optimum in the file name.
/// - `oracle` is the oracle to search with.
///
/// # Errors
/// - If a file cannot be read.
/// - If `valid` is true and an instance can't be parsed or solved.
///
/// # Panics
/// - If a schedule is invalid.
/// - If `valid` is true and a makespan is incorrect.
pub fn run(
    dir: &str,
    valid: bool,
    oracle: &mut dyn Oracle,
    config: &SearchConfig,
) -> anyhow::Result<Report> {
    let mut report = Report::new(oracle.name().into());

    let mut files: Vec<_> = std::fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
    files.sort_by_key(std::fs::DirEntry::file_name);

    for file in files {
        let (name, optimum) = parse_filename(&file.file_name())?;
        let time = std::time::Instant::now();

        let solved = deserialize(&mut BufReader::new(File::open(file.path())?))
            .map_err(anyhow::Error::from)
            .and_then(|instance| {
                let mut search = MakespanSearch::new(&mut *oracle, config.clone());
                let solution = search.solve(&instance)?;
                assert!(solution.schedule.verify(&instance), "Invalid schedule created");
                Ok(solution)
            });
        let time = time.elapsed().as_secs_f64();

        let (makespan, iterations) = match solved {
            Ok(solution) => (Some(solution.makespan), solution.iterations),
            Err(err) if valid => return Err(err.context(name)),
            Err(err) => {
                warn!("{name}: {err}");
                (None, 0)
            }
        };

        if valid {
            let expected = optimum.ok_or_else(|| anyhow!("Missing optimum in {name}"))?;
            assert_eq!(makespan, Some(expected), "Invalid makespan {name}");
        }

        report.entries.push(ReportEntry {
            name,
            makespan,
            iterations,
            time,
        });
    }

    Ok(report)
}

/// Splits `<label>_<optimum>.in` into the file name and the optimum, if present.
fn parse_filename(filename: &std::ffi::OsStr) -> anyhow::Result<(String, Option<u64>)> {
    let name = filename.to_str().ok_or_else(|| anyhow!("Cannot read filename"))?;
    let stem = name.split('.').next().unwrap_or_default();
    let optimum = stem.rsplit_once('_').and_then(|(_, value)| value.parse().ok());
    Ok((name.into(), optimum))
}
