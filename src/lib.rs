#![deny(clippy::all, clippy::cargo, clippy::expect_used, clippy::unwrap_used)]
#![deny(clippy::pedantic, clippy::nursery, unsafe_code)]
#![warn(clippy::unimplemented, clippy::redundant_type_annotations)]

use anyhow::Result;
use std::io::BufRead;

pub mod core;
pub mod data;
pub mod oracle;
pub mod search;

/// Solves the instance read from reader with the given oracle and renders the schedule.
/// Returns an error if the instance could not be read or no schedule was found.
///
/// # Errors
/// - If the instance could not be read from the reader.
/// - If the search fails, see [`search::SolveError`].
///
/// # Panics
///  - If the schedule is invalid in debug mode.
pub fn run_reader(
    oracle: &mut dyn core::Oracle,
    reader: &mut impl BufRead,
    config: &search::SearchConfig,
) -> Result<String> {
    let instance = data::deserialize(reader)?;
    let solution = search::MakespanSearch::new(oracle, config.clone()).solve(&instance)?;

    debug_assert!(
        solution.schedule.verify(&instance),
        "Schedule is invalid: {:?}",
        solution.schedule
    );

    Ok(data::format_schedule(&instance, solution.makespan, &solution.schedule))
}

/// Installs the stderr log subscriber.
/// Verbosity 0 logs warnings, 1 info, 2 debug, anything above trace.
pub fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

#[cfg(not(target_pointer_width = "64"))]
compile_error!("Must be 64-bit system!");

/// Casts the given value to `u64`.
/// It should never fail on 64-bit systems.
///
/// # Panics
/// - If the value cannot be cast to `u64`.
#[must_use]
pub fn cast_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or_else(|_| unreachable!("Must be 64-bit system!"))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::oracle::BranchAndBound;

    #[test]
    fn solves_and_renders_instance() -> Result<()> {
        let text = "Number of tests : 3
Number of machines : 2
Number of resources : 1
test( 't1', 4, [], ['r1'])
test( 't2', 3, ['m2'], [])
test( 't3', 2, [], ['r1'])
";
        let output = run_reader(
            &mut BranchAndBound,
            &mut text.as_bytes(),
            &search::SearchConfig::default(),
        )?;

        assert!(output.starts_with("% Makespan: 6\n"));
        assert_eq!(output.lines().filter(|l| l.starts_with("machine(")).count(), 2);
        Ok(())
    }

    #[test]
    fn malformed_header_aborts() {
        let result = run_reader(
            &mut BranchAndBound,
            &mut "Number of tests: 1\n".as_bytes(),
            &search::SearchConfig::default(),
        );
        assert!(result.is_err());
    }
}
