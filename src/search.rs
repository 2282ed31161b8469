//! Binary search of the minimal makespan over repeated oracle calls.
//!
//! The search keeps `lower <= optimum <= higher` and narrows the interval until both meet.
//! A bound the oracle fails on, by proof or by timeout, raises `lower` above it. A feasible
//! answer lowers `higher` to the completion time the oracle achieved.

use crate::core::{
    analyze, Instance, Oracle, OracleInstance, OracleOutcome, Permutation, Schedule, Violation,
};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Wall-clock time given to a single oracle call by default.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Configuration of the makespan search.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SearchConfig {
    /// Time limit of every oracle call.
    pub timeout: Duration,
    /// Multiplier of `timeout` for the last retry at the serial bound.
    pub fallback_timeout_factor: u32,
    /// Wall-clock limit of a whole search. Oracle calls are cut short to fit in it.
    pub time_limit: Option<Duration>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            fallback_timeout_factor: 2,
            time_limit: None,
        }
    }
}

/// Fatal outcomes of a search.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum SolveError {
    #[error("no feasible schedule found up to makespan {bound}")]
    NoFeasibleSchedule { bound: u64 },
    #[error("search exceeded its time limit of {limit:?}")]
    TimeLimitExceeded { limit: Duration },
    #[error("oracle returned an invalid assignment for makespan {bound}: {violation}")]
    InvalidAssignment {
        bound: u64,
        #[source]
        violation: Violation,
    },
}

/// Optimal schedule in original test order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Solution {
    pub makespan: u64,
    pub schedule: Schedule,
    /// Number of oracle calls made.
    pub iterations: usize,
}

/// Necessary makespan: the longest test or the busiest resource.
#[must_use]
pub fn lower_bound(instance: &Instance) -> u64 {
    let longest = instance.durations.iter().copied().max().unwrap_or_default();
    let busiest = instance
        .resource_use
        .iter()
        .map(|row| {
            let used = row.iter().zip(&instance.durations).filter(|(uses, _)| **uses);
            used.map(|(_, duration)| duration).sum()
        })
        .max()
        .unwrap_or_default();
    longest.max(busiest)
}

/// Starting upper bound: total work minus the parallelism credit of the other machines.
/// It isn't feasible for every instance, see [`serial_bound`].
#[must_use]
pub fn upper_bound(instance: &Instance) -> u64 {
    let total: u64 = instance.durations.iter().sum();
    let shortest = instance.durations.iter().copied().min().unwrap_or_default();
    let others = crate::cast_u64(instance.num_machines.saturating_sub(1));
    let credit = others.saturating_mul(shortest);
    total.saturating_sub(credit)
}

/// Makespan of running every test back to back. Always feasible.
#[must_use]
pub fn serial_bound(instance: &Instance) -> u64 {
    instance.durations.iter().sum()
}

/// Binary search of the minimal makespan driven by an oracle.
pub struct MakespanSearch<'o> {
    oracle: &'o mut dyn Oracle,
    config: SearchConfig,
    iterations: usize,
    deadline: Option<Instant>,
}

impl<'o> MakespanSearch<'o> {
    /// Creates a new search using the oracle.
    pub fn new(oracle: &'o mut dyn Oracle, config: SearchConfig) -> Self {
        Self {
            oracle,
            config,
            iterations: 0,
            deadline: None,
        }
    }

    /// Finds the minimal makespan of the instance.
    ///
    /// # Errors
    /// - [`SolveError::NoFeasibleSchedule`] if the oracle fails even at the serial bound.
    /// - [`SolveError::InvalidAssignment`] if the oracle returns a broken assignment.
    /// - [`SolveError::TimeLimitExceeded`] if the search runs past [`SearchConfig::time_limit`].
    pub fn solve(&mut self, instance: &Instance) -> Result<Solution, SolveError> {
        let meta = analyze(instance);
        let permutation = Permutation::by_priority(&meta);
        let problem = OracleInstance::new(instance, &meta, &permutation);

        let serial = serial_bound(instance);
        let mut lower = lower_bound(instance);
        let mut higher = upper_bound(instance).max(lower);
        let mut best = None;
        self.iterations = 0;
        let now = Instant::now();
        self.deadline = self.config.time_limit.and_then(|limit| now.checked_add(limit));

        info!(
            oracle = self.oracle.name(),
            tests = instance.num_tests(),
            lower,
            higher,
            colors = meta.colors(),
            "Searching makespan"
        );

        loop {
            while lower < higher {
                let pointer = lower + (higher - lower) / 2;
                if let Some((time, schedule)) = self.query(&problem, pointer, self.config.timeout)? {
                    higher = pointer.min(time);
                    best = Some((time, schedule));
                } else {
                    lower = pointer + 1;
                }
                debug!(lower, higher, "Interval narrowed");
            }

            if best.is_some() {
                break;
            }

            // Nothing below `higher` worked and `higher` itself was never asked.
            best = self.query(&problem, higher, self.config.timeout)?;
            if best.is_some() || higher >= serial {
                break;
            }

            warn!(higher, serial, "Upper bound is infeasible, widening to the serial bound");
            lower = higher + 1;
            higher = serial;
        }

        let (makespan, schedule) = match best {
            Some(best) => best,
            None => self.fallback(&problem, serial)?,
        };

        info!(makespan, iterations = self.iterations, "Makespan found");

        Ok(Solution {
            makespan,
            schedule: Schedule::new(
                permutation.revert(&schedule.test_start),
                permutation.revert(&schedule.test_machine),
            ),
            iterations: self.iterations,
        })
    }

    fn fallback(&mut self, problem: &OracleInstance, serial: u64) -> Result<(u64, Schedule), SolveError> {
        let factor = self.config.fallback_timeout_factor;
        if factor > 1 {
            let timeout = self.config.timeout.saturating_mul(factor);
            warn!(serial, ?timeout, "Retrying the serial bound with a longer timeout");
            if let Some(found) = self.query(problem, serial, timeout)? {
                return Ok(found);
            }
        }
        Err(SolveError::NoFeasibleSchedule { bound: serial })
    }

    /// Asks the oracle for `bound`. Returns the achieved makespan and the working order schedule.
    fn query(
        &mut self,
        problem: &OracleInstance,
        bound: u64,
        timeout: Duration,
    ) -> Result<Option<(u64, Schedule)>, SolveError> {
        let timeout = match (self.deadline, self.config.time_limit) {
            (Some(deadline), Some(limit)) => {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    return Err(SolveError::TimeLimitExceeded { limit });
                }
                timeout.min(left)
            }
            _ => timeout,
        };
        self.iterations += 1;

        match self.oracle.solve(problem, bound, timeout) {
            OracleOutcome::Feasible(assignment) => {
                let reported = assignment.time;
                let schedule = assignment.into_schedule();
                schedule
                    .check_within(&problem.instance, bound)
                    .map_err(|violation| SolveError::InvalidAssignment { bound, violation })?;

                let time = schedule.makespan(&problem.instance.durations);
                if reported != time {
                    warn!(reported, time, "Oracle misreported the completion time");
                }
                debug!(bound, time, "Feasible");
                Ok(Some((time, schedule)))
            }
            OracleOutcome::Infeasible => {
                debug!(bound, "Infeasible");
                Ok(None)
            }
            OracleOutcome::Timeout => {
                debug!(bound, "Timed out, treated as infeasible");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::{Assignment, Test};
    use crate::oracle::BranchAndBound;

    /// Records every call and forwards it to another oracle.
    struct Recording<O> {
        inner: O,
        calls: Vec<(u64, Duration)>,
    }

    impl<O: Oracle> Oracle for Recording<O> {
        fn solve(&mut self, problem: &OracleInstance, bound: u64, timeout: Duration) -> OracleOutcome {
            self.calls.push((bound, timeout));
            self.inner.solve(problem, bound, timeout)
        }

        fn name(&self) -> &'static str {
            "Recording"
        }
    }

    struct AlwaysTimeout;

    impl Oracle for AlwaysTimeout {
        fn solve(&mut self, _: &OracleInstance, _: u64, _: Duration) -> OracleOutcome {
            OracleOutcome::Timeout
        }

        fn name(&self) -> &'static str {
            "AlwaysTimeout"
        }
    }

    /// Returns the same assignment for every bound it fits in.
    struct Fixed(Assignment);

    impl Oracle for Fixed {
        fn solve(&mut self, _: &OracleInstance, bound: u64, _: Duration) -> OracleOutcome {
            if self.0.time <= bound {
                OracleOutcome::Feasible(self.0.clone())
            } else {
                OracleOutcome::Infeasible
            }
        }

        fn name(&self) -> &'static str {
            "Fixed"
        }
    }

    fn recording() -> Recording<BranchAndBound> {
        Recording {
            inner: BranchAndBound,
            calls: Vec::new(),
        }
    }

    fn bounds(calls: &[(u64, Duration)]) -> Vec<u64> {
        calls.iter().map(|&(bound, _)| bound).collect()
    }

    #[test]
    fn bounds_follow_definition() -> anyhow::Result<()> {
        let tests = vec![
            Test::new("t1", 4).using(&[0]),
            Test::new("t2", 3).using(&[0]),
            Test::new("t3", 2),
        ];
        let instance = Instance::from_tests(3, 1, tests)?;

        assert_eq!(lower_bound(&instance), 7);
        assert_eq!(upper_bound(&instance), 5);
        assert_eq!(serial_bound(&instance), 9);
        Ok(())
    }

    #[test]
    fn bounds_of_long_tests_saturate() -> anyhow::Result<()> {
        let long = u64::MAX / 4;
        let tests = vec![Test::new("t1", long), Test::new("t2", long)];
        let instance = Instance::from_tests(3, 0, tests)?;

        assert_eq!(lower_bound(&instance), long);
        assert_eq!(upper_bound(&instance), 0);
        assert_eq!(serial_bound(&instance), 2 * long);

        let tests = vec![Test::new("t1", u64::MAX / 2)];
        let instance = Instance::from_tests(5, 0, tests)?;
        assert_eq!(upper_bound(&instance), 0);
        Ok(())
    }

    #[test]
    fn finds_optimal_makespan() -> anyhow::Result<()> {
        let tests = vec![Test::new("t1", 4), Test::new("t2", 3), Test::new("t3", 2)];
        let instance = Instance::from_tests(2, 0, tests)?;
        let mut oracle = recording();

        let solution = MakespanSearch::new(&mut oracle, SearchConfig::default()).solve(&instance)?;

        assert_eq!(solution.makespan, 5);
        assert_eq!(solution.schedule.makespan(&instance.durations), 5);
        assert!(solution.schedule.verify(&instance));
        assert_eq!(bounds(&oracle.calls), vec![5, 4]);
        assert_eq!(solution.iterations, 2);
        Ok(())
    }

    #[test]
    fn achieved_time_tightens_beyond_pointer() -> anyhow::Result<()> {
        let tests = vec![
            Test::new("t1", 4),
            Test::new("t2", 3),
            Test::new("t3", 2),
            Test::new("t4", 1),
        ];
        let instance = Instance::from_tests(2, 0, tests)?;
        let assignment = Assignment {
            time: 5,
            test_start: vec![0, 0, 3, 4],
            test_machine: vec![0, 1, 1, 0],
        };
        let mut oracle = Recording {
            inner: Fixed(assignment),
            calls: Vec::new(),
        };

        let solution = MakespanSearch::new(&mut oracle, SearchConfig::default()).solve(&instance)?;

        assert_eq!(solution.makespan, 5);
        assert_eq!(bounds(&oracle.calls), vec![6, 4]);
        Ok(())
    }

    #[test]
    fn infeasible_upper_bound_widens_to_serial() -> anyhow::Result<()> {
        let tests = vec![
            Test::new("t1", 3).on(&[0]),
            Test::new("t2", 3).on(&[0]),
            Test::new("t3", 3).on(&[0]),
        ];
        let instance = Instance::from_tests(2, 0, tests)?;
        let mut oracle = recording();

        let solution = MakespanSearch::new(&mut oracle, SearchConfig::default()).solve(&instance)?;

        assert_eq!(solution.makespan, 9);
        assert!(solution.schedule.test_machine.iter().all(|&m| m == 0));
        assert_eq!(bounds(&oracle.calls), vec![4, 5, 6, 8, 9]);
        Ok(())
    }

    #[test]
    fn shared_resource_never_overlaps() -> anyhow::Result<()> {
        let tests = vec![
            Test::new("t1", 3),
            Test::new("t2", 4).using(&[0]),
            Test::new("t3", 3).using(&[0]),
            Test::new("t4", 2),
        ];
        let instance = Instance::from_tests(3, 1, tests)?;
        let mut oracle = BranchAndBound;

        let solution = MakespanSearch::new(&mut oracle, SearchConfig::default()).solve(&instance)?;
        let start = &solution.schedule.test_start;

        assert_eq!(solution.makespan, 7);
        assert!(start[1] + 4 <= start[2] || start[2] + 3 <= start[1]);
        assert!(solution.schedule.verify(&instance));
        Ok(())
    }

    #[test]
    fn schedule_is_returned_in_original_order() -> anyhow::Result<()> {
        let tests = vec![
            Test::new("t1", 2),
            Test::new("t2", 5).on(&[1]),
            Test::new("t3", 1).using(&[0]),
            Test::new("t4", 4).using(&[0]),
        ];
        let instance = Instance::from_tests(2, 1, tests)?;
        let mut oracle = BranchAndBound;

        let solution = MakespanSearch::new(&mut oracle, SearchConfig::default()).solve(&instance)?;

        assert_eq!(solution.schedule.test_machine[1], 1);
        assert!(solution.schedule.verify(&instance));
        assert_eq!(solution.makespan, solution.schedule.makespan(&instance.durations));
        assert_eq!(solution.makespan, 6);
        Ok(())
    }

    #[test]
    fn timeouts_everywhere_are_fatal() -> anyhow::Result<()> {
        let tests = vec![Test::new("t1", 4), Test::new("t2", 3), Test::new("t3", 2)];
        let instance = Instance::from_tests(2, 0, tests)?;
        let mut oracle = Recording {
            inner: AlwaysTimeout,
            calls: Vec::new(),
        };
        let config = SearchConfig {
            timeout: Duration::from_millis(10),
            fallback_timeout_factor: 3,
            time_limit: None,
        };

        let result = MakespanSearch::new(&mut oracle, config).solve(&instance);

        assert_eq!(result, Err(SolveError::NoFeasibleSchedule { bound: 9 }));
        assert_eq!(bounds(&oracle.calls), vec![5, 6, 7, 8, 9, 9]);
        assert_eq!(oracle.calls.last().map(|c| c.1), Some(Duration::from_millis(30)));
        Ok(())
    }

    #[test]
    fn time_limit_stops_the_search() -> anyhow::Result<()> {
        let tests = vec![Test::new("t1", 4), Test::new("t2", 3), Test::new("t3", 2)];
        let instance = Instance::from_tests(2, 0, tests)?;
        let mut oracle = Recording {
            inner: BranchAndBound,
            calls: Vec::new(),
        };
        let config = SearchConfig {
            time_limit: Some(Duration::ZERO),
            ..SearchConfig::default()
        };

        let result = MakespanSearch::new(&mut oracle, config).solve(&instance);

        assert_eq!(
            result,
            Err(SolveError::TimeLimitExceeded { limit: Duration::ZERO })
        );
        assert!(oracle.calls.is_empty());
        Ok(())
    }

    #[test]
    fn oracle_calls_fit_in_the_time_limit() -> anyhow::Result<()> {
        let tests = vec![Test::new("t1", 4), Test::new("t2", 3), Test::new("t3", 2)];
        let instance = Instance::from_tests(2, 0, tests)?;
        let mut oracle = Recording {
            inner: BranchAndBound,
            calls: Vec::new(),
        };
        let limit = Duration::from_secs(1);
        let config = SearchConfig {
            time_limit: Some(limit),
            ..SearchConfig::default()
        };

        let solution = MakespanSearch::new(&mut oracle, config).solve(&instance)?;

        assert_eq!(solution.makespan, 5);
        assert!(oracle.calls.iter().all(|&(_, timeout)| timeout <= limit));
        Ok(())
    }

    #[test]
    fn invalid_assignment_is_rejected() -> anyhow::Result<()> {
        let tests = vec![Test::new("t1", 2), Test::new("t2", 2)];
        let instance = Instance::from_tests(1, 0, tests)?;
        let mut oracle = Fixed(Assignment {
            time: 2,
            test_start: vec![0, 0],
            test_machine: vec![0, 0],
        });

        let result = MakespanSearch::new(&mut oracle, SearchConfig::default()).solve(&instance);

        assert!(matches!(result, Err(SolveError::InvalidAssignment { .. })));
        Ok(())
    }
}
