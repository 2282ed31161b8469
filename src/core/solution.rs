use super::{Instance, Timeline};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Constraint broken by a schedule.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Violation {
    #[error("schedule covers {found} tests, instance has {expected}")]
    Length { expected: usize, found: usize },
    #[error("test {test} is assigned to machine {machine} which cannot run it")]
    Capability { test: usize, machine: usize },
    #[error("test {test} overlaps another test on its machine or resources")]
    Overlap { test: usize },
    #[error("makespan {makespan} exceeds bound {bound}")]
    Bound { makespan: u64, bound: u64 },
}

/// Start time and machine of every test. Start times are 0-based.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, Serialize, PartialEq)]
pub struct Schedule {
    pub test_start: Vec<u64>,
    pub test_machine: Vec<usize>,
}

impl Schedule {
    /// Creates a new schedule.
    #[must_use]
    pub const fn new(test_start: Vec<u64>, test_machine: Vec<usize>) -> Self {
        Self {
            test_start,
            test_machine,
        }
    }

    /// Returns the number of scheduled tests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.test_start.len()
    }

    /// Returns whether the schedule is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.test_start.is_empty()
    }

    /// Calculates the completion time of the last finishing test.
    #[must_use]
    pub fn makespan(&self, durations: &[u64]) -> u64 {
        self.test_start
            .iter()
            .zip(durations)
            .map(|(start, duration)| start.saturating_add(*duration))
            .max()
            .unwrap_or_default()
    }

    /// Checks capability, machine exclusivity and resource exclusivity.
    ///
    /// # Errors
    /// - The first violated constraint.
    pub fn check(&self, instance: &Instance) -> Result<(), Violation> {
        let n = instance.num_tests();
        if self.test_start.len() != n || self.test_machine.len() != n {
            return Err(Violation::Length {
                expected: n,
                found: self.test_start.len().min(self.test_machine.len()),
            });
        }

        let mut timeline = Timeline::new(instance);
        for (test, (&start, &machine)) in self.test_start.iter().zip(&self.test_machine).enumerate() {
            if machine >= instance.num_machines || !instance.can_run(machine, test) {
                return Err(Violation::Capability { test, machine });
            }
            if !timeline.is_free(test, machine, start) {
                return Err(Violation::Overlap { test });
            }
            timeline.place(test, machine, start);
        }

        Ok(())
    }

    /// Checks the schedule and that it completes within `bound`.
    ///
    /// # Errors
    /// - The first violated constraint.
    pub fn check_within(&self, instance: &Instance, bound: u64) -> Result<(), Violation> {
        self.check(instance)?;
        let makespan = self.makespan(&instance.durations);
        if makespan > bound {
            return Err(Violation::Bound { makespan, bound });
        }
        Ok(())
    }

    /// Verifies the schedule is valid for the instance.
    #[must_use]
    pub fn verify(&self, instance: &Instance) -> bool {
        self.check(instance).is_ok()
    }

    /// Returns the tests assigned to the machine ordered by start time.
    #[must_use]
    pub fn machine_tests(&self, machine: usize) -> Vec<usize> {
        let mut tests: Vec<_> = (0..self.len())
            .filter(|&t| self.test_machine[t] == machine)
            .collect();
        tests.sort_by_key(|&t| (self.test_start[t], t));
        tests
    }
}
