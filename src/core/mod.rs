mod analysis;
mod permutation;
mod problem;
mod solution;
mod util;

pub use analysis::*;
pub use permutation::*;
pub use problem::*;
pub use solution::*;
pub use util::*;

use std::time::Duration;

/// Instance in working order as it's handed to an oracle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OracleInstance {
    pub instance: Instance,
    /// `[machine][test]` capability markers, see [`Marker`].
    pub markers: Vec<Vec<u8>>,
    pub machine_color: Vec<usize>,
}

impl OracleInstance {
    /// Builds the working instance handed to the oracle.
    /// Markers are computed on the original instance and permuted with it.
    #[must_use]
    pub fn new(instance: &Instance, meta: &PriorityMetadata, permutation: &Permutation) -> Self {
        Self {
            instance: permutation.reorder_instance(instance),
            markers: permutation.reorder_matrix(&meta.capability_markers(instance)),
            machine_color: meta.machine_color.clone(),
        }
    }

    /// Returns the machines the oracle may use for the test.
    /// A test with an exclusive marker yields only that machine.
    pub fn candidate_machines(&self, test: usize) -> impl Iterator<Item = usize> + '_ {
        let exclusive = (0..self.markers.len())
            .find(|&m| self.markers[m][test] == u8::from(Marker::Exclusive));
        (0..self.markers.len())
            .filter(move |&m| self.markers[m][test] != u8::from(Marker::Forbidden))
            .filter(move |&m| exclusive.map_or(true, |e| e == m))
    }
}

/// Start times and machines found by an oracle, in working order.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Assignment {
    /// Completion time the oracle reports for the assignment.
    pub time: u64,
    pub test_start: Vec<u64>,
    pub test_machine: Vec<usize>,
}

impl Assignment {
    /// Converts the assignment into a schedule.
    #[must_use]
    pub fn into_schedule(self) -> Schedule {
        Schedule::new(self.test_start, self.test_machine)
    }
}

/// Answer of an oracle for a single makespan bound.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OracleOutcome {
    Feasible(Assignment),
    Infeasible,
    Timeout,
}

/// Decides whether the tests fit within a makespan bound.
pub trait Oracle {
    /// Searches for an assignment completing within `bound`.
    /// Gives up with [`OracleOutcome::Timeout`] after `timeout` wall-clock time.
    fn solve(&mut self, problem: &OracleInstance, bound: u64, timeout: Duration) -> OracleOutcome;

    /// Returns the name of the oracle.
    fn name(&self) -> &'static str;
}
