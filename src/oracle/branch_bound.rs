use crate::core::{Assignment, Oracle, OracleInstance, OracleOutcome, Timeline};
use std::time::{Duration, Instant};

/// Exact depth-first oracle.
/// It builds schedules serially: pick an unplaced test and a capable machine, start the test
/// at the earliest gap free on the machine and on all of its resources. Every active schedule is
/// reachable this way, so exhausting the tree proves the bound infeasible.
///
/// Pruning:
/// - tests that don't fit before the bound,
/// - remaining work against idle machine time and remaining resource holding time,
/// - empty machines of an already tried color,
/// - identical tests are placed in index order.
#[derive(Clone, Debug, Default)]
pub struct BranchAndBound;

impl Oracle for BranchAndBound {
    fn solve(&mut self, problem: &OracleInstance, bound: u64, timeout: Duration) -> OracleOutcome {
        let deadline = Instant::now().checked_add(timeout);
        Search::new(problem, bound, deadline).run()
    }

    fn name(&self) -> &'static str {
        "BranchAndBound"
    }
}

#[allow(unsafe_code)]
#[linkme::distributed_slice(super::ORACLES)]
static INSTANCE: fn() -> Box<dyn Oracle> = || Box::new(BranchAndBound);

enum Step {
    Found,
    Exhausted,
    Expired,
}

struct Search<'a> {
    problem: &'a OracleInstance,
    bound: u64,
    deadline: Option<Instant>,
    timeline: Timeline<'a>,
    placed: Vec<Option<(u64, usize)>>,
    twin: Vec<Option<usize>>,
    remaining_work: u64,
    remaining_resource: Vec<u64>,
}

impl<'a> Search<'a> {
    fn new(problem: &'a OracleInstance, bound: u64, deadline: Option<Instant>) -> Self {
        let instance = &problem.instance;
        let remaining_resource = instance
            .resource_use
            .iter()
            .map(|row| {
                let used = row.iter().zip(&instance.durations).filter(|(uses, _)| **uses);
                used.map(|(_, duration)| duration).sum()
            })
            .collect();

        Self {
            problem,
            bound,
            deadline,
            timeline: Timeline::new(instance),
            placed: vec![None; instance.num_tests()],
            twin: twins(problem),
            remaining_work: instance.durations.iter().sum(),
            remaining_resource,
        }
    }

    fn run(mut self) -> OracleOutcome {
        if self.problem.instance.durations.iter().any(|&d| d > self.bound) {
            return OracleOutcome::Infeasible;
        }

        match self.branch() {
            Step::Found => OracleOutcome::Feasible(self.assignment()),
            Step::Exhausted => OracleOutcome::Infeasible,
            Step::Expired => OracleOutcome::Timeout,
        }
    }

    fn branch(&mut self) -> Step {
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Step::Expired;
        }
        if self.remaining_work == 0 {
            return Step::Found;
        }
        if !self.relaxation_holds() {
            return Step::Exhausted;
        }

        let problem = self.problem;
        let durations = &problem.instance.durations;

        for test in 0..durations.len() {
            if self.placed[test].is_some() || self.twin[test].is_some_and(|t| self.placed[t].is_none()) {
                continue;
            }

            let mut tried_colors = Vec::new();
            for machine in problem.candidate_machines(test) {
                if self.timeline.machine_is_empty(machine) {
                    let color = problem.machine_color[machine];
                    if tried_colors.contains(&color) {
                        continue;
                    }
                    tried_colors.push(color);
                }

                let start = self.timeline.earliest_start(test, machine, 0);
                if start.saturating_add(durations[test]) > self.bound {
                    continue;
                }

                self.place(test, machine, start);
                match self.branch() {
                    Step::Exhausted => self.unplace(test, machine),
                    step => return step,
                }
            }
        }

        Step::Exhausted
    }

    fn relaxation_holds(&self) -> bool {
        let instance = &self.problem.instance;
        let idle: u64 = (0..instance.num_machines)
            .map(|m| self.bound.saturating_sub(self.timeline.machine_load(m)))
            .sum();

        self.remaining_work <= idle
            && self
                .remaining_resource
                .iter()
                .enumerate()
                .all(|(r, &left)| left + self.timeline.resource_load(r) <= self.bound)
    }

    fn place(&mut self, test: usize, machine: usize, start: u64) {
        let duration = self.problem.instance.durations[test];
        self.timeline.place(test, machine, start);
        self.placed[test] = Some((start, machine));
        self.remaining_work -= duration;
        for r in self.problem.instance.resources_of(test) {
            self.remaining_resource[r] -= duration;
        }
    }

    fn unplace(&mut self, test: usize, machine: usize) {
        let duration = self.problem.instance.durations[test];
        self.timeline.remove(test, machine);
        self.placed[test] = None;
        self.remaining_work += duration;
        for r in self.problem.instance.resources_of(test) {
            self.remaining_resource[r] += duration;
        }
    }

    fn assignment(&self) -> Assignment {
        let durations = &self.problem.instance.durations;
        let (test_start, test_machine): (Vec<_>, Vec<_>) = self
            .placed
            .iter()
            .map(|slot| slot.unwrap_or_else(|| unreachable!("All tests are placed")))
            .unzip();
        let time = test_start.iter().zip(durations).map(|(s, d)| s + d).max().unwrap_or_default();

        Assignment {
            time,
            test_start,
            test_machine,
        }
    }
}

/// For every test, the closest earlier test with the same duration, markers and resources.
fn twins(problem: &OracleInstance) -> Vec<Option<usize>> {
    let instance = &problem.instance;
    let same = |a: usize, b: usize| {
        instance.durations[a] == instance.durations[b]
            && problem.markers.iter().all(|row| row[a] == row[b])
            && instance.resource_use.iter().all(|row| row[a] == row[b])
    };
    (0..instance.num_tests())
        .map(|t| (0..t).rev().find(|&other| same(other, t)))
        .collect()
}
