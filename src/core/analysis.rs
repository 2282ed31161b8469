//! Priority and symmetry metadata derived from an instance.
//!
//! Nothing here is stored with the instance. It's recomputed for every solve.

use super::Instance;
use ahash::{HashMap, HashMapExt};
use std::cmp::Ordering;

/// Weight of the resource count in [`PriorityMetadata::combined_priority`].
/// The combined value orders tests lexicographically only while `num_machines < PRIORITY_WEIGHT`.
pub const PRIORITY_WEIGHT: u64 = 1000;

/// Capability marker handed to the oracle.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum Marker {
    Forbidden = 0,
    Allowed = 1,
    /// The machine is the only one capable of running the test.
    Exclusive = 2,
}

impl From<Marker> for u8 {
    fn from(marker: Marker) -> Self {
        marker as Self
    }
}

/// Per-test priorities and per-machine symmetry classes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PriorityMetadata {
    pub machines_per_test: Vec<usize>,
    pub resource_priority: Vec<usize>,
    pub combined_priority: Vec<u64>,
    pub machine_color: Vec<usize>,
    pub forced_machine: Vec<bool>,
    num_machines: usize,
}

/// Computes the priority metadata of the instance.
#[must_use]
pub fn analyze(instance: &Instance) -> PriorityMetadata {
    let n = instance.num_tests();
    let m = instance.num_machines;

    let machines_per_test: Vec<usize> = (0..n).map(|t| instance.machines_of(t).count()).collect();
    let resource_priority: Vec<usize> = (0..n).map(|t| instance.resources_of(t).count()).collect();
    let combined_priority = resource_priority
        .iter()
        .zip(&machines_per_test)
        .map(|(&resources, &machines)| {
            crate::cast_u64(resources) * PRIORITY_WEIGHT + crate::cast_u64(m - machines)
        })
        .collect();
    let forced_machine = machines_per_test.iter().map(|&count| count == 1).collect();

    PriorityMetadata {
        machines_per_test,
        resource_priority,
        combined_priority,
        machine_color: machine_colors(instance),
        forced_machine,
        num_machines: m,
    }
}

/// Groups machines with identical capability rows. Colors are numbered in order of first appearance.
fn machine_colors(instance: &Instance) -> Vec<usize> {
    let mut classes: HashMap<&[bool], usize> = HashMap::new();
    instance
        .capability
        .iter()
        .map(|row| {
            let next = classes.len();
            *classes.entry(row.as_slice()).or_insert(next)
        })
        .collect()
}

impl PriorityMetadata {
    /// Returns the number of analyzed tests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.combined_priority.len()
    }

    /// Returns whether no test was analyzed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.combined_priority.is_empty()
    }

    /// Returns the number of distinct machine colors.
    #[must_use]
    pub fn colors(&self) -> usize {
        self.machine_color.iter().max().map_or(0, |&max| max + 1)
    }

    /// Lexicographic priority key: resource count first, then machine scarcity.
    /// It agrees with `combined_priority` whenever the weighting doesn't overflow into the resource count.
    #[must_use]
    pub fn priority_key(&self, test: usize) -> (usize, usize) {
        (
            self.resource_priority[test],
            self.num_machines - self.machines_per_test[test],
        )
    }

    /// Orders tests by descending priority, ties by ascending index.
    #[must_use]
    pub fn compare(&self, first: usize, second: usize) -> Ordering {
        self.priority_key(second)
            .cmp(&self.priority_key(first))
            .then(first.cmp(&second))
    }

    /// Builds the `[machine][test]` marker matrix for the oracle.
    /// The sole capable machine of a forced test is marked [`Marker::Exclusive`].
    #[must_use]
    pub fn capability_markers(&self, instance: &Instance) -> Vec<Vec<u8>> {
        instance
            .capability
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(test, &allowed)| match (allowed, self.forced_machine[test]) {
                        (false, _) => Marker::Forbidden,
                        (true, false) => Marker::Allowed,
                        (true, true) => Marker::Exclusive,
                    })
                    .map(u8::from)
                    .collect()
            })
            .collect()
    }
}
