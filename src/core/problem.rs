use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A test declaration before it's folded into the instance matrices.
/// Machine and resource references are 0-based. Empty `machines` means any machine.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Serialize, PartialEq)]
pub struct Test {
    pub name: String,
    pub duration: u64,
    pub machines: Vec<usize>,
    pub resources: Vec<usize>,
}

impl Test {
    /// Creates a new test that may run on any machine and uses no resources.
    #[must_use]
    pub fn new(name: impl Into<String>, duration: u64) -> Self {
        Self {
            name: name.into(),
            duration,
            machines: Vec::new(),
            resources: Vec::new(),
        }
    }

    /// Restricts the test to the given machines.
    #[must_use]
    pub fn on(mut self, machines: &[usize]) -> Self {
        self.machines = machines.to_vec();
        self
    }

    /// Makes the test hold the given resources.
    #[must_use]
    pub fn using(mut self, resources: &[usize]) -> Self {
        self.resources = resources.to_vec();
        self
    }
}

/// Reasons an instance can't be built.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum InstanceError {
    #[error("instance needs at least one test and one machine")]
    Empty,
    #[error("test {0} has zero duration")]
    ZeroDuration(usize),
    #[error("test {0} cannot run on any machine")]
    NoCapableMachine(usize),
    #[error("total duration of the tests exceeds {}", u64::MAX)]
    DurationOverflow,
    #[error("test {test} references unknown {kind} {index}")]
    UnknownReference {
        test: usize,
        kind: &'static str,
        index: usize,
    },
    #[error("{what} matrix must have shape {rows}x{cols}")]
    Shape {
        what: &'static str,
        rows: usize,
        cols: usize,
    },
}

/// An instance of the test scheduling problem.
/// Matrices are indexed `[machine][test]` and `[resource][test]`.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Serialize, PartialEq)]
pub struct Instance {
    pub num_machines: usize,
    pub num_resources: usize,
    pub names: Vec<String>,
    pub durations: Vec<u64>,
    pub capability: Vec<Vec<bool>>,
    pub resource_use: Vec<Vec<bool>>,
}

impl Instance {
    /// Creates an instance from raw matrices.
    ///
    /// # Errors
    /// - If the matrix shapes don't match the counts.
    /// - If a test has zero duration or no capable machine.
    /// - If the total duration doesn't fit in `u64`.
    pub fn new(
        names: Vec<String>,
        durations: Vec<u64>,
        capability: Vec<Vec<bool>>,
        resource_use: Vec<Vec<bool>>,
    ) -> Result<Self, InstanceError> {
        let instance = Self {
            num_machines: capability.len(),
            num_resources: resource_use.len(),
            names,
            durations,
            capability,
            resource_use,
        };
        instance.validate()?;
        Ok(instance)
    }

    /// Creates an instance from test declarations.
    ///
    /// # Errors
    /// - If a declaration references a machine or resource out of range.
    /// - If the resulting instance is invalid, see [`Instance::new`].
    pub fn from_tests(
        num_machines: usize,
        num_resources: usize,
        tests: Vec<Test>,
    ) -> Result<Self, InstanceError> {
        let n = tests.len();
        let mut capability = vec![vec![false; n]; num_machines];
        let mut resource_use = vec![vec![false; n]; num_resources];
        let mut names = Vec::with_capacity(n);
        let mut durations = Vec::with_capacity(n);

        for (index, test) in tests.into_iter().enumerate() {
            if test.machines.is_empty() {
                capability.iter_mut().for_each(|row| row[index] = true);
            }
            for &machine in &test.machines {
                let row = capability.get_mut(machine).ok_or(InstanceError::UnknownReference {
                    test: index,
                    kind: "machine",
                    index: machine,
                })?;
                row[index] = true;
            }
            for &resource in &test.resources {
                let row = resource_use.get_mut(resource).ok_or(InstanceError::UnknownReference {
                    test: index,
                    kind: "resource",
                    index: resource,
                })?;
                row[index] = true;
            }
            names.push(test.name);
            durations.push(test.duration);
        }

        Self::new(names, durations, capability, resource_use)
    }

    fn validate(&self) -> Result<(), InstanceError> {
        let n = self.durations.len();
        if n == 0 || self.num_machines == 0 {
            return Err(InstanceError::Empty);
        }
        if self.names.len() != n {
            return Err(InstanceError::Shape {
                what: "name",
                rows: 1,
                cols: n,
            });
        }
        if self.capability.len() != self.num_machines
            || self.capability.iter().any(|row| row.len() != n)
        {
            return Err(InstanceError::Shape {
                what: "capability",
                rows: self.num_machines,
                cols: n,
            });
        }
        if self.resource_use.len() != self.num_resources
            || self.resource_use.iter().any(|row| row.len() != n)
        {
            return Err(InstanceError::Shape {
                what: "resource",
                rows: self.num_resources,
                cols: n,
            });
        }
        if let Some(test) = self.durations.iter().position(|&d| d == 0) {
            return Err(InstanceError::ZeroDuration(test));
        }
        if let Some(test) = (0..n).find(|&t| self.machines_of(t).next().is_none()) {
            return Err(InstanceError::NoCapableMachine(test));
        }
        // Bounds and timelines sum durations.
        self.durations
            .iter()
            .try_fold(0u64, |total, &d| total.checked_add(d))
            .ok_or(InstanceError::DurationOverflow)?;
        Ok(())
    }

    /// Returns the number of tests.
    #[must_use]
    pub fn num_tests(&self) -> usize {
        self.durations.len()
    }

    /// Returns whether the machine may run the test.
    #[must_use]
    pub fn can_run(&self, machine: usize, test: usize) -> bool {
        self.capability[machine][test]
    }

    /// Returns the machines capable of running the test.
    pub fn machines_of(&self, test: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.num_machines).filter(move |&m| self.capability[m][test])
    }

    /// Returns the resources held by the test.
    pub fn resources_of(&self, test: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.num_resources).filter(move |&r| self.resource_use[r][test])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_machine_list_means_any_machine() -> anyhow::Result<()> {
        let tests = vec![Test::new("t1", 3), Test::new("t2", 2).on(&[1]).using(&[0])];
        let instance = Instance::from_tests(3, 1, tests)?;

        assert_eq!(instance.machines_of(0).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(instance.machines_of(1).collect::<Vec<_>>(), vec![1]);
        assert_eq!(instance.resources_of(1).collect::<Vec<_>>(), vec![0]);
        assert_eq!(instance.resources_of(0).count(), 0);
        assert_eq!(instance.num_tests(), 2);
        Ok(())
    }

    #[test]
    fn invalid_instances_are_rejected() {
        let zero = Instance::from_tests(1, 0, vec![Test::new("t1", 0)]);
        assert_eq!(zero, Err(InstanceError::ZeroDuration(0)));

        let unknown = Instance::from_tests(1, 0, vec![Test::new("t1", 1).on(&[3])]);
        assert!(matches!(
            unknown,
            Err(InstanceError::UnknownReference { kind: "machine", .. })
        ));

        assert_eq!(Instance::from_tests(1, 0, vec![]), Err(InstanceError::Empty));

        let capability = vec![vec![false]];
        let orphan = Instance::new(vec!["t1".into()], vec![1], capability, vec![]);
        assert_eq!(orphan, Err(InstanceError::NoCapableMachine(0)));
    }

    #[test]
    fn overflowing_total_duration_is_rejected() {
        let tests = vec![Test::new("t1", u64::MAX), Test::new("t2", 1)];
        let huge = Instance::from_tests(2, 0, tests);
        assert_eq!(huge, Err(InstanceError::DurationOverflow));

        let tests = vec![Test::new("t1", u64::MAX - 1), Test::new("t2", 1)];
        assert!(Instance::from_tests(2, 0, tests).is_ok());
    }
}
