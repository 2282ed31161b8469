use super::Instance;

/// Busy interval `[start, end)` held by a test.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
struct Busy {
    start: u64,
    end: u64,
    test: usize,
}

impl Busy {
    const fn overlaps(&self, start: u64, end: u64) -> bool {
        self.start < end && start < self.end
    }
}

/// Occupation of machines and resources by already placed tests.
/// It's used to place tests without overlaps on machines and resources.
#[derive(Clone, Debug)]
pub struct Timeline<'a> {
    instance: &'a Instance,
    machines: Vec<Vec<Busy>>,
    resources: Vec<Vec<Busy>>,
    machine_load: Vec<u64>,
    resource_load: Vec<u64>,
}

impl<'a> Timeline<'a> {
    /// Creates an empty timeline.
    #[must_use]
    pub fn new(instance: &'a Instance) -> Self {
        Self {
            instance,
            machines: vec![Vec::new(); instance.num_machines],
            resources: vec![Vec::new(); instance.num_resources],
            machine_load: vec![0; instance.num_machines],
            resource_load: vec![0; instance.num_resources],
        }
    }

    /// Check if the test can start at the given time on the machine
    /// without overlapping any placed test on the machine or its resources.
    #[must_use]
    pub fn is_free(&self, test: usize, machine: usize, start: u64) -> bool {
        let end = start.saturating_add(self.instance.durations[test]);
        let machine_free = !self.machines[machine].iter().any(|b| b.overlaps(start, end));
        machine_free
            && self
                .instance
                .resources_of(test)
                .all(|r| !self.resources[r].iter().any(|b| b.overlaps(start, end)))
    }

    /// Calculates the first time not earlier than `from` when the test fits on the machine.
    /// Candidates are `from` and the ends of intervals blocking the test.
    #[must_use]
    pub fn earliest_start(&self, test: usize, machine: usize, from: u64) -> u64 {
        let resources = self.instance.resources_of(test).flat_map(|r| &self.resources[r]);
        let mut times: Vec<_> = self.machines[machine]
            .iter()
            .chain(resources)
            .map(|b| b.end)
            .filter(|&end| end > from)
            .collect();
        times.push(from);
        times.sort_unstable();
        times.dedup();

        times
            .into_iter()
            .find(|&time| self.is_free(test, machine, time))
            .unwrap_or_else(|| unreachable!("Time after the last interval is always free"))
    }

    /// Places a test. The slot must be free.
    pub fn place(&mut self, test: usize, machine: usize, start: u64) {
        let duration = self.instance.durations[test];
        let busy = Busy {
            start,
            end: start.saturating_add(duration),
            test,
        };
        self.machines[machine].push(busy);
        self.machine_load[machine] += duration;
        for r in self.instance.resources_of(test) {
            self.resources[r].push(busy);
            self.resource_load[r] += duration;
        }
    }

    /// Removes a previously placed test.
    pub fn remove(&mut self, test: usize, machine: usize) {
        let duration = self.instance.durations[test];
        self.machines[machine].retain(|b| b.test != test);
        self.machine_load[machine] -= duration;
        for r in self.instance.resources_of(test) {
            self.resources[r].retain(|b| b.test != test);
            self.resource_load[r] -= duration;
        }
    }

    /// Returns whether no test is placed on the machine.
    #[must_use]
    pub fn machine_is_empty(&self, machine: usize) -> bool {
        self.machines[machine].is_empty()
    }

    /// Returns the total busy time of the machine.
    #[must_use]
    pub fn machine_load(&self, machine: usize) -> u64 {
        self.machine_load[machine]
    }

    /// Returns the total time the resource is held.
    #[must_use]
    pub fn resource_load(&self, resource: usize) -> u64 {
        self.resource_load[resource]
    }
}
