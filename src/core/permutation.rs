use super::{Instance, PriorityMetadata};

/// Bijection between original test indices and working indices.
/// `order[working] == original` and `position[original] == working`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Permutation {
    order: Vec<usize>,
    position: Vec<usize>,
}

impl Permutation {
    /// Creates a permutation from the working order.
    /// Returns `None` if `order` is not a permutation of `0..order.len()`.
    #[must_use]
    pub fn from_order(order: Vec<usize>) -> Option<Self> {
        let mut position = vec![usize::MAX; order.len()];
        for (working, &original) in order.iter().enumerate() {
            let slot = position.get_mut(original)?;
            if *slot != usize::MAX {
                return None;
            }
            *slot = working;
        }
        Some(Self { order, position })
    }

    /// Sorts tests by descending priority. Ties keep the original order.
    #[must_use]
    pub fn by_priority(meta: &PriorityMetadata) -> Self {
        let mut order: Vec<usize> = (0..meta.len()).collect();
        order.sort_by(|&a, &b| meta.compare(a, b));
        Self::from_order(order).unwrap_or_else(|| unreachable!("Sorted indices form a permutation"))
    }

    /// Returns the number of tests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns whether the permutation is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns the original index of a working index.
    #[must_use]
    pub fn original(&self, working: usize) -> usize {
        self.order[working]
    }

    /// Returns the working index of an original index.
    #[must_use]
    pub fn working(&self, original: usize) -> usize {
        self.position[original]
    }

    /// Moves values from original order to working order.
    #[must_use]
    pub fn reorder<T: Clone>(&self, values: &[T]) -> Vec<T> {
        self.order.iter().map(|&original| values[original].clone()).collect()
    }

    /// Moves values from working order back to original order.
    #[must_use]
    pub fn revert<T: Clone>(&self, values: &[T]) -> Vec<T> {
        self.position.iter().map(|&working| values[working].clone()).collect()
    }

    /// Reorders every row of a matrix whose columns are tests.
    #[must_use]
    pub fn reorder_matrix<T: Clone>(&self, matrix: &[Vec<T>]) -> Vec<Vec<T>> {
        matrix.iter().map(|row| self.reorder(row)).collect()
    }

    /// Reverts every row of a matrix whose columns are tests.
    #[must_use]
    pub fn revert_matrix<T: Clone>(&self, matrix: &[Vec<T>]) -> Vec<Vec<T>> {
        matrix.iter().map(|row| self.revert(row)).collect()
    }

    /// Creates a copy of the instance with tests in working order.
    #[must_use]
    pub fn reorder_instance(&self, instance: &Instance) -> Instance {
        Instance {
            num_machines: instance.num_machines,
            num_resources: instance.num_resources,
            names: self.reorder(&instance.names),
            durations: self.reorder(&instance.durations),
            capability: self.reorder_matrix(&instance.capability),
            resource_use: self.reorder_matrix(&instance.resource_use),
        }
    }
}
