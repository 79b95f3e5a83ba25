use std::ops::Index;

/// The layout copies of one replicated schematic instance.
///
/// Only indexed access is offered; operations that should apply to every
/// copy go through [`ReplicaGroup::for_each`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaGroup<T> {
    base: String,
    items: Vec<T>,
}

impl<T> ReplicaGroup<T> {
    pub fn new(base: &str, items: Vec<T>) -> Self {
        Self {
            base: base.to_string(),
            items,
        }
    }

    /// Schematic instance name shared by every copy.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_replicated(&self) -> bool {
        self.items.len() > 1
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Runs `f` on every copy in index order, stopping at the first error.
    pub fn for_each<E>(&self, mut f: impl FnMut(usize, &T) -> Result<(), E>) -> Result<(), E> {
        for (i, item) in self.items.iter().enumerate() {
            f(i, item)?;
        }
        Ok(())
    }

    /// Runs `f` on copy `index` only. Returns `None` if it does not exist.
    pub fn for_one<R>(&self, index: usize, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.items.get(index).map(f)
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T> Index<usize> for ReplicaGroup<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<'a, T> IntoIterator for &'a ReplicaGroup<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexed_access() {
        let group = ReplicaGroup::new("MP", vec!["MP_0", "MP_1", "MP_2"]);
        assert_eq!(group.base(), "MP");
        assert_eq!(group.len(), 3);
        assert_eq!(group[1], "MP_1");
        assert!(group.get(3).is_none());
        assert!(group.is_replicated());
    }

    #[test]
    fn test_for_each_and_for_one() {
        let group = ReplicaGroup::new("X", vec![10, 20, 30]);
        let mut seen = Vec::new();
        group
            .for_each(|i, v| {
                seen.push((i, *v));
                Ok::<_, ()>(())
            })
            .unwrap();
        assert_eq!(seen, vec![(0, 10), (1, 20), (2, 30)]);
        assert_eq!(group.for_one(2, |v| v * 2), Some(60));
        assert_eq!(group.for_one(5, |v| v * 2), None);

        let stopped = group.for_each(|i, _| if i == 1 { Err(i) } else { Ok(()) });
        assert_eq!(stopped, Err(1));
    }
}
