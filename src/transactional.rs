//! Single-owner value holder distinguishing original and current state.

/// A mutable slot that remembers the value it was created with.
///
/// Every request attribute a policy may rewrite (target indices, response
/// headers) lives in a `TransactionalField`. The initial value is fixed at
/// construction; the current value is replaced through [`mutate`] and pushed
/// to the host at most once per mutation through [`commit`].
///
/// Not designed for concurrent access: one field belongs to one context,
/// which belongs to the thread processing its request.
///
/// # Examples
///
/// ```
/// use request_scope::TransactionalField;
///
/// let mut field = TransactionalField::new("indices", vec!["logs".to_string()]);
/// field.mutate(vec!["logs-2024".to_string()]);
///
/// assert_eq!(field.initial(), &vec!["logs".to_string()]);
/// assert_eq!(field.get(), &vec!["logs-2024".to_string()]);
///
/// let mut pushed = Vec::new();
/// assert!(field.commit(|v| pushed = v.clone()));
/// assert_eq!(pushed, vec!["logs-2024".to_string()]);
/// ```
///
/// [`mutate`]: TransactionalField::mutate
/// [`commit`]: TransactionalField::commit
#[derive(Debug, Clone)]
pub struct TransactionalField<T> {
    name: &'static str,
    initial: T,
    current: T,
    committed: bool,
    // Value last handed to the host, if any.
    applied: Option<T>,
}

impl<T: Clone + PartialEq> TransactionalField<T> {
    /// Creates a field whose initial and current values are both `initial`.
    pub fn new(name: &'static str, initial: T) -> Self {
        Self {
            name,
            current: initial.clone(),
            initial,
            committed: false,
            applied: None,
        }
    }

    /// Name used in diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the value the field was created with.
    pub fn initial(&self) -> &T {
        &self.initial
    }

    /// Returns the current value.
    pub fn get(&self) -> &T {
        &self.current
    }

    /// Replaces the current value.
    ///
    /// A replaced value must be committed again before the host sees it.
    pub fn mutate(&mut self, value: T) {
        self.current = value;
        self.committed = false;
    }

    /// Restores the initial value.
    pub fn rollback(&mut self) {
        self.mutate(self.initial.clone());
    }

    /// Returns `true` if the current value differs from the initial one.
    pub fn is_dirty(&self) -> bool {
        self.current != self.initial
    }

    /// Returns `true` once the current value has been committed.
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Hands the current value to `apply` if the host does not hold it yet.
    ///
    /// Returns whether `apply` was invoked. The field is marked committed
    /// either way, so repeated commits without an intervening mutation are
    /// no-ops.
    pub fn commit(&mut self, apply: impl FnOnce(&T)) -> bool {
        if self.committed {
            return false;
        }
        self.committed = true;
        let held = self.applied.as_ref().unwrap_or(&self.initial);
        if *held == self.current {
            return false;
        }
        apply(&self.current);
        self.applied = Some(self.current.clone());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_field_is_clean() {
        let field = TransactionalField::new("headers", 3);

        assert_eq!(field.name(), "headers");
        assert_eq!(*field.initial(), 3);
        assert_eq!(*field.get(), 3);
        assert!(!field.is_dirty());
        assert!(!field.is_committed());
    }

    #[test]
    fn mutate_keeps_initial() {
        let mut field = TransactionalField::new("n", 1);
        field.mutate(2);
        field.mutate(5);

        assert_eq!(*field.initial(), 1);
        assert_eq!(*field.get(), 5);
        assert!(field.is_dirty());
    }

    #[test]
    fn commit_skips_unchanged_value() {
        let mut field = TransactionalField::new("n", 1);
        let mut calls = 0;

        assert!(!field.commit(|_| calls += 1));
        assert_eq!(calls, 0);
        assert!(field.is_committed());
    }

    #[test]
    fn commit_runs_once_per_mutation() {
        let mut field = TransactionalField::new("n", 1);
        let mut seen = Vec::new();

        field.mutate(2);
        assert!(field.commit(|v| seen.push(*v)));
        assert!(!field.commit(|v| seen.push(*v)));

        field.mutate(3);
        assert!(!field.is_committed());
        assert!(field.commit(|v| seen.push(*v)));

        assert_eq!(seen, vec![2, 3]);
    }

    #[test]
    fn commit_pushes_rollback_after_earlier_commit() {
        let mut field = TransactionalField::new("n", 1);
        let mut seen = Vec::new();

        field.mutate(2);
        field.commit(|v| seen.push(*v));
        field.rollback();
        assert!(field.commit(|v| seen.push(*v)));

        assert_eq!(seen, vec![2, 1]);
    }

    #[test]
    fn rollback_restores_initial() {
        let mut field = TransactionalField::new("n", "a".to_string());
        field.mutate("b".to_string());
        field.rollback();

        assert_eq!(field.get(), "a");
        assert!(!field.is_dirty());
    }
}
