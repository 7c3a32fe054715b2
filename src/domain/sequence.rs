/// Confines an object to the execution context it was bound to.
///
/// Construction may happen anywhere; `bind` is a one-time handoff after
/// which `check` passes. Using the object before binding, or binding it
/// twice, is a usage error and panics.
#[derive(Debug)]
pub struct SequenceChecker {
    owner: &'static str,
    bound: bool,
}

impl SequenceChecker {
    pub fn new(owner: &'static str) -> Self {
        Self { owner, bound: false }
    }

    pub fn bind(&mut self) {
        assert!(!self.bound, "{} is already bound to an execution context", self.owner);
        self.bound = true;
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    #[track_caller]
    pub fn check(&self) {
        assert!(
            self.bound,
            "{} used before being bound to its execution context",
            self.owner
        );
    }
}
