/// Source of stable statement identifiers.
///
/// Identifiers are assigned client-side the first time a statement is
/// observed, are never reused, and are never supplied by the analysis
/// service. The generator is owned by the session, so identifiers cannot
/// leak across sessions.
pub trait IdGenerator: Send + Sync {
    fn next_id(&mut self) -> String;
}

pub struct UuidIdGen;

impl Default for UuidIdGen {
    fn default() -> Self {
        Self
    }
}

impl IdGenerator for UuidIdGen {
    fn next_id(&mut self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic generator for tests and golden snapshots where stable,
/// reproducible statement identifiers are required.
pub struct SequentialIdGen(u64);

impl SequentialIdGen {
    pub fn new() -> Self {
        Self(0)
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIdGen {
    fn next_id(&mut self) -> String {
        self.0 += 1;
        format!("st-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_ids_are_unique_and_ordered() {
        let mut ids = SequentialIdGen::new();
        assert_eq!(ids.next_id(), "st-1");
        assert_eq!(ids.next_id(), "st-2");
    }

    #[test]
    fn uuid_ids_are_distinct() {
        let mut ids = UuidIdGen;
        assert_ne!(ids.next_id(), ids.next_id());
    }
}
