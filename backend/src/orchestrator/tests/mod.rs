//! Orchestrator unit tests that need a hand-built problem

mod test_invariant_checks;
