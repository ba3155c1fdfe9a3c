//! Dojo Core: pseudopotentials, dojo reports, report stores, challenge runners.
//!
//! This crate holds the leaf data model of the validation dojo:
//! - `Pseudopotential` artifacts and filename resolution
//! - `DojoReport`, the level-keyed cumulative report, and `LevelKeys`
//! - `ReportStore` persistence (JSON directory store, in-memory store)
//! - The `ChallengeRunner` boundary to external numerical engines

pub mod challenge;
pub mod pseudo;
pub mod report;
pub mod store;

pub use challenge::{
    check_cancelled, ChallengeError, ChallengeRequest, ChallengeRunner, ParameterSet, RawResult,
    ResultFileRunner,
};
pub use pseudo::{FileResolver, PseudoRef, PseudoResolver, Pseudopotential, ResolveError};
pub use report::{DojoReport, LevelKeys, ReportError};
pub use store::{MemoryReportStore, ReportDir, ReportStore};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: core types can cross the rayon worker boundary.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Pseudopotential>();
        require_sync::<Pseudopotential>();
        require_send::<DojoReport>();
        require_sync::<DojoReport>();
        require_send::<LevelKeys>();
        require_sync::<LevelKeys>();
        require_send::<ParameterSet>();
        require_sync::<ParameterSet>();
        require_send::<ReportDir>();
        require_sync::<ReportDir>();
        require_send::<MemoryReportStore>();
        require_sync::<MemoryReportStore>();
        require_send::<FileResolver>();
        require_sync::<FileResolver>();
        require_send::<ResultFileRunner>();
        require_sync::<ResultFileRunner>();
    }

    /// The store and runner traits are object safe and shareable.
    #[test]
    fn boundary_traits_are_object_safe() {
        fn _takes_store(_: &dyn ReportStore) {}
        fn _takes_runner(_: &dyn ChallengeRunner) {}
        fn _takes_resolver(_: &dyn PseudoResolver) {}

        let store = MemoryReportStore::new();
        _takes_store(&store);
        _takes_runner(&ResultFileRunner::new());
        _takes_resolver(&FileResolver::new());
    }
}
