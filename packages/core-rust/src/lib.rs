//! Chassis Core: service descriptors, rank conventions, and the session
//! collaborator traits shared by the runtime.

pub mod descriptor;
pub mod job;
pub mod rank;
pub mod session;

pub use descriptor::{OperationSpec, ServiceDescriptor, SharingPolicy, TypeKey};
pub use job::{JobDescriptor, JobKind};
pub use rank::{effective_rank, precedence_key, NEUTRAL_PRIORITY};
pub use session::{Session, SessionBackend, SessionError};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
