pub mod git;
pub mod lock;
pub mod manager;
pub mod vcs;

pub use lock::AttemptLock;
pub use manager::{Workspace, WorkspaceManager};
pub use vcs::{Git2Vcs, Vcs};
