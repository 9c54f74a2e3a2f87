//! Resume capability for scans
//!
//! Checkpoint persistence with atomic writes, field-by-field
//! normalization of loaded checkpoints, and the in-process registry of
//! running scans.

pub mod normalize;
pub mod registry;
pub mod state;

pub use normalize::{normalize, NormalizeContext};
pub use registry::{ScanGuard, ScanRegistry, SharedRegistry};
pub use state::{
    read_checkpoint, write_checkpoint, CheckpointSettings, CheckpointState, ResumeError,
    CHECKPOINT_VERSION,
};
