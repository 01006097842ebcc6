//! The crash-recovery snapshot store.
//!
//! Independent of the undo history: the record collection and this store
//! evolve separately, and nothing here is an undo unit. Entries are keyed by
//! document id, stamped with wall-clock time, and exposed newest-first.

mod medium;
mod store;

pub use medium::{DirMedium, MemoryMedium, StorageMedium};
pub use store::{AutosaveTicket, RecoveryEntry, RecoveryStore, RECOVERY_KEY_PREFIX};
