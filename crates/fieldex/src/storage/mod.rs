pub mod filesystem;
pub mod keys;

pub use filesystem::{check_not_busy, ensure_directory, FileStorage};
pub use keys::ArchivedKeyStore;
