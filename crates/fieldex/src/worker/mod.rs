pub mod job;
pub mod pool;
pub mod scanner;

pub use job::{DocumentJob, ExtractedDocument};
pub use pool::WorkerPool;
pub use scanner::DirectoryScanner;
