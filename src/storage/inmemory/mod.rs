//! In-memory storage implementations

mod applications;

pub use applications::MemoryApplicationStore;
