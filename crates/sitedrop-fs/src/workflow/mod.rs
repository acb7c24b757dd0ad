pub mod transaction;
pub mod workspace;

pub use transaction::Transaction;
pub use workspace::Workspace;
