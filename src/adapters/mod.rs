pub mod in_memory_account_repository;
pub mod in_memory_transaction_repository;
pub mod postgres_account_repository;
pub mod postgres_transaction_repository;

pub use in_memory_account_repository::InMemoryAccountRepository;
pub use in_memory_transaction_repository::InMemoryTransactionRepository;
pub use postgres_account_repository::PostgresAccountRepository;
pub use postgres_transaction_repository::PostgresTransactionRepository;

/// Buffered change notifications per repository. Slow subscribers that fall
/// further behind than this see a `Lagged` error and resync from a snapshot.
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 256;
