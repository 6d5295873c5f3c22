use thiserror::Error;

/// Errors that can occur within a `gather_pool` pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
  #[error("Results of batch {batch} in pool '{pool}' are already being collected by another consumer")]
  AlreadyCollecting { pool: String, batch: u64 },
}

/// Errors returned by the typed accessors of `Args`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgError {
  #[error("Argument {index} is missing (worker received {len} arguments)")]
  Missing { index: usize, len: usize },

  #[error("Argument {index} has type {found}, expected {expected}")]
  TypeMismatch {
    index: usize,
    expected: &'static str,
    found: &'static str,
  },
}
