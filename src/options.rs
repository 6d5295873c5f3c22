/// Name used in logs when none is configured.
pub const DEFAULT_POOL_NAME: &str = "gather_pool";

/// Construction options for a `GatherPool`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
  /// Number of unread results the conduit buffers before pushing workers block.
  /// `0` means the conduit is unbounded: workers never wait, and results pile
  /// up in memory for as long as nobody consumes them.
  pub capacity: usize,
  /// Name attached to every log record and error produced by the pool.
  pub name: String,
}

impl Default for PoolOptions {
  fn default() -> Self {
    Self {
      capacity: 0,
      name: DEFAULT_POOL_NAME.to_string(),
    }
  }
}

impl PoolOptions {
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets the result buffer size. `0` keeps the conduit unbounded, buffering
  /// every unread result in memory.
  pub fn capacity(mut self, capacity: usize) -> Self {
    self.capacity = capacity;
    self
  }

  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn is_bounded(&self) -> bool {
    self.capacity > 0
  }
}
