use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the propagation engine.
///
/// Every fallible engine operation returns this enum; there is no
/// `.unwrap()`/`.expect()` path through a run. Each variant carries enough
/// context to be actionable.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid user or API parameter (non-positive mass or time step,
    /// mismatched vector lengths, degenerate acceptance ratio).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A position, velocity, or acceleration component became non-finite
    /// after an update. Continued propagation is physically meaningless.
    #[error("numerical divergence: {0}")]
    Divergence(String),

    /// The external energy model could not evaluate the current
    /// configuration (e.g. singular geometry). Never retried.
    #[error("energy model failure: {0}")]
    EnergyModel(String),

    /// Propagated I/O errors from file-backed observers.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
