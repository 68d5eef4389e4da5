//! Error type for the simulation kernel.

use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the kernel.
///
/// `InvalidParam` is the only variant caused by caller input. The others are
/// faults the caller is expected to treat as fatal for the simulation
/// instance that produced them.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid construction or configuration parameter.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// The sorted spatial lookup table is not ordered by bucket key after a
    /// rebuild. Indicates a defect in the sort, not bad simulation state.
    #[error(
        "spatial index corrupted: entry {index} has bucket key {key} after key {previous}"
    )]
    IndexCorrupted {
        /// Position in the sorted table where ordering breaks.
        index: usize,
        /// Key of the entry just before `index`.
        previous: u32,
        /// Key of the entry at `index`.
        key: u32,
    },

    /// Growing particle storage failed.
    #[error("failed to allocate storage for {requested} particles")]
    Allocation {
        /// Total particle count that was requested.
        requested: usize,
    },

    /// The dedicated worker pool could not be created.
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    /// `true` for internal-consistency and resource faults after which the
    /// simulation must not keep stepping.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::InvalidParam(_))
    }
}
