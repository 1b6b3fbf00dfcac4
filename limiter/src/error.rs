#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// The deadline passed before a permit became available. The acquirer left the wait
    /// set and holds nothing.
    #[error("canceled after waiting {waited:?} for a permit")]
    Canceled { waited: std::time::Duration },

    #[error("no limiter registered under {name:?}")]
    UnknownLimiter { name: String },
}

pub type Result<T> = std::result::Result<T, Error>;
