use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("service call failed: {0}")]
    Service(crate::backend::ServiceError),

    /// The diarization service reported a failure in-band. The merge is
    /// abandoned for this cycle; cursors stay unchanged.
    #[error("diarization rejected: {0}")]
    Diarization(String),
}
