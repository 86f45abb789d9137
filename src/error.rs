use thiserror::Error;

/// Failures encountered while building a dump record.
///
/// Every variant is downgraded to a diagnostic note on the emitted log
/// record; none of them propagate to the caller or alter the response
/// delivered to the client.
#[derive(Debug, Error)]
pub enum DumpError {
    /// Bytes were not valid for the declared format.
    #[error(transparent)]
    Decode(serde_json::Error),

    /// A typed value could not be re-serialized to the generic JSON form.
    #[error(transparent)]
    Encode(serde_json::Error),

    /// A request or response body stream could not be fully read.
    #[error(transparent)]
    BodyRead(axum::Error),

    /// The response body cannot be buffered for inspection.
    #[error("{0}")]
    CaptureUnavailable(&'static str),
}
