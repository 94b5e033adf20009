//! Error types for the ODP segments client.

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("user key `{0}` is not supported yet, only `vuid` can be queried")]
    UnsupportedUserKey(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("download failed")]
    TransportFailed(#[source] anyhow::Error),
    #[error("response data empty")]
    EmptyResponse,
    #[error("decode error")]
    DecodeFailed(#[source] anyhow::Error),
}
