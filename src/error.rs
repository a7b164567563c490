use storage::BackendError;

#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    #[error("Group not found: {0}")]
    GroupNotFound(String),
    #[error("Member not found: {0}")]
    MemberNotFound(String),
    #[error("No member named {0:?}")]
    NoMemberNamed(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    GroupError(#[from] GroupError),
    #[error("Persistence failure: {0}")]
    BackendError(#[from] BackendError),
    #[error("JSON processing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error(transparent)]
    StoreError(#[from] StoreError),
    #[error("Group store is not running")]
    StoreUnavailable,
}

impl DispatchError {
    /// HTTP-style status used by both the REST endpoint and websocket `err` frames.
    pub fn status_code(&self) -> u16 {
        match self {
            DispatchError::UnknownAction(_) | DispatchError::InvalidPayload(_) => 400,
            DispatchError::StoreError(StoreError::GroupError(err)) => match err {
                GroupError::GroupNotFound(_)
                | GroupError::MemberNotFound(_)
                | GroupError::NoMemberNamed(_) => 404,
                GroupError::Forbidden(_) => 403,
            },
            DispatchError::StoreError(_) => 500,
            DispatchError::StoreUnavailable => 503,
        }
    }
}

impl From<GroupError> for DispatchError {
    fn from(value: GroupError) -> Self {
        DispatchError::StoreError(StoreError::GroupError(value))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct DeliveryError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Problem from std::io library: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Malformed config: {0}")]
    MalformedConfig(#[from] serde_json::Error),
    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedHashAlgorithm(String),
}
