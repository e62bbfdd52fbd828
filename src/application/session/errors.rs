use thiserror::Error;

/// WebSocket close code a [`SessionError`] maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Normal,
    AccessRevoked,
    Forbidden,
    PageNotFound,
    RateLimited,
}

impl CloseReason {
    pub fn code(self) -> u16 {
        match self {
            CloseReason::Normal => 1000,
            CloseReason::AccessRevoked => 4001,
            CloseReason::Forbidden => 4003,
            CloseReason::PageNotFound => 4004,
            CloseReason::RateLimited => 4029,
        }
    }
}

/// Named failures a Session's handshake/serving steps can produce. Kept
/// small and matched on by the presentation layer to pick a close code;
/// anything else bubbles up as `anyhow::Error` and is logged as a
/// transport/storage failure.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("rate limited")]
    RateLimited,
    #[error("page not found or deleted")]
    PageNotFound,
    #[error("access forbidden")]
    Forbidden,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl SessionError {
    pub fn close_reason(&self) -> CloseReason {
        match self {
            SessionError::RateLimited => CloseReason::RateLimited,
            SessionError::PageNotFound => CloseReason::PageNotFound,
            SessionError::Forbidden => CloseReason::Forbidden,
            SessionError::Storage(_) => CloseReason::Normal,
        }
    }
}
