//! # Domain Errors
//!
//! One tagged error taxonomy for every public operation. Nothing in this
//! crate retries on its own; callers decide based on [`ErrorKind`].

use thiserror::Error;

/// Error tag without the message, for callers that branch on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transport failure, or no contract code at the configured address.
    Unavailable,
    /// A remote service explicitly declined the request.
    Rejected,
    /// The wallet is on another chain and could not be switched.
    WrongNetwork,
    /// No signing provider is present.
    NoWalletAvailable,
    /// The user declined a wallet prompt.
    UserRejected,
    /// Ledger return data did not have the expected ABI shape.
    ProtocolMismatch,
    /// An HTTP body did not decode to the expected shape.
    MalformedResponse,
    /// The registry refused to issue a proof.
    RegistryRejected,
    /// A signed write was attempted without a connected wallet.
    NotConnected,
    /// The operation is declared but has no implementation in this client.
    Unsupported,
}

/// Vote sync error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VoteSyncError {
    /// Network failure or contract absent at the configured address.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Non-success response; the body text is forwarded verbatim.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Wallet chain id does not match and switching/adding failed.
    #[error("Wrong network: {0}")]
    WrongNetwork(String),

    /// No wallet provider configured.
    #[error("No wallet available")]
    NoWalletAvailable,

    /// The user declined account access or a signature.
    #[error("User rejected: {0}")]
    UserRejected(String),

    /// Ledger data failed strict ABI decoding.
    #[error("Protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// HTTP response body failed to decode.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Registry declined to issue a proof.
    #[error("Registry rejected: {0}")]
    RegistryRejected(String),

    /// Signed write requested while no wallet session is connected.
    #[error("Wallet not connected")]
    NotConnected,

    /// Declared administrative operation without a client-side body.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl VoteSyncError {
    /// Failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VoteSyncError::Unavailable(_) => ErrorKind::Unavailable,
            VoteSyncError::Rejected(_) => ErrorKind::Rejected,
            VoteSyncError::WrongNetwork(_) => ErrorKind::WrongNetwork,
            VoteSyncError::NoWalletAvailable => ErrorKind::NoWalletAvailable,
            VoteSyncError::UserRejected(_) => ErrorKind::UserRejected,
            VoteSyncError::ProtocolMismatch(_) => ErrorKind::ProtocolMismatch,
            VoteSyncError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            VoteSyncError::RegistryRejected(_) => ErrorKind::RegistryRejected,
            VoteSyncError::NotConnected => ErrorKind::NotConnected,
            VoteSyncError::Unsupported(_) => ErrorKind::Unsupported,
        }
    }

    /// Human-readable message without the kind prefix, suitable for end users.
    pub fn message(&self) -> String {
        match self {
            VoteSyncError::Unavailable(m)
            | VoteSyncError::Rejected(m)
            | VoteSyncError::WrongNetwork(m)
            | VoteSyncError::UserRejected(m)
            | VoteSyncError::ProtocolMismatch(m)
            | VoteSyncError::MalformedResponse(m)
            | VoteSyncError::RegistryRejected(m) => m.clone(),
            VoteSyncError::NoWalletAvailable => "install a wallet provider".to_string(),
            VoteSyncError::NotConnected => "connect a wallet to sign transactions".to_string(),
            VoteSyncError::Unsupported(op) => format!("{op} is not implemented"),
        }
    }
}

/// Result alias used across the crate.
pub type SyncResult<T> = Result<T, VoteSyncError>;
