use std::error::Error;
use std::fmt;
use std::sync::PoisonError;

#[derive(Debug)]
pub enum AuthFusionError {
    // Authentication failures
    InvalidCredentials,
    InvalidToken(String),

    // Capability errors
    UnsupportedOperation(String),
    UnsupportedDriver(String),
    DriverUnavailable(String),

    // Adapter errors
    StorageError(String),
    SignerError(String),

    // Configuration errors
    ConfigError(String),

    // Poisoned driver cache or registry
    LockError(String),
}

impl AuthFusionError {
    /// True for failures callers should answer with an unauthenticated response
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::InvalidCredentials | Self::InvalidToken(_))
    }

    /// True for failures that point at a wiring or configuration mistake
    pub fn is_misconfiguration(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedDriver(_) | Self::DriverUnavailable(_) | Self::ConfigError(_)
        )
    }
}

impl fmt::Display for AuthFusionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCredentials => write!(f, "Invalid credentials"),
            Self::InvalidToken(msg) => write!(f, "Invalid token: {}", msg),
            Self::UnsupportedOperation(msg) => write!(f, "Unsupported operation: {}", msg),
            Self::UnsupportedDriver(name) => write!(f, "Driver [{}] is not supported", name),
            Self::DriverUnavailable(msg) => write!(f, "Driver unavailable: {}", msg),
            Self::StorageError(msg) => write!(f, "Storage error: {}", msg),
            Self::SignerError(msg) => write!(f, "Signer error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Self::LockError(msg) => write!(f, "Lock error: {}", msg),
        }
    }
}

impl Error for AuthFusionError {}

// Converting from PoisonError to facilitate poisoned lock handling
impl<T> From<PoisonError<T>> for AuthFusionError {
    fn from(err: PoisonError<T>) -> Self {
        AuthFusionError::LockError(format!("Lock poisoned: {}", err))
    }
}

// Generic result type for AuthFusion
pub type Result<T> = std::result::Result<T, AuthFusionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(AuthFusionError::InvalidCredentials.is_authentication_failure());
        assert!(AuthFusionError::InvalidToken("expired".into()).is_authentication_failure());
        assert!(!AuthFusionError::InvalidCredentials.is_misconfiguration());

        assert!(AuthFusionError::UnsupportedDriver("x".into()).is_misconfiguration());
        assert!(AuthFusionError::DriverUnavailable("no signer".into()).is_misconfiguration());
        assert!(!AuthFusionError::UnsupportedOperation("refresh".into()).is_misconfiguration());
    }

    #[test]
    fn test_display_names_driver() {
        let err = AuthFusionError::UnsupportedDriver("ldap".to_string());
        assert_eq!(err.to_string(), "Driver [ldap] is not supported");
    }
}
