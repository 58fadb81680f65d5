//! Error types for the QuickThree round engine
//!
//! One root enum with a sub-enum per domain, so callers can match on the
//! failing layer while still propagating with `?`.

use std::fmt;

/// Root error type for all QuickThree operations
#[derive(Debug)]
pub enum QuickThreeError {
    /// Configuration related errors
    Configuration(ConfigurationError),

    /// Ledger and round-cache storage errors
    Storage(StorageError),

    /// Messaging collaborator failures (send, die roll, member count)
    Delivery(DeliveryError),

    /// Round, draw and settlement errors
    Game(GameError),

    /// Rejected administrative input
    Validation(ValidationError),
}

/// Configuration and validation errors
#[derive(Debug)]
pub enum ConfigurationError {
    ValidationFailed(String),
    MissingRequired(String),
    InvalidValue { field: String, value: String, reason: String },
    LoadFailed(String),
}

/// Storage system errors
#[derive(Debug)]
pub enum StorageError {
    DatabaseOpenFailed(String),
    ReadFailed(String),
    WriteFailed(String),
    CorruptedData(String),
}

/// Messaging collaborator errors.
///
/// `reason` carries the collaborator's error text verbatim; the group
/// lifecycle hook classifies it.
#[derive(Debug, Clone)]
pub enum DeliveryError {
    SendFailed { chat_id: i64, reason: String },
    DieRollFailed { chat_id: i64, reason: String },
    MemberCountFailed { chat_id: i64, reason: String },
}

/// Round, draw and settlement errors
#[derive(Debug)]
pub enum GameError {
    GroupNotFound(String),
    AccountNotFound(String),
    OddsNotConfigured(String),
    DrawNotFound { group_id: String, issue: String },
    InvalidDieValue(u8),
    SettlementJobFailed(String),
}

/// Administrative input errors
#[derive(Debug)]
pub enum ValidationError {
    AmountOutOfRange(String),
    DrawCycleOutOfRange(u32),
    OddsOutOfRange(String),
    SelfTransfer,
    InsufficientBalance { balance: String, required: String },
    AccountNotRegistered(String),
}

impl DeliveryError {
    /// Collaborator error text
    pub fn reason(&self) -> &str {
        match self {
            DeliveryError::SendFailed { reason, .. }
            | DeliveryError::DieRollFailed { reason, .. }
            | DeliveryError::MemberCountFailed { reason, .. } => reason,
        }
    }

    pub fn chat_id(&self) -> i64 {
        match self {
            DeliveryError::SendFailed { chat_id, .. }
            | DeliveryError::DieRollFailed { chat_id, .. }
            | DeliveryError::MemberCountFailed { chat_id, .. } => *chat_id,
        }
    }
}

// Display implementations
impl fmt::Display for QuickThreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuickThreeError::Configuration(e) => write!(f, "Configuration error: {}", e),
            QuickThreeError::Storage(e) => write!(f, "Storage error: {}", e),
            QuickThreeError::Delivery(e) => write!(f, "Delivery error: {}", e),
            QuickThreeError::Game(e) => write!(f, "Game error: {}", e),
            QuickThreeError::Validation(e) => write!(f, "Validation error: {}", e),
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::ValidationFailed(msg) => write!(f, "Validation failed: {}", msg),
            ConfigurationError::MissingRequired(field) => write!(f, "Missing required field: {}", field),
            ConfigurationError::InvalidValue { field, value, reason } => {
                write!(f, "Invalid value for {}: '{}' ({})", field, value, reason)
            }
            ConfigurationError::LoadFailed(msg) => write!(f, "Failed to load configuration: {}", msg),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::DatabaseOpenFailed(msg) => write!(f, "Database open failed: {}", msg),
            StorageError::ReadFailed(msg) => write!(f, "Read failed: {}", msg),
            StorageError::WriteFailed(msg) => write!(f, "Write failed: {}", msg),
            StorageError::CorruptedData(msg) => write!(f, "Corrupted data: {}", msg),
        }
    }
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::SendFailed { chat_id, reason } => {
                write!(f, "Send to chat {} failed: {}", chat_id, reason)
            }
            DeliveryError::DieRollFailed { chat_id, reason } => {
                write!(f, "Die roll in chat {} failed: {}", chat_id, reason)
            }
            DeliveryError::MemberCountFailed { chat_id, reason } => {
                write!(f, "Member count for chat {} failed: {}", chat_id, reason)
            }
        }
    }
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameError::GroupNotFound(id) => write!(f, "Group not found: {}", id),
            GameError::AccountNotFound(id) => write!(f, "Account not found: {}", id),
            GameError::OddsNotConfigured(id) => write!(f, "Odds not configured for group {}", id),
            GameError::DrawNotFound { group_id, issue } => {
                write!(f, "Draw {} not found for group {}", issue, group_id)
            }
            GameError::InvalidDieValue(value) => write!(f, "Invalid die value: {}", value),
            GameError::SettlementJobFailed(msg) => write!(f, "Settlement job failed: {}", msg),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::AmountOutOfRange(amount) => write!(f, "Amount out of range: {}", amount),
            ValidationError::DrawCycleOutOfRange(minutes) => {
                write!(f, "Draw cycle must be 1-60 minutes, got {}", minutes)
            }
            ValidationError::OddsOutOfRange(odds) => write!(f, "Odds out of range: {}", odds),
            ValidationError::SelfTransfer => write!(f, "Cannot transfer to the same account"),
            ValidationError::InsufficientBalance { balance, required } => {
                write!(f, "Insufficient balance: {} (required {})", balance, required)
            }
            ValidationError::AccountNotRegistered(id) => write!(f, "Account not registered: {}", id),
        }
    }
}

impl std::error::Error for QuickThreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QuickThreeError::Configuration(e) => Some(e),
            QuickThreeError::Storage(e) => Some(e),
            QuickThreeError::Delivery(e) => Some(e),
            QuickThreeError::Game(e) => Some(e),
            QuickThreeError::Validation(e) => Some(e),
        }
    }
}

impl std::error::Error for ConfigurationError {}
impl std::error::Error for StorageError {}
impl std::error::Error for DeliveryError {}
impl std::error::Error for GameError {}
impl std::error::Error for ValidationError {}

// From implementations for easy conversion
impl From<ConfigurationError> for QuickThreeError {
    fn from(e: ConfigurationError) -> Self {
        QuickThreeError::Configuration(e)
    }
}

impl From<StorageError> for QuickThreeError {
    fn from(e: StorageError) -> Self {
        QuickThreeError::Storage(e)
    }
}

impl From<DeliveryError> for QuickThreeError {
    fn from(e: DeliveryError) -> Self {
        QuickThreeError::Delivery(e)
    }
}

impl From<GameError> for QuickThreeError {
    fn from(e: GameError) -> Self {
        QuickThreeError::Game(e)
    }
}

impl From<ValidationError> for QuickThreeError {
    fn from(e: ValidationError) -> Self {
        QuickThreeError::Validation(e)
    }
}

// External error conversions
impl From<rocksdb::Error> for QuickThreeError {
    fn from(e: rocksdb::Error) -> Self {
        QuickThreeError::Storage(StorageError::WriteFailed(e.to_string()))
    }
}

impl From<std::io::Error> for QuickThreeError {
    fn from(e: std::io::Error) -> Self {
        QuickThreeError::Storage(StorageError::ReadFailed(e.to_string()))
    }
}

impl From<serde_json::Error> for QuickThreeError {
    fn from(e: serde_json::Error) -> Self {
        QuickThreeError::Storage(StorageError::CorruptedData(e.to_string()))
    }
}

impl From<toml::de::Error> for QuickThreeError {
    fn from(e: toml::de::Error) -> Self {
        QuickThreeError::Configuration(ConfigurationError::LoadFailed(e.to_string()))
    }
}

// Convenience type alias for Results
pub type QuickThreeResult<T> = Result<T, QuickThreeError>;
