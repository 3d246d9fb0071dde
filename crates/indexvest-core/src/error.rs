use thiserror::Error;

/// Coarse classification of a `VestingError`. Callers that only need to
/// know which rule rejected an operation match on this instead of the
/// individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InsufficientVested,
    DuplicateGrant,
    MigrationProtocolViolation,
    NoPendingMigration,
    AllocationCeilingExceeded,
    Unauthorized,
    /// An asset, staking or treasury collaborator refused the call.
    Collaborator,
    /// Arithmetic, configuration or storage failure.
    Internal,
}

#[derive(Debug, Error)]
pub enum VestingError {
    // ── Vesting ──────────────────────────────────────────────────────────────
    #[error("claim of {requested} exceeds redeemable {redeemable}")]
    InsufficientVested { requested: u128, redeemable: u128 },

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("vesting length must be greater than zero")]
    InvalidVestingLength,

    #[error("no term for account {0}")]
    TermNotFound(String),

    // ── Grants ───────────────────────────────────────────────────────────────
    #[error("account already holds a term: {0}")]
    DuplicateGrant(String),

    #[error("allocation ceiling exceeded: ceiling {ceiling}, attempted {attempted}")]
    AllocationCeilingExceeded { ceiling: u32, attempted: u64 },

    // ── Migration ────────────────────────────────────────────────────────────
    #[error("no term to migrate for account {0}")]
    NoTermToMigrate(String),

    #[error("no pending wallet change for account {0}")]
    NoPendingMigration(String),

    #[error("wallet change proposed for {expected}, pulled by {got}")]
    WalletChangeMismatch { expected: String, got: String },

    #[error("destination already holds a term: {0}")]
    DestinationHasTerm(String),

    // ── Authority ────────────────────────────────────────────────────────────
    #[error("caller is not the ledger authority: {0}")]
    Unauthorized(String),

    // ── Collaborators ────────────────────────────────────────────────────────
    #[error("insufficient balance: need {need}, have {have}")]
    InsufficientBalance { need: u128, have: u128 },

    #[error("insufficient allowance: need {need}, have {have}")]
    InsufficientAllowance { need: u128, have: u128 },

    #[error("index may not decrease: current {current}, proposed {proposed}")]
    IndexDecrease { current: u128, proposed: u128 },

    // ── Arithmetic / config ──────────────────────────────────────────────────
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    #[error("index is zero")]
    ZeroIndex,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid account id: {0}")]
    InvalidAccount(String),

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("ledger kind mismatch: database holds {found}, engine expects {expected}")]
    LedgerKindMismatch { expected: String, found: String },
}

impl VestingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientVested { .. } => ErrorKind::InsufficientVested,
            Self::DuplicateGrant(_) => ErrorKind::DuplicateGrant,
            Self::AllocationCeilingExceeded { .. } => ErrorKind::AllocationCeilingExceeded,
            Self::NoTermToMigrate(_) | Self::NoPendingMigration(_) => {
                ErrorKind::NoPendingMigration
            }
            Self::WalletChangeMismatch { .. } | Self::DestinationHasTerm(_) => {
                ErrorKind::MigrationProtocolViolation
            }
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::InsufficientBalance { .. }
            | Self::InsufficientAllowance { .. }
            | Self::IndexDecrease { .. } => ErrorKind::Collaborator,
            Self::ZeroAmount
            | Self::InvalidVestingLength
            | Self::TermNotFound(_)
            | Self::ArithmeticOverflow
            | Self::ZeroIndex
            | Self::InvalidConfig(_)
            | Self::InvalidAccount(_)
            | Self::Serialization(_)
            | Self::Storage(_)
            | Self::LedgerKindMismatch { .. } => ErrorKind::Internal,
        }
    }
}
