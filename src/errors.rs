use thiserror::Error;

/// Error type that captures persistence and configuration failures.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Invalid reference: {0}")]
    InvalidRef(String),
}

/// Business-rule failures raised by account operations.
///
/// A failing operation never mutates the account it was called on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("amount must be greater than zero")]
    InvalidAmount,
    #[error("invalid target account: {0}")]
    InvalidTarget(String),
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("withdrawal would exceed the overdraft limit")]
    OverdraftLimitExceeded,
    #[error("monthly withdrawal limit ({0}) reached")]
    WithdrawalLimitReached(u32),
    #[error("account has a negative balance")]
    NegativeBalance,
    #[error("a destination account is required to move the remaining balance")]
    ClosureTargetRequired,
    #[error("operation not supported for {0} accounts")]
    WrongAccountType(&'static str),
    #[error("invalid policy value: {0}")]
    InvalidPolicy(String),
    #[error("balance would exceed the representable range")]
    BalanceOverflow,
}

impl AccountError {
    /// Input rejected before any policy was consulted.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AccountError::InvalidAmount
                | AccountError::InvalidTarget(_)
                | AccountError::ClosureTargetRequired
                | AccountError::WrongAccountType(_)
                | AccountError::InvalidPolicy(_)
        )
    }

    /// Input was well formed but an account rule refused it.
    pub fn is_policy(&self) -> bool {
        !self.is_validation()
    }
}

/// Failures raised by registry-level operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("user capacity ({0}) reached")]
    CapacityReached(usize),
    #[error("username `{0}` already exists")]
    DuplicateUsername(String),
    #[error("user id `{0}` already exists")]
    DuplicateUserId(String),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("account limit ({0}) reached for this user")]
    AccountLimitReached(usize),
    #[error("account number `{0}` already exists")]
    DuplicateAccountNumber(String),
    #[error(transparent)]
    Account(#[from] AccountError),
}
