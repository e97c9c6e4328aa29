//! Error types for the raffle harness.

use raffle::error::RaffleError;
use solana_program::{instruction::InstructionError, program_error::ProgramError, pubkey::Pubkey};
use solana_program_test::BanksClientError;
use solana_sdk::transaction::TransactionError;
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use vrf_coordinator_mock::error::CoordinatorError;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while deploying or driving the raffle.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A transaction was rejected by one of the programs.
    #[error("transaction reverted: {0}")]
    Reverted(Revert),

    #[error("banks client error: {0}")]
    Banks(#[from] BanksClientError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Building an instruction or decoding program data failed.
    #[error("program error: {0}")]
    Program(#[from] ProgramError),

    /// The simulated chain refused a harness operation (warp, keypair copy).
    #[error("chain error: {0}")]
    Chain(String),

    #[error("account not found: {0}")]
    AccountNotFound(Pubkey),

    #[error("decode error: {0}")]
    Decode(String),

    /// A receipt lacked the event an operation relies on.
    #[error("missing event: {0}")]
    MissingEvent(String),

    /// An event listener died before resolving.
    #[error("listener failed: {0}")]
    Listener(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    /// A check made inside the harness or a listener callback failed.
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// Source verification failed.
    #[error("verification failed: {0}")]
    Verification(String),
}

impl Error {
    /// The revert reason, when this error is a rejected transaction.
    pub fn revert(&self) -> Option<&Revert> {
        match self {
            Self::Reverted(revert) => Some(revert),
            _ => None,
        }
    }
}

/// Why a transaction was rejected. Custom codes are decoded only when the
/// program that raised them is the raffle or the coordinator; system program
/// codes overlap the raffle's and stay [`Revert::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revert {
    Raffle(RaffleError),
    Coordinator(CoordinatorError),
    Other(TransactionError),
}

impl Revert {
    /// `logs` are the transaction's log lines, used to find the failing program.
    pub fn from_transaction_error(err: TransactionError, logs: &[String]) -> Self {
        let code = match &err {
            TransactionError::InstructionError(_, InstructionError::Custom(code)) => *code,
            _ => return Self::Other(err),
        };
        match failing_program(logs) {
            Some(program) if program == vrf_coordinator_mock::id() => {
                CoordinatorError::try_from(code).map_or(Self::Other(err), Self::Coordinator)
            }
            Some(program) if program == raffle::id() => {
                RaffleError::try_from(code).map_or(Self::Other(err), Self::Raffle)
            }
            _ => Self::Other(err),
        }
    }

    /// The label a test asserts on, e.g. `Raffle__NotOpen`.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Revert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raffle(err) => write!(f, "{}", err),
            Self::Coordinator(err) => write!(f, "{}", err),
            Self::Other(err) => write!(f, "{}", err),
        }
    }
}

/// The innermost program that failed with a custom error. A failing CPI logs
/// its own failure before each caller up the stack does.
fn failing_program(logs: &[String]) -> Option<Pubkey> {
    logs.iter().find_map(|line| {
        let rest = line.strip_prefix("Program ")?;
        let (program, outcome) = rest.split_once(' ')?;
        if !outcome.starts_with("failed: custom program error") {
            return None;
        }
        Pubkey::from_str(program).ok()
    })
}

/// Fails with [`Error::Assertion`] unless `condition` holds.
pub fn ensure(condition: bool, message: impl Into<String>) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::Assertion(message.into()))
    }
}
