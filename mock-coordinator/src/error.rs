use solana_program::{
    decode_error::DecodeError, msg, program_error::PrintProgramError,
    program_error::ProgramError,
};
use std::convert::TryFrom;
use thiserror::Error;

/// Errors that may be returned by the coordinator mock.
///
/// Codes start at 100 so they never collide with a consumer's own codes when
/// they bubble up through a cross-program invocation.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// Instruction data could not be decoded
    #[error("invalid instruction")]
    InvalidInstruction = 100,

    #[error("coordinator already initialized")]
    AlreadyInitialized,

    #[error("coordinator not initialized")]
    NotInitialized,

    /// Subscription id was never issued
    #[error("invalid subscription")]
    InvalidSubscription,

    #[error("must be subscription owner")]
    MustBeSubOwner,

    #[error("too many consumers")]
    TooManyConsumers,

    /// Consumer is not registered on the subscription, or does not match the request
    #[error("invalid consumer")]
    InvalidConsumer,

    /// Subscription cannot pay for the fulfillment
    #[error("insufficient balance")]
    InsufficientBalance,

    /// Request id was never issued or has already been fulfilled
    #[error("nonexistent request")]
    UnknownRequest,

    #[error("number of words out of range")]
    NumWordsOutOfRange,

    /// A PDA passed in does not match the address derived from its seeds
    #[error("invalid account address")]
    InvalidAccountAddress,

    #[error("arithmetic overflow")]
    Overflow,
}

impl CoordinatorError {
    const ALL: [CoordinatorError; 12] = [
        CoordinatorError::InvalidInstruction,
        CoordinatorError::AlreadyInitialized,
        CoordinatorError::NotInitialized,
        CoordinatorError::InvalidSubscription,
        CoordinatorError::MustBeSubOwner,
        CoordinatorError::TooManyConsumers,
        CoordinatorError::InvalidConsumer,
        CoordinatorError::InsufficientBalance,
        CoordinatorError::UnknownRequest,
        CoordinatorError::NumWordsOutOfRange,
        CoordinatorError::InvalidAccountAddress,
        CoordinatorError::Overflow,
    ];
}

impl From<CoordinatorError> for ProgramError {
    fn from(e: CoordinatorError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl TryFrom<u32> for CoordinatorError {
    type Error = u32;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|e| *e as u32 == code)
            .ok_or(code)
    }
}

impl<T> DecodeError<T> for CoordinatorError {
    fn type_of() -> &'static str {
        "Coordinator Error"
    }
}

impl PrintProgramError for CoordinatorError {
    fn print<E>(&self) {
        msg!(&self.to_string());
    }
}
