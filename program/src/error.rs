// Raffle Program - Errors
use solana_program::{
    decode_error::DecodeError, msg, program_error::PrintProgramError,
    program_error::ProgramError,
};
use std::convert::TryFrom;
use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    #[error("Invalid instruction")]
    InvalidInstruction,

    #[error("Raffle already initialized")]
    AlreadyInitialized,

    /// Raffle account is not the PDA of its authority, or is not owned by the program
    #[error("Invalid raffle account")]
    InvalidRaffleAccount,

    /// Payment below the entrance fee
    #[error("Raffle__NotEnoughETHEntered")]
    InsufficientPayment,

    /// Entry while a winner is being calculated
    #[error("Raffle__NotOpen")]
    NotOpen,

    #[error("Raffle is full")]
    RaffleFull,

    #[error("Raffle__UpkeepNotNeeded")]
    UpkeepNotNeeded,

    /// Coordinator program differs from the one fixed at construction
    #[error("Invalid VRF coordinator")]
    InvalidCoordinator,

    #[error("Only the VRF coordinator can fulfill")]
    OnlyCoordinatorCanFulfill,

    #[error("No random words supplied")]
    MissingRandomWords,

    /// Winner's account was not forwarded with the callback
    #[error("Winner account missing")]
    WinnerAccountMissing,

    #[error("No players")]
    NoPlayers,

    #[error("Raffle__TransferFailed")]
    TransferFailed,
}

impl RaffleError {
    const ALL: [RaffleError; 13] = [
        RaffleError::InvalidInstruction,
        RaffleError::AlreadyInitialized,
        RaffleError::InvalidRaffleAccount,
        RaffleError::InsufficientPayment,
        RaffleError::NotOpen,
        RaffleError::RaffleFull,
        RaffleError::UpkeepNotNeeded,
        RaffleError::InvalidCoordinator,
        RaffleError::OnlyCoordinatorCanFulfill,
        RaffleError::MissingRandomWords,
        RaffleError::WinnerAccountMissing,
        RaffleError::NoPlayers,
        RaffleError::TransferFailed,
    ];
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl TryFrom<u32> for RaffleError {
    type Error = u32;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|e| *e as u32 == code)
            .ok_or(code)
    }
}

impl<T> DecodeError<T> for RaffleError {
    fn type_of() -> &'static str {
        "Raffle Error"
    }
}

impl PrintProgramError for RaffleError {
    fn print<E>(&self) {
        msg!(&self.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_codes_decode_back() {
        for error in RaffleError::ALL {
            let code = match ProgramError::from(error) {
                ProgramError::Custom(code) => code,
                other => panic!("unexpected program error {other:?}"),
            };
            assert_eq!(RaffleError::try_from(code), Ok(error));
        }
        assert_eq!(RaffleError::try_from(100), Err(100));
    }
}
