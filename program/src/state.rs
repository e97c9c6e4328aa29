// Raffle Program - State
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    borsh::try_from_slice_unchecked,
    clock::UnixTimestamp,
    program_error::ProgramError,
    program_pack::{IsInitialized, Sealed},
    pubkey::Pubkey,
};

/// Players a single round can hold
pub const MAX_PLAYERS: usize = 64;

/// Blocks the coordinator waits before answering
pub const REQUEST_CONFIRMATIONS: u16 = 3;

/// Words requested per draw
pub const NUM_WORDS: u32 = 1;

#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaffleState {
    /// Accepting entries
    Open,
    /// Waiting for the coordinator to deliver randomness
    Calculating,
}

impl From<RaffleState> for u8 {
    fn from(state: RaffleState) -> Self {
        match state {
            RaffleState::Open => 0,
            RaffleState::Calculating => 1,
        }
    }
}

/// Raffle account, a PDA of `["raffle", authority]`
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct Raffle {
    pub is_initialized: bool,
    pub bump: u8,
    /// Deployer that created the raffle
    pub authority: Pubkey,
    /// Program id of the VRF coordinator allowed to call back
    pub vrf_coordinator: Pubkey,
    /// Minimum lamports per entry
    pub entrance_fee: u64,
    /// Key hash passed to the coordinator
    pub gas_lane: [u8; 32],
    pub subscription_id: u64,
    pub callback_gas_limit: u32,
    /// Seconds between draws
    pub interval: u64,
    pub raffle_state: RaffleState,
    pub last_timestamp: UnixTimestamp,
    /// Default pubkey until a round has completed
    pub recent_winner: Pubkey,
    pub players: Vec<Pubkey>,
}

impl Sealed for Raffle {}

impl IsInitialized for Raffle {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Raffle {
    pub const LEN: usize = 1 + 1 + 32 + 32 + 8 + 32 + 8 + 4 + 8 + 1 + 8 + 32 + 4 + 32 * MAX_PLAYERS;

    pub fn load(data: &[u8]) -> Result<Self, ProgramError> {
        try_from_slice_unchecked(data).map_err(|_| ProgramError::InvalidAccountData)
    }

    pub fn save(&self, data: &mut [u8]) -> Result<(), ProgramError> {
        self.serialize(&mut &mut data[..])
            .map_err(|e| ProgramError::BorshIoError(e.to_string()))
    }

    pub fn player(&self, index: usize) -> Option<&Pubkey> {
        self.players.get(index)
    }

    pub fn number_of_players(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= MAX_PLAYERS
    }

    /// The keeper predicate: open, interval elapsed, someone entered and there
    /// is a prize to pay out.
    pub fn upkeep_needed(&self, now: UnixTimestamp, balance: u64) -> bool {
        let is_open = self.raffle_state == RaffleState::Open;
        let time_passed = now.saturating_sub(self.last_timestamp) as i128 >= self.interval as i128;
        let has_players = !self.players.is_empty();
        let has_balance = balance > 0;
        is_open && time_passed && has_players && has_balance
    }
}
