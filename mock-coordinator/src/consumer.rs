// Callback interface every randomness consumer implements.
//
// The coordinator invokes the consumer program with tag `FULFILL_RANDOM_WORDS_TAG`
// followed by a borsh-encoded `RandomWordsFulfillment`, signed by the
// coordinator config PDA.
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::AccountInfo,
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::state::find_coordinator_address;

/// Instruction tag consumers reserve for the coordinator callback
pub const FULFILL_RANDOM_WORDS_TAG: u8 = 0xFF;

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct RandomWordsFulfillment {
    pub request_id: u64,
    pub random_words: Vec<[u8; 32]>,
}

impl RandomWordsFulfillment {
    pub fn pack(&self) -> Result<Vec<u8>, ProgramError> {
        let mut buf = vec![FULFILL_RANDOM_WORDS_TAG];
        self.serialize(&mut buf)
            .map_err(|e| ProgramError::BorshIoError(e.to_string()))?;
        Ok(buf)
    }

    /// Decodes the callback body (everything after the tag byte)
    pub fn unpack(body: &[u8]) -> Result<Self, ProgramError> {
        Self::try_from_slice(body).map_err(|_| ProgramError::InvalidInstructionData)
    }
}

/// Create the consumer callback instruction
///
/// Accounts passed to the consumer:
/// 0. `[signer]` Coordinator config PDA
/// 1. `[writable]` The consumer account that made the request
/// 2. .. Extra accounts forwarded by whoever triggered the fulfillment
pub fn raw_fulfill_random_words(
    consumer_program: &Pubkey,
    coordinator: &Pubkey,
    consumer: &Pubkey,
    forwarded: Vec<AccountMeta>,
    fulfillment: &RandomWordsFulfillment,
) -> Result<Instruction, ProgramError> {
    let mut accounts = vec![
        AccountMeta::new_readonly(*coordinator, true),
        AccountMeta::new(*consumer, false),
    ];
    accounts.extend(forwarded);

    Ok(Instruction {
        program_id: *consumer_program,
        accounts,
        data: fulfillment.pack()?,
    })
}

/// True when `coordinator_info` is the signing config PDA of `coordinator_program`
pub fn is_coordinator_signer(coordinator_info: &AccountInfo, coordinator_program: &Pubkey) -> bool {
    let (expected, _) = find_coordinator_address(coordinator_program);
    coordinator_info.is_signer && *coordinator_info.key == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_data_starts_with_the_reserved_tag() {
        let fulfillment = RandomWordsFulfillment {
            request_id: 9,
            random_words: vec![[7u8; 32]],
        };
        let data = fulfillment.pack().unwrap();

        assert_eq!(data[0], FULFILL_RANDOM_WORDS_TAG);
        assert_eq!(RandomWordsFulfillment::unpack(&data[1..]).unwrap(), fulfillment);
    }

    #[test]
    fn callback_is_signed_by_the_coordinator_pda() {
        let program = Pubkey::new_unique();
        let (coordinator, _) = find_coordinator_address(&program);
        let consumer = Pubkey::new_unique();
        let extra = Pubkey::new_unique();
        let fulfillment = RandomWordsFulfillment {
            request_id: 1,
            random_words: vec![[0u8; 32]],
        };

        let ix = raw_fulfill_random_words(
            &Pubkey::new_unique(),
            &coordinator,
            &consumer,
            vec![AccountMeta::new(extra, false)],
            &fulfillment,
        )
        .unwrap();

        assert_eq!(ix.accounts[0], AccountMeta::new_readonly(coordinator, true));
        assert_eq!(ix.accounts[1], AccountMeta::new(consumer, false));
        assert_eq!(ix.accounts[2].pubkey, extra);
    }
}
