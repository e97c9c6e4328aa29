// Raffle Program - Utility Functions
use solana_program::{account_info::AccountInfo, program_error::ProgramError, pubkey::Pubkey};

use crate::error::RaffleError;

pub const RAFFLE_SEED: &[u8] = b"raffle";

/// Find the program derived address of the raffle created by `authority`
pub fn find_raffle_address(program_id: &Pubkey, authority: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[RAFFLE_SEED, authority.as_ref()], program_id)
}

/// Lamports held above the rent-exempt reserve, i.e. the prize pool
pub fn prize_pool(lamports: u64, rent_exempt_minimum: u64) -> u64 {
    lamports.saturating_sub(rent_exempt_minimum)
}

/// Move lamports out of an account owned by this program
pub fn transfer_lamports(
    from: &AccountInfo,
    to: &AccountInfo,
    amount: u64,
) -> Result<(), ProgramError> {
    let from_balance = from
        .lamports()
        .checked_sub(amount)
        .ok_or(RaffleError::TransferFailed)?;
    let to_balance = to
        .lamports()
        .checked_add(amount)
        .ok_or(RaffleError::TransferFailed)?;
    **from.try_borrow_mut_lamports()? = from_balance;
    **to.try_borrow_mut_lamports()? = to_balance;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prize_pool_excludes_rent() {
        assert_eq!(prize_pool(1_500, 1_000), 500);
        assert_eq!(prize_pool(900, 1_000), 0);
    }

    #[test]
    fn raffle_address_depends_on_authority() {
        let program_id = Pubkey::new_unique();
        let (first, _) = find_raffle_address(&program_id, &Pubkey::new_unique());
        let (second, _) = find_raffle_address(&program_id, &Pubkey::new_unique());
        assert_ne!(first, second);
    }

    #[test]
    fn transfer_moves_exact_amount() {
        let owner = Pubkey::new_unique();
        let (from_key, to_key) = (Pubkey::new_unique(), Pubkey::new_unique());
        let (mut from_lamports, mut to_lamports) = (100u64, 5u64);
        let (mut from_data, mut to_data) = (vec![], vec![]);
        let from = AccountInfo::new(&from_key, false, true, &mut from_lamports, &mut from_data, &owner, false, 0);
        let to = AccountInfo::new(&to_key, false, true, &mut to_lamports, &mut to_data, &owner, false, 0);

        transfer_lamports(&from, &to, 40).unwrap();
        assert_eq!(from.lamports(), 60);
        assert_eq!(to.lamports(), 45);

        assert_eq!(
            transfer_lamports(&from, &to, 61),
            Err(RaffleError::TransferFailed.into())
        );
    }
}
