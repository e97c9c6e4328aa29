use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use solana_program::{
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::Pubkey,
};

use crate::error::CoordinatorError;

pub const COORDINATOR_SEED: &[u8] = b"coordinator";
pub const SUBSCRIPTION_SEED: &[u8] = b"subscription";
pub const REQUEST_SEED: &[u8] = b"request";

/// Consumers a single subscription can authorize
pub const MAX_CONSUMERS: usize = 4;

/// Upper bound on words per request
pub const MAX_NUM_WORDS: u32 = 500;

/// Coordinator-wide fee settings and id counters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinator {
    pub is_initialized: bool,
    /// Flat premium charged per fulfillment
    pub base_fee: u64,
    /// Link charged per unit of callback gas
    pub gas_price_link: u64,
    /// Last subscription id handed out (0 before the first one)
    pub current_subscription_id: u64,
    /// Id the next randomness request will receive
    pub next_request_id: u64,
}

impl Coordinator {
    pub fn new(base_fee: u64, gas_price_link: u64) -> Self {
        Self {
            is_initialized: true,
            base_fee,
            gas_price_link,
            current_subscription_id: 0,
            next_request_id: 1,
        }
    }

    /// What a fulfillment costs the subscription. The callback gas limit is
    /// charged in full since the callback's actual usage is not observable.
    pub fn fulfillment_payment(&self, callback_gas_limit: u32) -> Option<u64> {
        self.gas_price_link
            .checked_mul(u64::from(callback_gas_limit))?
            .checked_add(self.base_fee)
    }
}

/// Prepaid account that funds randomness requests for its consumers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Subscription {
    pub is_initialized: bool,
    pub id: u64,
    pub owner: Pubkey,
    pub balance: u64,
    pub request_count: u64,
    pub consumer_count: u8,
    pub consumers: [Pubkey; MAX_CONSUMERS],
}

impl Subscription {
    pub fn new(id: u64, owner: Pubkey) -> Self {
        Self {
            is_initialized: true,
            id,
            owner,
            balance: 0,
            request_count: 0,
            consumer_count: 0,
            consumers: [Pubkey::default(); MAX_CONSUMERS],
        }
    }

    pub fn consumers(&self) -> &[Pubkey] {
        &self.consumers[..usize::from(self.consumer_count)]
    }

    pub fn is_consumer(&self, consumer: &Pubkey) -> bool {
        self.consumers().contains(consumer)
    }

    /// Registers `consumer`. Returns false when it was already registered.
    pub fn add_consumer(&mut self, consumer: Pubkey) -> Result<bool, CoordinatorError> {
        if self.is_consumer(&consumer) {
            return Ok(false);
        }
        let slot = usize::from(self.consumer_count);
        if slot >= MAX_CONSUMERS {
            return Err(CoordinatorError::TooManyConsumers);
        }
        self.consumers[slot] = consumer;
        self.consumer_count += 1;
        Ok(true)
    }

    /// Removes `consumer`, moving the last registered consumer into its slot.
    pub fn remove_consumer(&mut self, consumer: &Pubkey) -> Result<(), CoordinatorError> {
        let index = self
            .consumers()
            .iter()
            .position(|c| c == consumer)
            .ok_or(CoordinatorError::InvalidConsumer)?;
        let last = usize::from(self.consumer_count) - 1;
        self.consumers.swap(index, last);
        self.consumers[last] = Pubkey::default();
        self.consumer_count -= 1;
        Ok(())
    }
}

/// Pending randomness request, closed once fulfilled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomnessRequest {
    pub is_initialized: bool,
    pub request_id: u64,
    pub subscription_id: u64,
    /// Account that requested, and receives, the words
    pub consumer: Pubkey,
    pub callback_gas_limit: u32,
    pub num_words: u32,
    pub request_confirmations: u16,
    pub key_hash: [u8; 32],
}

impl Sealed for Coordinator {}
impl Sealed for Subscription {}
impl Sealed for RandomnessRequest {}

impl IsInitialized for Coordinator {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl IsInitialized for Subscription {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl IsInitialized for RandomnessRequest {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Pack for Coordinator {
    const LEN: usize = 1 + 8 + 8 + 8 + 8;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, Coordinator::LEN];
        let (is_initialized, base_fee, gas_price_link, current_subscription_id, next_request_id) =
            array_refs![src, 1, 8, 8, 8, 8];

        Ok(Coordinator {
            is_initialized: is_initialized[0] != 0,
            base_fee: u64::from_le_bytes(*base_fee),
            gas_price_link: u64::from_le_bytes(*gas_price_link),
            current_subscription_id: u64::from_le_bytes(*current_subscription_id),
            next_request_id: u64::from_le_bytes(*next_request_id),
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, Coordinator::LEN];
        let (
            is_initialized_dst,
            base_fee_dst,
            gas_price_link_dst,
            current_subscription_id_dst,
            next_request_id_dst,
        ) = mut_array_refs![dst, 1, 8, 8, 8, 8];

        is_initialized_dst[0] = self.is_initialized as u8;
        *base_fee_dst = self.base_fee.to_le_bytes();
        *gas_price_link_dst = self.gas_price_link.to_le_bytes();
        *current_subscription_id_dst = self.current_subscription_id.to_le_bytes();
        *next_request_id_dst = self.next_request_id.to_le_bytes();
    }
}

impl Pack for Subscription {
    const LEN: usize = 1 + 8 + 32 + 8 + 8 + 1 + 32 * MAX_CONSUMERS;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, Subscription::LEN];
        let (is_initialized, id, owner, balance, request_count, consumer_count, consumers_src) =
            array_refs![src, 1, 8, 32, 8, 8, 1, 32 * MAX_CONSUMERS];

        if usize::from(consumer_count[0]) > MAX_CONSUMERS {
            return Err(ProgramError::InvalidAccountData);
        }

        let mut consumers = [Pubkey::default(); MAX_CONSUMERS];
        for (consumer, chunk) in consumers.iter_mut().zip(consumers_src.chunks_exact(32)) {
            let mut bytes = [0u8; 32];
            bytes.copy_from_slice(chunk);
            *consumer = Pubkey::new_from_array(bytes);
        }

        Ok(Subscription {
            is_initialized: is_initialized[0] != 0,
            id: u64::from_le_bytes(*id),
            owner: Pubkey::new_from_array(*owner),
            balance: u64::from_le_bytes(*balance),
            request_count: u64::from_le_bytes(*request_count),
            consumer_count: consumer_count[0],
            consumers,
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, Subscription::LEN];
        let (
            is_initialized_dst,
            id_dst,
            owner_dst,
            balance_dst,
            request_count_dst,
            consumer_count_dst,
            consumers_dst,
        ) = mut_array_refs![dst, 1, 8, 32, 8, 8, 1, 32 * MAX_CONSUMERS];

        is_initialized_dst[0] = self.is_initialized as u8;
        *id_dst = self.id.to_le_bytes();
        owner_dst.copy_from_slice(self.owner.as_ref());
        *balance_dst = self.balance.to_le_bytes();
        *request_count_dst = self.request_count.to_le_bytes();
        consumer_count_dst[0] = self.consumer_count;
        for (chunk, consumer) in consumers_dst.chunks_exact_mut(32).zip(self.consumers.iter()) {
            chunk.copy_from_slice(consumer.as_ref());
        }
    }
}

impl Pack for RandomnessRequest {
    const LEN: usize = 1 + 8 + 8 + 32 + 4 + 4 + 2 + 32;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, RandomnessRequest::LEN];
        let (
            is_initialized,
            request_id,
            subscription_id,
            consumer,
            callback_gas_limit,
            num_words,
            request_confirmations,
            key_hash,
        ) = array_refs![src, 1, 8, 8, 32, 4, 4, 2, 32];

        Ok(RandomnessRequest {
            is_initialized: is_initialized[0] != 0,
            request_id: u64::from_le_bytes(*request_id),
            subscription_id: u64::from_le_bytes(*subscription_id),
            consumer: Pubkey::new_from_array(*consumer),
            callback_gas_limit: u32::from_le_bytes(*callback_gas_limit),
            num_words: u32::from_le_bytes(*num_words),
            request_confirmations: u16::from_le_bytes(*request_confirmations),
            key_hash: *key_hash,
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, RandomnessRequest::LEN];
        let (
            is_initialized_dst,
            request_id_dst,
            subscription_id_dst,
            consumer_dst,
            callback_gas_limit_dst,
            num_words_dst,
            request_confirmations_dst,
            key_hash_dst,
        ) = mut_array_refs![dst, 1, 8, 8, 32, 4, 4, 2, 32];

        is_initialized_dst[0] = self.is_initialized as u8;
        *request_id_dst = self.request_id.to_le_bytes();
        *subscription_id_dst = self.subscription_id.to_le_bytes();
        consumer_dst.copy_from_slice(self.consumer.as_ref());
        *callback_gas_limit_dst = self.callback_gas_limit.to_le_bytes();
        *num_words_dst = self.num_words.to_le_bytes();
        *request_confirmations_dst = self.request_confirmations.to_le_bytes();
        key_hash_dst.copy_from_slice(&self.key_hash);
    }
}

/// Address of the coordinator config account
pub fn find_coordinator_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[COORDINATOR_SEED], program_id)
}

/// Address of a subscription account
pub fn find_subscription_address(program_id: &Pubkey, subscription_id: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[SUBSCRIPTION_SEED, &subscription_id.to_le_bytes()],
        program_id,
    )
}

/// Address of a randomness request account
pub fn find_request_address(program_id: &Pubkey, request_id: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[REQUEST_SEED, &request_id.to_le_bytes()], program_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_survives_pack_with_consumers() {
        let mut subscription = Subscription::new(7, Pubkey::new_unique());
        subscription.balance = 2_000_000_000_000_000_000;
        let first = Pubkey::new_unique();
        let second = Pubkey::new_unique();
        subscription.add_consumer(first).unwrap();
        subscription.add_consumer(second).unwrap();

        let mut data = vec![0u8; Subscription::LEN];
        Subscription::pack(subscription, &mut data).unwrap();
        let unpacked = Subscription::unpack(&data).unwrap();

        assert_eq!(unpacked, subscription);
        assert_eq!(unpacked.consumers(), &[first, second]);
    }

    #[test]
    fn adding_a_consumer_twice_is_a_no_op() {
        let mut subscription = Subscription::new(1, Pubkey::new_unique());
        let consumer = Pubkey::new_unique();

        assert_eq!(subscription.add_consumer(consumer), Ok(true));
        assert_eq!(subscription.add_consumer(consumer), Ok(false));
        assert_eq!(subscription.consumers().len(), 1);
    }

    #[test]
    fn consumer_capacity_is_enforced() {
        let mut subscription = Subscription::new(1, Pubkey::new_unique());
        for _ in 0..MAX_CONSUMERS {
            subscription.add_consumer(Pubkey::new_unique()).unwrap();
        }
        assert_eq!(
            subscription.add_consumer(Pubkey::new_unique()),
            Err(CoordinatorError::TooManyConsumers)
        );
    }

    #[test]
    fn removing_a_consumer_compacts_the_list() {
        let mut subscription = Subscription::new(1, Pubkey::new_unique());
        let consumers: Vec<Pubkey> = (0..3).map(|_| Pubkey::new_unique()).collect();
        for consumer in &consumers {
            subscription.add_consumer(*consumer).unwrap();
        }

        subscription.remove_consumer(&consumers[0]).unwrap();

        assert_eq!(subscription.consumers(), &[consumers[2], consumers[1]]);
        assert_eq!(
            subscription.remove_consumer(&consumers[0]),
            Err(CoordinatorError::InvalidConsumer)
        );
    }

    #[test]
    fn corrupt_consumer_count_is_rejected() {
        let mut data = vec![0u8; Subscription::LEN];
        data[0] = 1;
        data[1 + 8 + 32 + 8 + 8] = (MAX_CONSUMERS + 1) as u8;
        assert_eq!(
            Subscription::unpack(&data),
            Err(ProgramError::InvalidAccountData)
        );
    }

    #[test]
    fn payment_covers_base_fee_and_callback_gas() {
        let coordinator = Coordinator::new(250_000_000_000_000_000, 1_000_000_000);
        assert_eq!(
            coordinator.fulfillment_payment(500_000),
            Some(250_000_000_000_000_000 + 500_000 * 1_000_000_000)
        );

        let greedy = Coordinator::new(u64::MAX, 1);
        assert_eq!(greedy.fulfillment_payment(1), None);
    }

    #[test]
    fn request_ids_start_at_one() {
        let coordinator = Coordinator::new(0, 0);
        assert_eq!(coordinator.next_request_id, 1);
        assert_eq!(coordinator.current_subscription_id, 0);
    }
}
