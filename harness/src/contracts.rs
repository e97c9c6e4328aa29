//! Typed handles over the two programs: reads decode account state, writes
//! build the instruction, send it and hand back the receipt.

use raffle::{
    event::RaffleEvent,
    instruction::{self as raffle_instruction, RaffleArgs},
    state::{Raffle, RaffleState},
    utils::{find_raffle_address, prize_pool},
    vrf::get_random_winner_index,
};
use solana_program::{instruction::AccountMeta, program_pack::Pack, pubkey::Pubkey};
use solana_sdk::signature::{Keypair, Signer};
use tracing::{debug, info};
use vrf_coordinator_mock::{
    event::CoordinatorEvent,
    instruction as coordinator_instruction,
    processor::random_words,
    state::{
        find_coordinator_address, find_request_address, find_subscription_address, Coordinator,
        RandomnessRequest, Subscription,
    },
};

use crate::chain::{LocalChain, TxReceipt};
use crate::error::{Error, Result};
use crate::events::{ChainEvent, EventKind};

/// A deployed raffle, addressed by its program and the authority that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaffleContract {
    pub program_id: Pubkey,
    pub authority: Pubkey,
    pub address: Pubkey,
}

impl RaffleContract {
    pub fn new(program_id: Pubkey, authority: Pubkey) -> Self {
        let (address, _) = find_raffle_address(&program_id, &authority);
        Self {
            program_id,
            authority,
            address,
        }
    }

    /// Create the raffle account with its constructor arguments.
    pub async fn initialize(chain: &mut LocalChain, authority: &Keypair, args: RaffleArgs) -> Result<(Self, TxReceipt)> {
        let contract = Self::new(raffle::id(), authority.pubkey());
        let ix = raffle_instruction::initialize_raffle(
            &contract.program_id,
            &authority.pubkey(),
            &contract.address,
            args,
        )?;
        let receipt = chain.send(&[ix], &[authority]).await?;
        Ok((contract, receipt))
    }

    pub async fn state(&self, chain: &mut LocalChain) -> Result<Raffle> {
        let account = chain.account(&self.address).await?;
        Ok(Raffle::load(&account.data)?)
    }

    pub async fn entrance_fee(&self, chain: &mut LocalChain) -> Result<u64> {
        Ok(self.state(chain).await?.entrance_fee)
    }

    pub async fn interval(&self, chain: &mut LocalChain) -> Result<u64> {
        Ok(self.state(chain).await?.interval)
    }

    pub async fn raffle_state(&self, chain: &mut LocalChain) -> Result<RaffleState> {
        Ok(self.state(chain).await?.raffle_state)
    }

    pub async fn player(&self, chain: &mut LocalChain, index: usize) -> Result<Pubkey> {
        let state = self.state(chain).await?;
        state
            .player(index)
            .copied()
            .ok_or_else(|| Error::Decode(format!("no player at index {}", index)))
    }

    pub async fn subscription_id(&self, chain: &mut LocalChain) -> Result<u64> {
        Ok(self.state(chain).await?.subscription_id)
    }

    pub async fn latest_timestamp(&self, chain: &mut LocalChain) -> Result<i64> {
        Ok(self.state(chain).await?.last_timestamp)
    }

    pub async fn recent_winner(&self, chain: &mut LocalChain) -> Result<Pubkey> {
        Ok(self.state(chain).await?.recent_winner)
    }

    pub async fn number_of_players(&self, chain: &mut LocalChain) -> Result<usize> {
        Ok(self.state(chain).await?.number_of_players())
    }

    /// Lamports held above the rent reserve.
    pub async fn prize_pool(&self, chain: &mut LocalChain) -> Result<u64> {
        let account = chain.account(&self.address).await?;
        let rent = chain.rent().await?;
        Ok(prize_pool(account.lamports, rent.minimum_balance(account.data.len())))
    }

    pub async fn enter(&self, chain: &mut LocalChain, player: &Keypair, amount: u64) -> Result<TxReceipt> {
        let ix = raffle_instruction::enter_raffle(&self.program_id, &player.pubkey(), &self.address, amount)?;
        chain.send(&[ix], &[player]).await
    }

    /// Evaluate the upkeep predicate in a simulation; nothing is committed.
    pub async fn check_upkeep(&self, chain: &mut LocalChain, caller: &Keypair) -> Result<bool> {
        let ix = raffle_instruction::check_upkeep(&self.program_id, &self.address)?;
        let simulation = chain.simulate(&[ix], &[caller]).await?;
        simulation
            .events
            .iter()
            .find_map(|event| match event {
                ChainEvent::Raffle(RaffleEvent::UpkeepChecked { upkeep_needed }) => Some(*upkeep_needed),
                _ => None,
            })
            .ok_or_else(|| Error::MissingEvent(EventKind::UpkeepChecked.to_string()))
    }

    /// Act as the keeper. The request account is derived from the
    /// coordinator's next request id.
    pub async fn perform_upkeep(
        &self,
        chain: &mut LocalChain,
        keeper: &Keypair,
        coordinator: &CoordinatorContract,
    ) -> Result<TxReceipt> {
        let subscription_id = self.subscription_id(chain).await?;
        let next_request_id = coordinator.config(chain).await?.next_request_id;

        let ix = raffle_instruction::perform_upkeep(
            &self.program_id,
            &keeper.pubkey(),
            &self.address,
            &coordinator.program_id,
            &coordinator.subscription_address(subscription_id),
            &coordinator.request_address(next_request_id),
        )?;
        chain.send(&[ix], &[keeper]).await
    }
}

/// Request id from a perform-upkeep receipt.
pub fn requested_raffle_winner(receipt: &TxReceipt) -> Result<u64> {
    match receipt.require_event(EventKind::RequestedRaffleWinner)? {
        ChainEvent::Raffle(RaffleEvent::RequestedRaffleWinner { request_id }) => Ok(*request_id),
        other => Err(Error::Decode(format!("unexpected event {:?}", other))),
    }
}

/// The VRF coordinator program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorContract {
    pub program_id: Pubkey,
}

impl CoordinatorContract {
    pub fn new(program_id: Pubkey) -> Self {
        Self { program_id }
    }

    pub fn mock() -> Self {
        Self::new(vrf_coordinator_mock::id())
    }

    pub fn config_address(&self) -> Pubkey {
        find_coordinator_address(&self.program_id).0
    }

    pub fn subscription_address(&self, subscription_id: u64) -> Pubkey {
        find_subscription_address(&self.program_id, subscription_id).0
    }

    pub fn request_address(&self, request_id: u64) -> Pubkey {
        find_request_address(&self.program_id, request_id).0
    }

    pub async fn config(&self, chain: &mut LocalChain) -> Result<Coordinator> {
        let account = chain.account(&self.config_address()).await?;
        Ok(Coordinator::unpack(&account.data)?)
    }

    pub async fn subscription(&self, chain: &mut LocalChain, subscription_id: u64) -> Result<Subscription> {
        let account = chain.account(&self.subscription_address(subscription_id)).await?;
        Ok(Subscription::unpack(&account.data)?)
    }

    /// The pending request, or `None` once fulfilled or never issued.
    pub async fn request(&self, chain: &mut LocalChain, request_id: u64) -> Result<Option<RandomnessRequest>> {
        let account = match chain.try_account(&self.request_address(request_id)).await? {
            Some(account) if account.owner == self.program_id => account,
            _ => return Ok(None),
        };
        Ok(RandomnessRequest::unpack(&account.data).ok())
    }

    /// Deploy step of the mock: fee settings and id counters.
    pub async fn initialize(
        &self,
        chain: &mut LocalChain,
        payer: &Keypair,
        base_fee: u64,
        gas_price_link: u64,
    ) -> Result<TxReceipt> {
        let ix = coordinator_instruction::initialize(&self.program_id, &payer.pubkey(), base_fee, gas_price_link);
        chain.send(&[ix], &[payer]).await
    }

    /// Returns the id announced by the `SubscriptionCreated` event.
    pub async fn create_subscription(&self, chain: &mut LocalChain, owner: &Keypair) -> Result<u64> {
        let next_id = self.config(chain).await?.current_subscription_id + 1;
        let ix = coordinator_instruction::create_subscription(
            &self.program_id,
            &owner.pubkey(),
            &self.subscription_address(next_id),
        );
        let receipt = chain.send(&[ix], &[owner]).await?;

        match receipt.require_event(EventKind::SubscriptionCreated)? {
            ChainEvent::Coordinator(CoordinatorEvent::SubscriptionCreated { subscription_id, .. }) => {
                info!(subscription_id, owner = %owner.pubkey(), "subscription created");
                Ok(*subscription_id)
            }
            other => Err(Error::Decode(format!("unexpected event {:?}", other))),
        }
    }

    pub async fn fund_subscription(
        &self,
        chain: &mut LocalChain,
        payer: &Keypair,
        subscription_id: u64,
        amount: u64,
    ) -> Result<TxReceipt> {
        let ix = coordinator_instruction::fund_subscription(
            &self.program_id,
            &self.subscription_address(subscription_id),
            subscription_id,
            amount,
        );
        chain.send(&[ix], &[payer]).await
    }

    pub async fn add_consumer(
        &self,
        chain: &mut LocalChain,
        owner: &Keypair,
        subscription_id: u64,
        consumer: &Pubkey,
    ) -> Result<TxReceipt> {
        let ix = coordinator_instruction::add_consumer(
            &self.program_id,
            &owner.pubkey(),
            &self.subscription_address(subscription_id),
            subscription_id,
            consumer,
        );
        chain.send(&[ix], &[owner]).await
    }

    pub async fn remove_consumer(
        &self,
        chain: &mut LocalChain,
        owner: &Keypair,
        subscription_id: u64,
        consumer: &Pubkey,
    ) -> Result<TxReceipt> {
        let ix = coordinator_instruction::remove_consumer(
            &self.program_id,
            &owner.pubkey(),
            &self.subscription_address(subscription_id),
            subscription_id,
            consumer,
        );
        chain.send(&[ix], &[owner]).await
    }

    /// Play the oracle: answer `request_id` for `consumer`. Only the account
    /// of the player the words select is forwarded, so the transaction stays
    /// the same size however many players entered.
    pub async fn fulfill_random_words(
        &self,
        chain: &mut LocalChain,
        caller: &Keypair,
        request_id: u64,
        consumer: &RaffleContract,
    ) -> Result<TxReceipt> {
        let raffle = consumer.state(chain).await?;
        let request = self.request(chain, request_id).await?;
        let subscription_id = request.map_or(raffle.subscription_id, |r| r.subscription_id);

        let forwarded: Vec<AccountMeta> = request
            .and_then(|request| drawn_player(&raffle, request_id, request.num_words))
            .map(|winner| AccountMeta::new(winner, false))
            .into_iter()
            .collect();
        debug!(request_id, winner = ?forwarded.first().map(|meta| meta.pubkey), "fulfilling randomness");

        let ix = coordinator_instruction::fulfill_random_words(
            &self.program_id,
            &caller.pubkey(),
            &self.request_address(request_id),
            &self.subscription_address(subscription_id),
            &consumer.address,
            &consumer.program_id,
            request_id,
            &forwarded,
        );
        chain.send(&[ix], &[caller]).await
    }
}

/// The player the mock's words for `request_id` select.
pub fn drawn_player(raffle: &Raffle, request_id: u64, num_words: u32) -> Option<Pubkey> {
    let word = *random_words(request_id, num_words).first()?;
    let index = get_random_winner_index(word, raffle.players.len() as u64);
    raffle.players.get(index as usize).copied()
}
