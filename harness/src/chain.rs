//! In-process chain with both programs loaded.
//!
//! Wraps `ProgramTestContext` with the controls the lifecycle tests need:
//! funded signers, transactions that come back as receipts with decoded events,
//! read-only simulation, and explicit time and block advancement.

use solana_program::{
    instruction::Instruction, native_token::LAMPORTS_PER_SOL, pubkey::Pubkey, rent::Rent,
    system_program, sysvar::clock::Clock,
};
use solana_program_test::{
    processor, BanksClient, BanksClientError, ProgramTest, ProgramTestBanksClientExt,
    ProgramTestContext,
};
use solana_sdk::{
    account::Account,
    packet::PACKET_DATA_SIZE,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use std::collections::HashSet;
use std::convert::TryFrom;
use std::future::Future;
use tracing::{debug, info};

use crate::error::{Error, Result, Revert};
use crate::events::{parse_logs, ChainEvent, Completion, EventBus, EventKind};

/// Signers available to tests; index 0 is the deployer.
pub const SIGNER_COUNT: usize = 6;

/// Starting lamports of every signer except the deployer.
pub const SIGNER_FUNDING: u64 = 100 * LAMPORTS_PER_SOL;

/// A committed transaction.
#[derive(Debug, Clone)]
pub struct TxReceipt {
    pub signature: Signature,
    pub logs: Vec<String>,
    pub events: Vec<ChainEvent>,
}

impl TxReceipt {
    pub fn event(&self, kind: EventKind) -> Option<&ChainEvent> {
        self.events.iter().find(|event| event.kind() == kind)
    }

    pub fn require_event(&self, kind: EventKind) -> Result<&ChainEvent> {
        self.event(kind)
            .ok_or_else(|| Error::MissingEvent(format!("{} in {}", kind, self.signature)))
    }
}

/// A simulated transaction; nothing it did was kept.
#[derive(Debug, Clone)]
pub struct Simulation {
    pub logs: Vec<String>,
    pub events: Vec<ChainEvent>,
}

pub struct LocalChain {
    context: ProgramTestContext,
    signers: Vec<Keypair>,
    bus: EventBus,
    sent: HashSet<Signature>,
}

impl LocalChain {
    /// Boot a fresh bank with the raffle and the coordinator mock deployed.
    pub async fn start() -> Result<Self> {
        let mut program_test = ProgramTest::new(
            "raffle",
            raffle::id(),
            processor!(raffle::process_instruction),
        );
        program_test.add_program(
            "vrf_coordinator_mock",
            vrf_coordinator_mock::id(),
            processor!(vrf_coordinator_mock::process_instruction),
        );

        let players: Vec<Keypair> = (1..SIGNER_COUNT).map(|_| Keypair::new()).collect();
        for player in &players {
            program_test.add_account(
                player.pubkey(),
                Account::new(SIGNER_FUNDING, 0, &system_program::id()),
            );
        }

        let context = program_test.start_with_context().await;
        let deployer = copy_keypair(&context.payer)?;

        let mut signers = Vec::with_capacity(SIGNER_COUNT);
        signers.push(deployer);
        signers.extend(players);

        info!(deployer = %signers[0].pubkey(), "local chain started");
        Ok(Self {
            context,
            signers,
            bus: EventBus::default(),
            sent: HashSet::new(),
        })
    }

    /// A copy of signer `index` (0 is the deployer).
    pub fn signer(&self, index: usize) -> Result<Keypair> {
        let keypair = self
            .signers
            .get(index)
            .ok_or_else(|| Error::Chain(format!("no signer {} of {}", index, self.signers.len())))?;
        copy_keypair(keypair)
    }

    pub fn deployer(&self) -> Result<Keypair> {
        self.signer(0)
    }

    /// A handle for queries made off the main test flow.
    pub fn banks(&self) -> BanksClient {
        self.context.banks_client.clone()
    }

    /// Subscribe to `kind` now and run `callback` when it fires.
    pub fn once<T, F, Fut>(&self, kind: EventKind, callback: F) -> Completion<T>
    where
        T: Send + 'static,
        F: FnOnce(ChainEvent, BanksClient) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.bus.listener().once(kind, self.banks(), callback)
    }

    /// Sign with `signers` (the first pays fees) and commit. A rejected
    /// transaction comes back as [`Error::Reverted`].
    ///
    /// The bank does not hand back logs for committed transactions, so the
    /// transaction is simulated against the same state first and its logs
    /// are taken from the simulation.
    pub async fn send(&mut self, instructions: &[Instruction], signers: &[&Keypair]) -> Result<TxReceipt> {
        let transaction = self.sign(instructions, signers).await?;
        let signature = transaction.signatures[0];

        let simulated = self
            .context
            .banks_client
            .simulate_transaction(transaction.clone())
            .await?;
        let logs = simulated
            .simulation_details
            .map(|details| details.logs)
            .unwrap_or_default();

        if let Some(Err(err)) = simulated.result {
            let revert = Revert::from_transaction_error(err, &logs);
            debug!(%signature, reason = %revert, "transaction reverted");
            return Err(Error::Reverted(revert));
        }

        match self.context.banks_client.process_transaction(transaction).await {
            Ok(()) => {}
            Err(BanksClientError::TransactionError(err)) => {
                let revert = Revert::from_transaction_error(err, &logs);
                debug!(%signature, reason = %revert, "transaction reverted");
                return Err(Error::Reverted(revert));
            }
            Err(err) => return Err(err.into()),
        }

        let events = parse_logs(&logs);
        for event in &events {
            self.bus.publish(event.clone());
        }
        Ok(TxReceipt {
            signature,
            logs,
            events,
        })
    }

    /// Run the transaction without committing it.
    pub async fn simulate(&mut self, instructions: &[Instruction], signers: &[&Keypair]) -> Result<Simulation> {
        let transaction = self.sign(instructions, signers).await?;
        let simulated = self
            .context
            .banks_client
            .simulate_transaction(transaction)
            .await?;

        let logs = simulated
            .simulation_details
            .map(|details| details.logs)
            .unwrap_or_default();
        if let Some(Err(err)) = simulated.result {
            return Err(Error::Reverted(Revert::from_transaction_error(err, &logs)));
        }
        let events = parse_logs(&logs);
        Ok(Simulation { logs, events })
    }

    async fn sign(&mut self, instructions: &[Instruction], signers: &[&Keypair]) -> Result<Transaction> {
        let payer = signers
            .first()
            .map(|payer| payer.pubkey())
            .ok_or_else(|| Error::Chain("a transaction needs a fee payer".to_string()))?;
        let signers: Vec<&Keypair> = signers.to_vec();

        let blockhash = self.context.banks_client.get_latest_blockhash().await?;
        let mut transaction = Transaction::new_with_payer(instructions, Some(&payer));
        transaction
            .try_sign(&signers, blockhash)
            .map_err(|e| Error::Chain(e.to_string()))?;

        // An identical transaction under the same blockhash would be dropped
        // as already processed.
        if self.sent.contains(&transaction.signatures[0]) {
            let fresh = self
                .context
                .banks_client
                .get_new_latest_blockhash(&blockhash)
                .await?;
            self.context.last_blockhash = fresh;
            transaction
                .try_sign(&signers, fresh)
                .map_err(|e| Error::Chain(e.to_string()))?;
        }

        let size = wire_size(&transaction);
        if size > PACKET_DATA_SIZE {
            return Err(Error::Chain(format!(
                "transaction is {} bytes, over the {} byte packet limit",
                size, PACKET_DATA_SIZE
            )));
        }
        self.sent.insert(transaction.signatures[0]);
        Ok(transaction)
    }

    pub async fn clock(&mut self) -> Result<Clock> {
        Ok(self.context.banks_client.get_sysvar::<Clock>().await?)
    }

    pub async fn rent(&mut self) -> Result<Rent> {
        Ok(self.context.banks_client.get_rent().await?)
    }

    /// Move the clock forward by `seconds` and mine one block.
    pub async fn advance_time(&mut self, seconds: u64) -> Result<()> {
        let before = self.clock().await?;
        self.warp(before.slot + 1)?;

        let mut clock = self.clock().await?;
        let seconds = i64::try_from(seconds)
            .map_err(|_| Error::Chain(format!("cannot advance time by {} seconds", seconds)))?;
        clock.unix_timestamp = before.unix_timestamp.saturating_add(seconds);
        self.context.set_sysvar(&clock);

        debug!(
            slot = clock.slot,
            unix_timestamp = clock.unix_timestamp,
            "advanced time by {}s",
            seconds
        );
        Ok(())
    }

    /// Mine `blocks` blocks without moving the clock.
    pub async fn mine_blocks(&mut self, blocks: u64) -> Result<()> {
        if blocks == 0 {
            return Ok(());
        }
        let before = self.clock().await?;
        self.warp(before.slot + blocks)?;

        let mut clock = self.clock().await?;
        clock.unix_timestamp = before.unix_timestamp;
        self.context.set_sysvar(&clock);

        debug!(slot = clock.slot, "mined {} blocks", blocks);
        Ok(())
    }

    pub async fn slot(&mut self) -> Result<u64> {
        Ok(self.clock().await?.slot)
    }

    pub async fn balance(&mut self, address: &Pubkey) -> Result<u64> {
        Ok(self.context.banks_client.get_balance(*address).await?)
    }

    pub async fn account(&mut self, address: &Pubkey) -> Result<Account> {
        self.context
            .banks_client
            .get_account(*address)
            .await?
            .ok_or(Error::AccountNotFound(*address))
    }

    pub async fn try_account(&mut self, address: &Pubkey) -> Result<Option<Account>> {
        Ok(self.context.banks_client.get_account(*address).await?)
    }

    fn warp(&mut self, slot: u64) -> Result<()> {
        self.context
            .warp_to_slot(slot)
            .map_err(|e| Error::Chain(format!("warp to slot {}: {:?}", slot, e)))
    }
}

/// Serialized length: compact signature count, signatures, message.
pub fn wire_size(transaction: &Transaction) -> usize {
    let count = transaction.signatures.len();
    let count_len = if count < 0x80 { 1 } else { 2 };
    count_len + count * 64 + transaction.message.serialize().len()
}

fn copy_keypair(keypair: &Keypair) -> Result<Keypair> {
    Keypair::from_bytes(&keypair.to_bytes()).map_err(|e| Error::Chain(e.to_string()))
}
