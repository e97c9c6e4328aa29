//! Typed program events and the listener used to wait for asynchronous ones.
//!
//! Every committed transaction's log is parsed and published on an
//! [`EventBus`]. A test that expects an event to fire later takes an
//! [`EventListener`] *before* sending the transaction that triggers it, then
//! hands it a callback; the outcome comes back through a [`Completion`] that
//! resolves exactly once.

use raffle::event::RaffleEvent;
use solana_program_test::BanksClient;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use vrf_coordinator_mock::event::CoordinatorEvent;

use crate::error::{Error, Result};

/// How long a listener waits for its event unless told otherwise.
pub const DEFAULT_LISTENER_TIMEOUT: Duration = Duration::from_secs(200);

const BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    Raffle(RaffleEvent),
    Coordinator(CoordinatorEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RaffleEnter,
    UpkeepChecked,
    RequestedRaffleWinner,
    WinnerPicked,
    SubscriptionCreated,
    SubscriptionFunded,
    ConsumerAdded,
    ConsumerRemoved,
    RandomWordsRequested,
    RandomWordsFulfilled,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl ChainEvent {
    pub fn from_log(line: &str) -> Option<Self> {
        RaffleEvent::from_log(line)
            .map(Self::Raffle)
            .or_else(|| CoordinatorEvent::from_log(line).map(Self::Coordinator))
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Raffle(event) => match event {
                RaffleEvent::RaffleEnter { .. } => EventKind::RaffleEnter,
                RaffleEvent::UpkeepChecked { .. } => EventKind::UpkeepChecked,
                RaffleEvent::RequestedRaffleWinner { .. } => EventKind::RequestedRaffleWinner,
                RaffleEvent::WinnerPicked { .. } => EventKind::WinnerPicked,
            },
            Self::Coordinator(event) => match event {
                CoordinatorEvent::SubscriptionCreated { .. } => EventKind::SubscriptionCreated,
                CoordinatorEvent::SubscriptionFunded { .. } => EventKind::SubscriptionFunded,
                CoordinatorEvent::ConsumerAdded { .. } => EventKind::ConsumerAdded,
                CoordinatorEvent::ConsumerRemoved { .. } => EventKind::ConsumerRemoved,
                CoordinatorEvent::RandomWordsRequested { .. } => EventKind::RandomWordsRequested,
                CoordinatorEvent::RandomWordsFulfilled { .. } => EventKind::RandomWordsFulfilled,
            },
        }
    }
}

/// Events in log order. Lines that are not events are skipped.
pub fn parse_logs(logs: &[String]) -> Vec<ChainEvent> {
    logs.iter().filter_map(|line| ChainEvent::from_log(line)).collect()
}

/// Fan-out of every event the chain emits.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChainEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }
}

impl EventBus {
    pub fn publish(&self, event: ChainEvent) {
        debug!(kind = %event.kind(), "event: {:?}", event);
        // No listeners is normal; the event is simply not observed.
        let _ = self.sender.send(event);
    }

    /// Subscribe now. Events published from here on are seen by the listener.
    pub fn listener(&self) -> EventListener {
        EventListener {
            receiver: self.sender.subscribe(),
        }
    }
}

/// A subscription taken ahead of the transaction that will trigger its event.
pub struct EventListener {
    receiver: broadcast::Receiver<ChainEvent>,
}

impl EventListener {
    /// Run `callback` on the first `kind` event. The callback gets its own
    /// `BanksClient` so it can query state; its result (success or failed
    /// assertion) resolves the returned [`Completion`].
    pub fn once<T, F, Fut>(self, kind: EventKind, banks: BanksClient, callback: F) -> Completion<T>
    where
        T: Send + 'static,
        F: FnOnce(ChainEvent, BanksClient) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let mut events = self.receiver;

        let handle = tokio::spawn(async move {
            let outcome = loop {
                match events.recv().await {
                    Ok(event) if event.kind() == kind => {
                        debug!(%kind, "listener fired");
                        break callback(event, banks).await;
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%kind, skipped, "listener lagged behind the event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break Err(Error::Listener(format!("event bus closed before {}", kind)));
                    }
                }
            };
            // The receiver only goes away when the waiter gave up.
            let _ = sender.send(outcome);
        });

        Completion {
            receiver,
            handle,
            label: kind.to_string(),
        }
    }
}

/// Single outcome of a listener.
pub struct Completion<T> {
    receiver: oneshot::Receiver<Result<T>>,
    handle: JoinHandle<()>,
    label: String,
}

impl<T> Completion<T> {
    pub async fn wait(self) -> Result<T> {
        self.wait_for(DEFAULT_LISTENER_TIMEOUT).await
    }

    pub async fn wait_for(self, timeout: Duration) -> Result<T> {
        let Completion {
            receiver,
            handle,
            label,
        } = self;

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => match handle.await {
                Err(join) if join.is_panic() => {
                    Err(Error::Listener(format!("{} listener panicked", label)))
                }
                _ => Err(Error::Listener(format!("{} listener dropped its result", label))),
            },
            Err(_) => {
                handle.abort();
                Err(Error::Timeout(label))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ensure;
    use solana_program::pubkey::Pubkey;
    use solana_program_test::ProgramTest;

    async fn banks() -> BanksClient {
        let (banks, _payer, _blockhash) = ProgramTest::default().start().await;
        banks
    }

    fn entered() -> ChainEvent {
        ChainEvent::Raffle(RaffleEvent::RaffleEnter {
            player: Pubkey::new_unique(),
        })
    }

    #[test]
    fn parses_events_from_both_programs_in_order() {
        let player = Pubkey::new_unique();
        let logs = vec![
            "Program D1gs94X884bMWi5U4NPJfaucbZUweiSbqoe5U9L2bKdd invoke [1]".to_string(),
            "Program log: Instruction: Perform Upkeep".to_string(),
            "Program log: event: RandomWordsRequested request_id=1 subscription_id=1 request_confirmations=3 callback_gas_limit=500000 num_words=1 sender=11111111111111111111111111111111".to_string(),
            "Program log: event: RequestedRaffleWinner request_id=1".to_string(),
            format!("Program log: event: RaffleEnter player={}", player),
        ];

        let kinds: Vec<EventKind> = parse_logs(&logs).iter().map(ChainEvent::kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::RandomWordsRequested,
                EventKind::RequestedRaffleWinner,
                EventKind::RaffleEnter
            ]
        );
    }

    #[tokio::test]
    async fn events_before_subscribing_are_not_seen() {
        let bus = EventBus::default();
        bus.publish(ChainEvent::Raffle(RaffleEvent::RequestedRaffleWinner { request_id: 1 }));

        let mut listener = bus.listener();
        bus.publish(ChainEvent::Raffle(RaffleEvent::RequestedRaffleWinner { request_id: 2 }));

        assert_eq!(
            listener.receiver.recv().await.unwrap(),
            ChainEvent::Raffle(RaffleEvent::RequestedRaffleWinner { request_id: 2 })
        );
    }

    #[tokio::test]
    async fn failed_callback_check_resolves_as_an_assertion() {
        let bus = EventBus::default();
        let completion: Completion<()> = bus
            .listener()
            .once(EventKind::RaffleEnter, banks().await, |_, _| async move {
                ensure(false, "players not cleared")?;
                Ok(())
            });
        bus.publish(entered());

        match completion.wait().await {
            Err(Error::Assertion(message)) => assert_eq!(message, "players not cleared"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn panicking_callback_is_a_listener_failure() {
        let bus = EventBus::default();
        let completion: Completion<()> = bus
            .listener()
            .once(EventKind::RaffleEnter, banks().await, |event, _| async move {
                if event.kind() == EventKind::RaffleEnter {
                    panic!("callback blew up");
                }
                Ok(())
            });
        bus.publish(entered());

        match completion.wait().await {
            Err(Error::Listener(message)) => assert_eq!(message, "RaffleEnter listener panicked"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn listener_times_out_without_its_event() {
        let bus = EventBus::default();
        let completion: Completion<()> = bus
            .listener()
            .once(EventKind::WinnerPicked, banks().await, |_, _| async move { Ok(()) });
        bus.publish(entered());

        match completion.wait_for(Duration::from_millis(100)).await {
            Err(Error::Timeout(label)) => assert_eq!(label, "WinnerPicked"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
