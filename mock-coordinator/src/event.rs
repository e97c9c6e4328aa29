// Coordinator events, written to the program log as
// `event: <Name> key=value key=value`
use solana_program::{msg, pubkey::Pubkey};
use std::fmt;
use std::str::FromStr;

/// Marker in front of every event line (after the runtime's `Program log: `)
pub const EVENT_LOG_PREFIX: &str = "event: ";

const PROGRAM_LOG_PREFIX: &str = "Program log: ";

/// A decoded `event:` log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLine<'a> {
    pub name: &'a str,
    fields: Vec<(&'a str, &'a str)>,
}

impl<'a> EventLine<'a> {
    /// Accepts both the raw message and the runtime-prefixed log line.
    pub fn parse(line: &'a str) -> Option<Self> {
        let line = line.strip_prefix(PROGRAM_LOG_PREFIX).unwrap_or(line);
        let body = line.strip_prefix(EVENT_LOG_PREFIX)?;
        let mut parts = body.split_whitespace();
        let name = parts.next()?;
        let fields = parts
            .map(|part| part.split_once('='))
            .collect::<Option<Vec<_>>>()?;
        Some(Self { name, fields })
    }

    pub fn get<T: FromStr>(&self, key: &str) -> Option<T> {
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, v)| v.parse().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    SubscriptionCreated {
        subscription_id: u64,
        owner: Pubkey,
    },
    SubscriptionFunded {
        subscription_id: u64,
        old_balance: u64,
        new_balance: u64,
    },
    ConsumerAdded {
        subscription_id: u64,
        consumer: Pubkey,
    },
    ConsumerRemoved {
        subscription_id: u64,
        consumer: Pubkey,
    },
    RandomWordsRequested {
        request_id: u64,
        subscription_id: u64,
        request_confirmations: u16,
        callback_gas_limit: u32,
        num_words: u32,
        sender: Pubkey,
    },
    RandomWordsFulfilled {
        request_id: u64,
        payment: u64,
        success: bool,
    },
}

impl CoordinatorEvent {
    pub fn emit(&self) {
        msg!("{}{}", EVENT_LOG_PREFIX, self);
    }

    pub fn from_log(line: &str) -> Option<Self> {
        let event = EventLine::parse(line)?;
        Some(match event.name {
            "SubscriptionCreated" => Self::SubscriptionCreated {
                subscription_id: event.get("subscription_id")?,
                owner: event.get("owner")?,
            },
            "SubscriptionFunded" => Self::SubscriptionFunded {
                subscription_id: event.get("subscription_id")?,
                old_balance: event.get("old_balance")?,
                new_balance: event.get("new_balance")?,
            },
            "ConsumerAdded" => Self::ConsumerAdded {
                subscription_id: event.get("subscription_id")?,
                consumer: event.get("consumer")?,
            },
            "ConsumerRemoved" => Self::ConsumerRemoved {
                subscription_id: event.get("subscription_id")?,
                consumer: event.get("consumer")?,
            },
            "RandomWordsRequested" => Self::RandomWordsRequested {
                request_id: event.get("request_id")?,
                subscription_id: event.get("subscription_id")?,
                request_confirmations: event.get("request_confirmations")?,
                callback_gas_limit: event.get("callback_gas_limit")?,
                num_words: event.get("num_words")?,
                sender: event.get("sender")?,
            },
            "RandomWordsFulfilled" => Self::RandomWordsFulfilled {
                request_id: event.get("request_id")?,
                payment: event.get("payment")?,
                success: event.get("success")?,
            },
            _ => return None,
        })
    }
}

impl fmt::Display for CoordinatorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubscriptionCreated {
                subscription_id,
                owner,
            } => write!(
                f,
                "SubscriptionCreated subscription_id={} owner={}",
                subscription_id, owner
            ),
            Self::SubscriptionFunded {
                subscription_id,
                old_balance,
                new_balance,
            } => write!(
                f,
                "SubscriptionFunded subscription_id={} old_balance={} new_balance={}",
                subscription_id, old_balance, new_balance
            ),
            Self::ConsumerAdded {
                subscription_id,
                consumer,
            } => write!(
                f,
                "ConsumerAdded subscription_id={} consumer={}",
                subscription_id, consumer
            ),
            Self::ConsumerRemoved {
                subscription_id,
                consumer,
            } => write!(
                f,
                "ConsumerRemoved subscription_id={} consumer={}",
                subscription_id, consumer
            ),
            Self::RandomWordsRequested {
                request_id,
                subscription_id,
                request_confirmations,
                callback_gas_limit,
                num_words,
                sender,
            } => write!(
                f,
                "RandomWordsRequested request_id={} subscription_id={} request_confirmations={} callback_gas_limit={} num_words={} sender={}",
                request_id, subscription_id, request_confirmations, callback_gas_limit, num_words, sender
            ),
            Self::RandomWordsFulfilled {
                request_id,
                payment,
                success,
            } => write!(
                f,
                "RandomWordsFulfilled request_id={} payment={} success={}",
                request_id, payment, success
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_runtime_prefixed_lines() {
        let owner = Pubkey::new_unique();
        let line = format!(
            "Program log: event: SubscriptionCreated subscription_id=1 owner={}",
            owner
        );
        assert_eq!(
            CoordinatorEvent::from_log(&line),
            Some(CoordinatorEvent::SubscriptionCreated {
                subscription_id: 1,
                owner
            })
        );
    }

    #[test]
    fn ignores_plain_messages_and_malformed_fields() {
        assert_eq!(CoordinatorEvent::from_log("Program log: Instruction: Fund"), None);
        assert_eq!(
            CoordinatorEvent::from_log("Program log: event: RandomWordsFulfilled request_id=x payment=1 success=true"),
            None
        );
        assert_eq!(EventLine::parse("event: Broken key"), None);
    }

    #[test]
    fn display_output_parses_back() {
        let event = CoordinatorEvent::RandomWordsRequested {
            request_id: 3,
            subscription_id: 1,
            request_confirmations: 3,
            callback_gas_limit: 500_000,
            num_words: 1,
            sender: Pubkey::new_unique(),
        };
        let line = format!("{}{}", EVENT_LOG_PREFIX, event);
        assert_eq!(CoordinatorEvent::from_log(&line), Some(event));
    }
}
