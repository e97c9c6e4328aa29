// Raffle events, logged in the same `event: <Name> key=value` form the
// coordinator uses so one parser reads both programs.
use solana_program::{msg, pubkey::Pubkey};
use std::fmt;
use vrf_coordinator_mock::event::{EventLine, EVENT_LOG_PREFIX};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaffleEvent {
    RaffleEnter { player: Pubkey },
    UpkeepChecked { upkeep_needed: bool },
    RequestedRaffleWinner { request_id: u64 },
    WinnerPicked { winner: Pubkey },
}

impl RaffleEvent {
    pub fn emit(&self) {
        msg!("{}{}", EVENT_LOG_PREFIX, self);
    }

    pub fn from_log(line: &str) -> Option<Self> {
        let event = EventLine::parse(line)?;
        Some(match event.name {
            "RaffleEnter" => Self::RaffleEnter {
                player: event.get("player")?,
            },
            "UpkeepChecked" => Self::UpkeepChecked {
                upkeep_needed: event.get("upkeep_needed")?,
            },
            "RequestedRaffleWinner" => Self::RequestedRaffleWinner {
                request_id: event.get("request_id")?,
            },
            "WinnerPicked" => Self::WinnerPicked {
                winner: event.get("winner")?,
            },
            _ => return None,
        })
    }
}

impl fmt::Display for RaffleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RaffleEnter { player } => write!(f, "RaffleEnter player={}", player),
            Self::UpkeepChecked { upkeep_needed } => {
                write!(f, "UpkeepChecked upkeep_needed={}", upkeep_needed)
            }
            Self::RequestedRaffleWinner { request_id } => {
                write!(f, "RequestedRaffleWinner request_id={}", request_id)
            }
            Self::WinnerPicked { winner } => write!(f, "WinnerPicked winner={}", winner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_back_its_own_log_lines() {
        let winner = Pubkey::new_unique();
        let line = format!("Program log: {}{}", EVENT_LOG_PREFIX, RaffleEvent::WinnerPicked { winner });
        assert_eq!(RaffleEvent::from_log(&line), Some(RaffleEvent::WinnerPicked { winner }));
    }

    #[test]
    fn coordinator_events_are_not_raffle_events() {
        assert_eq!(
            RaffleEvent::from_log("Program log: event: RandomWordsFulfilled request_id=1 payment=5 success=true"),
            None
        );
    }
}
