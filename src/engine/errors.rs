use crate::domain::Chips;
use crate::protocol::ErrorCode;

use super::types::GameStatus;

/// Rejections of a single player action. No state is mutated when one of
/// these is returned, and exactly one surfaces per input.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("it is not {0}'s turn")]
    NotYourTurn(String),
    #[error("action '{action}' is not legal now")]
    InvalidAction { action: String },
    #[error("amount {got} out of range [{min}, {max}]")]
    AmountOutOfRange { got: Chips, min: Chips, max: Chips },
    #[error("unknown player {0}")]
    UnknownPlayer(String),
    #[error("no betting in {0}")]
    WrongPhase(GameStatus),
    #[error("stack too short: need {needed}, have {available}")]
    InsufficientFunds { needed: Chips, available: Chips },
}

impl ActionError {
    pub fn wire_code(&self) -> ErrorCode {
        match self {
            ActionError::NotYourTurn(_) => ErrorCode::NotYourTurn,
            ActionError::InvalidAction { .. } => ErrorCode::InvalidAction,
            ActionError::AmountOutOfRange { .. } => ErrorCode::InvalidAction,
            ActionError::UnknownPlayer(_) => ErrorCode::PlayerNotFound,
            ActionError::WrongPhase(_) => ErrorCode::GameNotStarted,
            ActionError::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
        }
    }
}

/// Structural failures of table-level operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StateError {
    #[error("table is full ({0} seats)")]
    TableFull(usize),
    #[error("need at least {needed} ready players, have {have}")]
    InsufficientPlayers { needed: usize, have: usize },
    #[error("operation not allowed in {0}")]
    WrongPhase(GameStatus),
    #[error("player {0} already seated")]
    AlreadyInGame(String),
}

impl StateError {
    pub fn wire_code(&self) -> ErrorCode {
        match self {
            StateError::TableFull(_) => ErrorCode::GameFull,
            StateError::InsufficientPlayers { .. } => ErrorCode::GameNotStarted,
            StateError::WrongPhase(_) => ErrorCode::GameNotStarted,
            StateError::AlreadyInGame(_) => ErrorCode::AlreadyInGame,
        }
    }
}
