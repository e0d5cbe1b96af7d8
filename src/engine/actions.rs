use crate::domain::Chips;

use super::errors::ActionError;

/// A player's betting decision. `Bet` opens a street; `Raise` is the
/// raise-to total, not the increment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerAction {
    Fold,
    Check,
    Call,
    Bet(Chips),
    Raise(Chips),
}

impl PlayerAction {
    pub fn name(self) -> &'static str {
        match self {
            PlayerAction::Fold => "fold",
            PlayerAction::Check => "check",
            PlayerAction::Call => "call",
            PlayerAction::Bet(_) => "bet",
            PlayerAction::Raise(_) => "raise",
        }
    }

    /// Parse the wire `(action, value)` pair.
    pub fn parse(action: &str, value: Chips) -> Result<Self, ActionError> {
        match action {
            "fold" => Ok(PlayerAction::Fold),
            "check" => Ok(PlayerAction::Check),
            "call" => Ok(PlayerAction::Call),
            "bet" => Ok(PlayerAction::Bet(value)),
            "raise" => Ok(PlayerAction::Raise(value)),
            other => Err(ActionError::InvalidAction {
                action: other.to_string(),
            }),
        }
    }

    pub fn amount(self) -> Chips {
        match self {
            PlayerAction::Bet(v) | PlayerAction::Raise(v) => v,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_names() {
        for (name, value) in [("fold", 0), ("check", 0), ("call", 0), ("bet", 40), ("raise", 80)] {
            let action = PlayerAction::parse(name, value).expect("parse");
            assert_eq!(action.name(), name);
            assert_eq!(action.amount(), value);
        }
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(matches!(
            PlayerAction::parse("shove", 0),
            Err(ActionError::InvalidAction { .. })
        ));
    }
}
