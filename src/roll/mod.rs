//! Roll evaluation: the synchronous RNG path and the asynchronous
//! provider path share one set of term semantics.

mod error;
mod eval;
mod provider;
mod result;
mod roller;

pub use error::{ProviderError, RollError};
pub use eval::roll_percentile;
pub use provider::{roll_with_provider, CustomDie, DiceRequest, ValueProvider};
pub use result::{
    ChallengeOutcome, ChallengeRoll, ConstantRoll, DegradeOutcome, DiceRoll, RollResult, SingleDie,
    TermRoll,
};
pub use roller::DieRoller;

#[cfg(test)]
pub(crate) use roller::SeqRoller;

use crate::common::UInt;
use crate::expr::{DiceExpression, Term};

/// Roll an expression with the thread RNG.
pub fn roll<'a>(expression: &'a DiceExpression) -> Result<RollResult<'a>, RollError> {
    roll_with(expression, &mut rand::thread_rng())
}

/// Roll an expression against an injected die source. Deterministic for a
/// deterministic roller.
pub fn roll_with<'a, R: DieRoller + ?Sized>(
    expression: &'a DiceExpression,
    roller: &mut R,
) -> Result<RollResult<'a>, RollError> {
    let mut total = 0;
    let mut successes: Option<UInt> = None;
    let mut terms = Vec::with_capacity(expression.terms().len());

    for term in expression.terms() {
        let term_roll = match term {
            Term::Constant(constant) => {
                let signed = constant.sign.apply(constant.value);
                total += signed;
                TermRoll::Constant(ConstantRoll { value: signed })
            }
            Term::Challenge(challenge) => {
                let config = &challenge.config;
                let action_die = roller.roll_die(config.action_sides);
                let challenge_dice =
                    roller.roll_dice(config.challenge_count, config.challenge_sides);
                let roll = eval::evaluate_challenge_term(challenge, action_die, challenge_dice);
                total += roll.signed_action_score;
                TermRoll::Challenge(roll)
            }
            Term::Dice(dice) => {
                let roll = eval::roll_dice_term(dice, roller)?;
                total += roll.total;
                if let Some(count) = roll.successes {
                    successes = Some(successes.unwrap_or(0) + count);
                }
                TermRoll::Dice(roll)
            }
        };
        terms.push(term_roll);
    }

    Ok(RollResult {
        expression,
        total,
        successes,
        terms,
    })
}
