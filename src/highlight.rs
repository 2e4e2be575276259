//! UI-agnostic highlight events derived from a roll result. Pure and
//! stateless; output order follows term order, then die order.

use crate::common::UInt;
use crate::roll::{ChallengeOutcome, ChallengeRoll, DiceRoll, RollResult, TermRoll};
use serde::Serialize;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CritKind {
    Success,
    Failure,
}

/// A salient event in a roll result worth surfacing to the player.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RollHighlight {
    ChallengeOutcome {
        outcome: ChallengeOutcome,
        boon: bool,
        complication: bool,
        term_index: usize,
        color: String,
    },
    NaturalCrit {
        value: UInt,
        sides: UInt,
        die_index: usize,
        term_index: usize,
        crit: CritKind,
    },
    PoolSuccess {
        successes: UInt,
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<UInt>,
        #[serde(skip_serializing_if = "Option::is_none")]
        met_target: Option<bool>,
        term_index: usize,
    },
    Degrade {
        step: UInt,
        term_index: usize,
    },
}

fn outcome_color(outcome: ChallengeOutcome) -> &'static str {
    match outcome {
        ChallengeOutcome::StrongHit => "#22c55e",
        ChallengeOutcome::WeakHit => "#d97706",
        ChallengeOutcome::Miss => "#ef4444",
    }
}

/// Derive the highlight list for a roll result.
pub fn annotate(result: &RollResult<'_>) -> Vec<RollHighlight> {
    let mut highlights = Vec::new();
    for (term_index, term_roll) in result.terms.iter().enumerate() {
        match term_roll {
            TermRoll::Challenge(roll) => highlights.push(RollHighlight::ChallengeOutcome {
                outcome: roll.outcome,
                boon: roll.boon,
                complication: roll.complication,
                term_index,
                color: outcome_color(roll.outcome).to_string(),
            }),
            TermRoll::Dice(roll) => annotate_dice_term(roll, term_index, &mut highlights),
            TermRoll::Constant(_) => {}
        }
    }
    highlights
}

fn annotate_dice_term(roll: &DiceRoll<'_>, term_index: usize, highlights: &mut Vec<RollHighlight>) {
    // Natural crits only exist on d20s, and dropped dice are never
    // flagged.
    if roll.term.sides == 20 {
        for die in &roll.dice {
            if die.dropped {
                continue;
            }
            let crit = match die.value {
                20 => Some(CritKind::Success),
                1 => Some(CritKind::Failure),
                _ => None,
            };
            if let Some(crit) = crit {
                highlights.push(RollHighlight::NaturalCrit {
                    value: die.value,
                    sides: roll.term.sides,
                    die_index: die.index,
                    term_index,
                    crit,
                });
            }
        }
    }

    if let Some(successes) = roll.successes {
        if successes > 0 {
            highlights.push(RollHighlight::PoolSuccess {
                successes,
                target: roll.term.pool.as_ref().and_then(|pool| pool.target),
                met_target: roll.met_target,
                term_index,
            });
        }
    }

    if let Some(degrade) = &roll.degrade {
        if degrade.triggered {
            highlights.push(RollHighlight::Degrade {
                step: degrade.step,
                term_index,
            });
        }
    }
}

/// The challenge term results of a roll, in term order. Convenience for
/// callers that drive journal annotations from contests.
pub fn challenge_results<'r, 'a>(result: &'r RollResult<'a>) -> Vec<&'r ChallengeRoll<'a>> {
    result
        .terms
        .iter()
        .filter_map(|term_roll| match term_roll {
            TermRoll::Challenge(roll) => Some(roll),
            _ => None,
        })
        .collect()
}
