use crate::common::{Int, NonEmpty, UInt};
use crate::expr::{ChallengeTerm, DiceExpression, DiceTerm};
use serde::Serialize;
use std::fmt;

/// One die of a dice term's batch. `kept` and `dropped` are mutually
/// exclusive; an unselected die defaults to kept.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct SingleDie {
    pub index: usize,
    pub value: UInt,
    pub kept: bool,
    pub dropped: bool,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ConstantRoll {
    /// Already signed.
    pub value: Int,
}

/// Degrade rule evaluation. Present whenever the term carries a rule,
/// triggered or not.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct DegradeOutcome {
    pub triggered: bool,
    pub step: UInt,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct DiceRoll<'a> {
    pub term: &'a DiceTerm,
    /// The flattened dice, explosion batches included.
    pub dice: Vec<SingleDie>,
    /// Signed sum of the kept dice.
    pub total: Int,
    /// Per-batch raw values when the term explodes; batch 0 is the
    /// initial roll.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explosions: Option<NonEmpty<Vec<UInt>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successes: Option<UInt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub met_target: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degrade: Option<DegradeOutcome>,
}

impl DiceRoll<'_> {
    /// Batches rolled beyond the initial one.
    pub fn explosion_count(&self) -> usize {
        self.explosions.as_ref().map_or(0, |batches| batches.len() - 1)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
pub enum ChallengeOutcome {
    #[serde(rename = "Strong Hit")]
    StrongHit,
    #[serde(rename = "Weak Hit")]
    WeakHit,
    Miss,
}

impl fmt::Display for ChallengeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::StrongHit => "Strong Hit",
            Self::WeakHit => "Weak Hit",
            Self::Miss => "Miss",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ChallengeRoll<'a> {
    pub term: &'a ChallengeTerm,
    pub action_die: UInt,
    pub action_modifier: Int,
    pub action_score: Int,
    /// The action score with the term's sign applied; this is the term's
    /// contribution to the roll total.
    pub signed_action_score: Int,
    pub challenge_dice: Vec<UInt>,
    pub challenge_modifier: Int,
    pub challenge_scores: Vec<Int>,
    pub outcome: ChallengeOutcome,
    pub boon: bool,
    pub complication: bool,
}

/// Per-term result, mirroring [`Term`](crate::Term).
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TermRoll<'a> {
    Constant(ConstantRoll),
    Dice(DiceRoll<'a>),
    Challenge(ChallengeRoll<'a>),
}

/// A complete evaluated roll. Borrows the expression it was rolled from;
/// produced fresh per invocation and never cached.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct RollResult<'a> {
    pub expression: &'a DiceExpression,
    /// Signed sum across all terms.
    pub total: Int,
    /// Sum of successes across pool-bearing dice terms; `None` when no
    /// term defines a pool rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successes: Option<UInt>,
    /// Same order as the expression's terms.
    pub terms: Vec<TermRoll<'a>>,
}
