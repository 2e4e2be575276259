use crate::common::{Comparator, Int, SelectionMode, Sign, UInt};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Keep/drop rule narrowing which rolled dice count toward the total.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SelectionRule {
    pub mode: SelectionMode,
    pub count: UInt,
}

/// Success-counting rule treating each die as a hit/miss against a threshold.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PoolRule {
    pub comparator: Comparator,
    pub threshold: UInt,
    /// Number of successes required for the pool to count as met.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<UInt>,
}

/// Dice at or above the threshold roll an additional die, chaining until
/// no die qualifies.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExplodeRule {
    pub threshold: UInt,
}

/// Signal that some external resource die should step down in size.
/// The evaluator only reports the trigger; what a step means is caller
/// policy.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct DegradeRule {
    pub comparator: Comparator,
    pub threshold: UInt,
    /// Steps to degrade when triggered. `None` means the default of 1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<UInt>,
}

/// Tens/ones component dice of a custom percentile term such as `d%66`.
/// Plain `d100`/`d%100` terms carry no descriptor; their dual-die behavior
/// lives in the evaluator.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PercentileDice {
    pub tens_sides: UInt,
    pub ones_sides: UInt,
    /// The digits as written, kept for description (`66` in `d%66`).
    pub raw: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct DiceTerm {
    pub count: UInt,
    /// Sides per die. For custom percentile terms this is the *effective*
    /// range (`tens_sides * 10 + ones_sides`), used for description only.
    pub sides: UInt,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentile: Option<PercentileDice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<SelectionRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explode: Option<ExplodeRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degrade: Option<DegradeRule>,
    pub sign: Sign,
    /// Originating fragment, sign included, kept for diagnostics.
    pub source: String,
}

impl DiceTerm {
    /// True for terms the evaluator rolls as a tens die plus a ones die.
    pub fn is_percentile(&self) -> bool {
        self.sides == 100 || self.percentile.is_some()
    }
}

/// An action-die-vs-challenge-dice contest (1d6 vs 2d10 by default).
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChallengeConfig {
    pub action_sides: UInt,
    pub action_modifier: Int,
    pub challenge_sides: UInt,
    pub challenge_count: UInt,
    pub challenge_modifier: Int,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            action_sides: 6,
            action_modifier: 0,
            challenge_sides: 10,
            challenge_count: 2,
            challenge_modifier: 0,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChallengeTerm {
    pub config: ChallengeConfig,
    pub sign: Sign,
    pub source: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConstantTerm {
    pub value: Int,
    pub sign: Sign,
    pub source: String,
}

/// One signed sub-expression of a roll notation.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Term {
    Constant(ConstantTerm),
    Dice(DiceTerm),
    Challenge(ChallengeTerm),
}

impl Term {
    pub fn sign(&self) -> Sign {
        match self {
            Self::Constant(t) => t.sign,
            Self::Dice(t) => t.sign,
            Self::Challenge(t) => t.sign,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            Self::Constant(t) => &t.source,
            Self::Dice(t) => &t.source,
            Self::Challenge(t) => &t.source,
        }
    }
}

/// A fragment the parser could not read. Recorded instead of raised unless
/// strict parsing was requested.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ParseWarning {
    /// The fragment as fragmented, explicit sign included.
    pub fragment: String,
    pub reason: String,
}

/// An immutable parsed notation: the ordered terms plus any warnings.
/// Construct one through [`parse`](crate::parse) or
/// [`parse_strict`](crate::parse_strict); re-parsing always produces a new
/// instance.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct DiceExpression {
    original: String,
    terms: Vec<Term>,
    warnings: Vec<ParseWarning>,
}

impl DiceExpression {
    pub(crate) fn new(original: String, terms: Vec<Term>, warnings: Vec<ParseWarning>) -> Self {
        Self {
            original,
            terms,
            warnings,
        }
    }

    /// The notation as the caller typed it.
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    /// True when no fragment parsed to a term. Still rollable; the total
    /// is zero.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Canonical human-readable reconstruction of the notation, for UI
    /// labels. Round-trips structure, not exact spelling.
    pub fn describe(&self) -> String {
        if self.terms.is_empty() {
            return "(no dice)".to_string();
        }
        self.terms
            .iter()
            .map(describe_term)
            .collect::<Vec<_>>()
            .join(" + ")
            .replace("+ -", "- ")
    }
}

fn describe_term(term: &Term) -> String {
    let mut out = String::new();
    if term.sign() == Sign::Neg {
        out.push('-');
    }
    match term {
        Term::Constant(t) => {
            let _ = write!(out, "{}", t.value.abs());
        }
        Term::Challenge(t) => {
            let c = &t.config;
            out.push_str("challenge(");
            let _ = write!(out, "d{}", c.action_sides);
            write_modifier(&mut out, c.action_modifier);
            let _ = write!(out, " vs {}d{}", c.challenge_count, c.challenge_sides);
            write_modifier(&mut out, c.challenge_modifier);
            out.push(')');
        }
        Term::Dice(t) => {
            match &t.percentile {
                Some(p) => {
                    if t.count != 1 {
                        let _ = write!(out, "{}", t.count);
                    }
                    let _ = write!(out, "d%{}", p.raw);
                }
                None if t.count == 1 => {
                    let _ = write!(out, "d{}", t.sides);
                }
                None => {
                    let _ = write!(out, "{}d{}", t.count, t.sides);
                }
            }
            if let Some(sel) = &t.selection {
                let _ = write!(out, "{}{}", sel.mode, sel.count);
            }
            if let Some(pool) = &t.pool {
                let _ = write!(out, "{}{}", pool.comparator, pool.threshold);
                if let Some(target) = pool.target {
                    let _ = write!(out, "#{}", target);
                }
            }
            if let Some(explode) = &t.explode {
                if explode.threshold != t.sides {
                    let _ = write!(out, "!{}", explode.threshold);
                } else {
                    out.push('!');
                }
            }
            if let Some(degrade) = &t.degrade {
                let _ = write!(out, "!{}{}", degrade.comparator, degrade.threshold);
                if let Some(step) = degrade.step {
                    let _ = write!(out, ":{}", step);
                }
            }
        }
    }
    out
}

fn write_modifier(out: &mut String, modifier: Int) {
    if modifier != 0 {
        if modifier >= 0 {
            out.push('+');
        }
        let _ = write!(out, "{}", modifier);
    }
}

#[cfg(test)]
mod tests {
    use crate::parse;

    fn check_describe(notation: &str, expected: &str) {
        assert_eq!(parse(notation).describe(), expected);
    }

    #[test]
    fn describe_empty() {
        check_describe("", "(no dice)");
        check_describe("gibberish", "(no dice)");
    }

    #[test]
    fn describe_round_trips_canonical_notation() {
        check_describe("4d6dl1", "4d6dl1");
        check_describe("2d20kh1", "2d20kh1");
        check_describe("2d10>=8#2", "2d10>=8#2");
        check_describe("1d6!", "d6!");
        check_describe("d8!>=7:2", "d8!>=7:2");
        check_describe("d%66", "d%66");
        check_describe("3d%100", "3d100");
    }

    #[test]
    fn describe_joins_and_collapses_signs() {
        check_describe("4d6dl1 + 2", "4d6dl1 + 2");
        check_describe("4d6 - 2", "4d6 - 2");
        check_describe("2 - d4", "2 - d4");
    }

    #[test]
    fn describe_challenge() {
        check_describe("challenge", "challenge(d6 vs 2d10)");
        check_describe("challenge(d6+1 vs 2d10)", "challenge(d6+1 vs 2d10)");
        check_describe("challenge(d10-2 vs 3d8+1)", "challenge(d10-2 vs 3d8+1)");
    }

    #[test]
    fn expression_serde_round_trip() {
        let expr = parse("4d6kh3>=5#2!6!<=1:2 + d%66 - 3 + challenge(d6+1 vs 2d10)");
        let json = serde_json::to_string(&expr).unwrap();
        let back: super::DiceExpression = serde_json::from_str(&json).unwrap();
        assert_eq!(expr, back);
    }

    #[test]
    fn describe_explode_threshold() {
        // Explicit thresholds print; the default (the die's own sides)
        // prints as a bare bang.
        check_describe("1d6!6", "d6!");
        check_describe("1d6!5", "d6!5");
        // Custom percentile explode defaults to the effective sides.
        check_describe("d%66!", "d%66!");
        check_describe("d%66!20", "d%66!20");
    }
}
