//! Dice notation parsing and roll evaluation for tabletop journaling.
//!
//! Notation strings such as `4d6dl1 + 2`, `d%66!>=5:2`, or
//! `challenge(d6+1 vs 2d10)` parse into an immutable [`DiceExpression`],
//! which evaluates against either a synchronous [`DieRoller`] or an
//! asynchronous [`ValueProvider`] (for example a physics-based dice
//! renderer) into a fully detailed [`RollResult`]. [`annotate`] then
//! derives UI-agnostic highlight events from a result.
//!
//! ```
//! let expr = anvil_dice::parse("4d6dl1 + 2");
//! let result = anvil_dice::roll(&expr)?;
//! println!("{} = {}", expr.describe(), result.total);
//! # Ok::<(), anvil_dice::RollError>(())
//! ```

mod common;
mod expr;
mod highlight;
mod roll;

pub use common::{Comparator, Int, NonEmpty, SelectionMode, Sign, UInt};
pub use expr::{
    parse, parse_strict, ChallengeConfig, ChallengeTerm, ConstantTerm, DegradeRule, DiceExpression,
    DiceTerm, ExplodeRule, ParseError, ParseWarning, PercentileDice, PoolRule, SelectionRule, Term,
};
pub use highlight::{annotate, challenge_results, CritKind, RollHighlight};
pub use roll::{
    roll, roll_percentile, roll_with, roll_with_provider, ChallengeOutcome, ChallengeRoll,
    ConstantRoll, CustomDie, DegradeOutcome, DiceRequest, DiceRoll, DieRoller, ProviderError,
    RollError, RollResult, SingleDie, TermRoll, ValueProvider,
};
