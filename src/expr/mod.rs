//! Notation parsing: fragmenting, lexing, and the term model.

mod ast;
mod lexer;
mod parser;

pub use ast::{
    ChallengeConfig, ChallengeTerm, ConstantTerm, DegradeRule, DiceExpression, DiceTerm,
    ExplodeRule, ParseWarning, PercentileDice, PoolRule, SelectionRule, Term,
};
pub use parser::{parse, parse_strict, ParseError};
