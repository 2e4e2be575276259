use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

pub type Int = i32;
pub type UInt = u32;

pub type NonEmpty<T> = vec1::Vec1<T>;
pub use vec1::vec1;

/// Whether a term adds to or subtracts from the roll total.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Sign {
    #[serde(rename = "+")]
    Pos,
    #[serde(rename = "-")]
    Neg,
}

impl Sign {
    pub fn apply(self, value: Int) -> Int {
        match self {
            Self::Pos => value,
            Self::Neg => -value,
        }
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Self::Pos => '+',
            Self::Neg => '-',
        };
        f.write_char(c)
    }
}

/// Comparator used by pool and degrade rules.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterEq,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessEq,
    #[serde(rename = "=")]
    Equal,
}

impl Comparator {
    pub fn matches(self, value: UInt, threshold: UInt) -> bool {
        match self {
            Self::Greater => value > threshold,
            Self::GreaterEq => value >= threshold,
            Self::Less => value < threshold,
            Self::LessEq => value <= threshold,
            Self::Equal => value == threshold,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Greater => ">",
            Self::GreaterEq => ">=",
            Self::Less => "<",
            Self::LessEq => "<=",
            Self::Equal => "=",
        };
        f.write_str(s)
    }
}

/// Keep/drop modifier modes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionMode {
    KeepHighest,
    KeepLowest,
    DropHighest,
    DropLowest,
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::KeepHighest => "kh",
            Self::KeepLowest => "kl",
            Self::DropHighest => "dh",
            Self::DropLowest => "dl",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparator_matches() {
        assert!(Comparator::GreaterEq.matches(6, 6));
        assert!(Comparator::Greater.matches(7, 6));
        assert!(!Comparator::Greater.matches(6, 6));
        assert!(Comparator::LessEq.matches(2, 2));
        assert!(Comparator::Less.matches(1, 2));
        assert!(Comparator::Equal.matches(4, 4));
        assert!(!Comparator::Equal.matches(5, 4));
    }

    #[test]
    fn sign_apply() {
        assert_eq!(Sign::Pos.apply(3), 3);
        assert_eq!(Sign::Neg.apply(3), -3);
    }
}
