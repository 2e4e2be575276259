use crate::common::{Int, SelectionMode, UInt};
use logos::Logos;

/// A `[count]dN` literal. `count` is `None` when the notation left it
/// implicit (`d20` rather than `1d20`).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DiceLit {
    pub count: Option<UInt>,
    pub sides: UInt,
}

impl DiceLit {
    pub fn count(&self) -> UInt {
        self.count.unwrap_or(1)
    }

    /// True when the literal can stand as a challenge action spec
    /// (`d6`, never `1d6`).
    pub fn is_countless(&self) -> bool {
        self.count.is_none()
    }
}

/// A `[count]d%NN` / `[count]dpNN` literal.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PercentileLit {
    pub count: Option<UInt>,
    pub code: PercentileCode,
}

impl PercentileLit {
    pub fn count(&self) -> UInt {
        self.count.unwrap_or(1)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PercentileCode {
    /// `100`: a plain d100, rolled as tens + ones at evaluation time.
    Standard,
    /// A two-digit code such as `66`: per-digit tens/ones sides.
    Digits(UInt, UInt),
    /// Any other code `N`: both component dice use N sides.
    Uniform(UInt),
}

impl PercentileCode {
    pub fn raw(&self) -> String {
        match self {
            Self::Standard => "100".to_string(),
            Self::Digits(tens, ones) => format!("{}{}", tens, ones),
            Self::Uniform(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SelectionLit {
    pub mode: SelectionMode,
    pub count: UInt,
}

#[derive(Logos, Debug, Copy, Clone, PartialEq)]
pub enum TokenKind {
    #[regex(r"[0-9]*[dD][0-9]+", |lex| parse_dice(lex.slice()))]
    Dice(DiceLit),
    #[regex(r"[0-9]*[dD][%pP][0-9]+", |lex| parse_percentile(lex.slice()))]
    Percentile(PercentileLit),
    #[regex(r"[kK][hHlL][0-9]+", |lex| parse_selection(lex.slice()))]
    #[regex(r"[dD][hHlL][0-9]+", |lex| parse_selection(lex.slice()))]
    Selection(SelectionLit),
    #[regex(r"[0-9]+", |lex| parse_uint(lex.slice()))]
    Integer(UInt),

    #[token("challenge", ignore(ascii_case))]
    Challenge,
    #[token("vs", ignore(ascii_case))]
    Vs,

    #[token(">=")]
    GreaterEq,
    #[token("<=")]
    LessEq,
    #[token(">")]
    Greater,
    #[token("<")]
    Less,
    #[token("=")]
    Equal,

    #[token("!")]
    Bang,
    #[token("#")]
    Hash,
    #[token(":")]
    Colon,
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,

    #[error]
    Error,
}

/// Lex a fragment body into its token list. Fragments are short, so the
/// parser backtracks over a collected list rather than a streaming lexer.
pub fn tokenize(body: &str) -> Vec<TokenKind> {
    TokenKind::lexer(body).collect()
}

// Values that cannot be negated or summed as `Int` are rejected at the
// token level, so an oversized literal folds into a warning like any
// other bad fragment.
fn parse_uint(s: &str) -> Option<UInt> {
    s.parse().ok().filter(|&n: &UInt| n <= Int::MAX as UInt)
}

// Zero counts and zero sides invalidate the literal; the resulting error
// token rejects the whole fragment.
fn parse_dice(s: &str) -> Option<DiceLit> {
    let (count, sides) = split_die(s)?;
    let count = match count {
        "" => None,
        c => Some(parse_uint(c).filter(|&c| c > 0)?),
    };
    let sides = parse_uint(sides).filter(|&s| s > 0)?;
    Some(DiceLit { count, sides })
}

fn parse_percentile(s: &str) -> Option<PercentileLit> {
    let (count, rest) = split_die(s)?;
    let count = match count {
        "" => None,
        c => Some(parse_uint(c).filter(|&c| c > 0)?),
    };
    // `rest` starts with the %, p, or P marker.
    let code = &rest[1..];
    let code = if code == "100" {
        PercentileCode::Standard
    } else if code.len() == 2 {
        let mut digits = code.chars().map(|c| c.to_digit(10));
        let tens = digits.next().flatten().filter(|&d| d > 0)?;
        let ones = digits.next().flatten().filter(|&d| d > 0)?;
        PercentileCode::Digits(tens, ones)
    } else {
        let n = parse_uint(code).filter(|&n| n > 0)?;
        PercentileCode::Uniform(n)
    };
    Some(PercentileLit { count, code })
}

fn parse_selection(s: &str) -> Option<SelectionLit> {
    let tag = &s[..2];
    let mode = match tag.to_ascii_lowercase().as_str() {
        "kh" => SelectionMode::KeepHighest,
        "kl" => SelectionMode::KeepLowest,
        "dh" => SelectionMode::DropHighest,
        "dl" => SelectionMode::DropLowest,
        _ => return None,
    };
    let count = parse_uint(&s[2..]).filter(|&c| c > 0)?;
    Some(SelectionLit { mode, count })
}

fn split_die(s: &str) -> Option<(&str, &str)> {
    let at = s.find(|c| c == 'd' || c == 'D')?;
    Some((&s[..at], &s[at + 1..]))
}
