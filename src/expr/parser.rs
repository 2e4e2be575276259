use crate::common::{Comparator, Int, Sign, UInt};
use crate::expr::ast::{
    ChallengeConfig, ChallengeTerm, ConstantTerm, DegradeRule, DiceExpression, DiceTerm,
    ExplodeRule, ParseWarning, PercentileDice, PoolRule, SelectionRule, Term,
};
use crate::expr::lexer::{self, PercentileCode, TokenKind};
use log::debug;
use thiserror::Error;

const UNRECOGNIZED: &str = "Unrecognized dice/number fragment";

/// Strict-mode parse failure. Carries the fragment that failed alongside
/// the full notation it came from.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("unrecognized fragment {fragment:?} in notation {notation:?}")]
pub struct ParseError {
    pub fragment: String,
    pub notation: String,
}

/// Parse a notation string. Never fails: fragments that cannot be read are
/// recorded as warnings and contribute no term.
pub fn parse(notation: &str) -> DiceExpression {
    let trimmed = notation.trim();
    if trimmed.is_empty() {
        return DiceExpression::new(String::new(), Vec::new(), Vec::new());
    }

    let mut terms = Vec::new();
    let mut warnings = Vec::new();
    for fragment in fragment_list(trimmed) {
        match parse_fragment(&fragment) {
            Some(term) => terms.push(term),
            None => {
                debug!("unrecognized fragment {:?} in {:?}", fragment, notation);
                warnings.push(ParseWarning {
                    fragment,
                    reason: UNRECOGNIZED.to_string(),
                });
            }
        }
    }
    DiceExpression::new(notation.to_string(), terms, warnings)
}

/// Like [`parse`], but any unrecognized fragment is a hard error. Meant
/// for callers that validate input fields.
pub fn parse_strict(notation: &str) -> Result<DiceExpression, ParseError> {
    let expr = parse(notation);
    match expr.warnings().first() {
        Some(warning) => Err(ParseError {
            fragment: warning.fragment.clone(),
            notation: notation.to_string(),
        }),
        None => Ok(expr),
    }
}

/// Split a notation into sign-prefixed fragments. Whitespace is stripped
/// first; `+`/`-` only split at paren depth 0, so
/// `challenge(d6+1 vs 2d10)` stays one fragment.
fn fragment_list(notation: &str) -> Vec<String> {
    let stripped: String = notation.chars().filter(|c| !c.is_whitespace()).collect();
    let mut fragments = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in stripped.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            '+' | '-' if depth == 0 && !current.is_empty() => {
                fragments.push(std::mem::replace(&mut current, c.to_string()));
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        fragments.push(current);
    }
    fragments
        .into_iter()
        .map(|frag| {
            if frag.starts_with('+') || frag.starts_with('-') {
                frag
            } else {
                format!("+{}", frag)
            }
        })
        .collect()
}

fn parse_fragment(fragment: &str) -> Option<Term> {
    let sign = if fragment.starts_with('-') {
        Sign::Neg
    } else {
        Sign::Pos
    };
    let tokens = lexer::tokenize(&fragment[1..]);
    try_challenge(&tokens, sign, fragment)
        .or_else(|| try_dice(&tokens, sign, fragment))
        .or_else(|| try_constant(&tokens, sign, fragment))
}

fn try_challenge(tokens: &[TokenKind], sign: Sign, fragment: &str) -> Option<Term> {
    let config = match tokens {
        [TokenKind::Challenge] => ChallengeConfig::default(),
        [TokenKind::Challenge, TokenKind::LeftParen, inner @ .., TokenKind::RightParen] => {
            parse_challenge_config(inner)
        }
        _ => return None,
    };
    Some(Term::Challenge(ChallengeTerm {
        config,
        sign,
        source: fragment.to_string(),
    }))
}

// A config that fails to parse silently keeps the 1d6-vs-2d10 defaults;
// each side of the `vs` falls back independently.
fn parse_challenge_config(inner: &[TokenKind]) -> ChallengeConfig {
    let mut config = ChallengeConfig::default();
    let (action, challenge) = match inner.iter().position(|t| *t == TokenKind::Vs) {
        Some(at) => (&inner[..at], &inner[at + 1..]),
        None => (inner, &inner[..0]),
    };
    if let Some((_, sides, modifier)) = parse_die_spec(action, false) {
        config.action_sides = sides;
        config.action_modifier = modifier;
    }
    if let Some((count, sides, modifier)) = parse_die_spec(challenge, true) {
        config.challenge_count = count;
        config.challenge_sides = sides;
        config.challenge_modifier = modifier;
    }
    config
}

/// `dN[±M]` (action side) or `[count]dN[±M]` (challenge side). The whole
/// slice must be consumed.
fn parse_die_spec(tokens: &[TokenKind], allow_count: bool) -> Option<(UInt, UInt, Int)> {
    let mut iter = tokens.iter();
    let lit = match iter.next()? {
        TokenKind::Dice(lit) => *lit,
        _ => return None,
    };
    if !allow_count && !lit.is_countless() {
        return None;
    }
    let modifier = match iter.next() {
        None => 0,
        Some(TokenKind::Plus) => match iter.next()? {
            TokenKind::Integer(n) => *n as Int,
            _ => return None,
        },
        Some(TokenKind::Minus) => match iter.next()? {
            TokenKind::Integer(n) => -(*n as Int),
            _ => return None,
        },
        Some(_) => return None,
    };
    if iter.next().is_some() {
        return None;
    }
    Some((lit.count(), lit.sides, modifier))
}

fn try_dice(tokens: &[TokenKind], sign: Sign, fragment: &str) -> Option<Term> {
    let mut cur = Cursor::new(tokens);
    let (count, sides, percentile, default_explode) = match cur.next()? {
        TokenKind::Dice(lit) => (lit.count(), lit.sides, None, lit.sides),
        TokenKind::Percentile(lit) => {
            let component_sides = match lit.code {
                // Standard percentile is a plain d100 term; the evaluator
                // rolls it as tens + ones.
                PercentileCode::Standard => None,
                PercentileCode::Digits(tens, ones) => Some((tens, ones)),
                PercentileCode::Uniform(n) => Some((n, n)),
            };
            match component_sides {
                None => (lit.count(), 100, None, 10),
                Some((tens, ones)) => {
                    let sides = tens * 10 + ones;
                    let descriptor = PercentileDice {
                        tens_sides: tens,
                        ones_sides: ones,
                        raw: lit.code.raw(),
                    };
                    // Combined values bottom out at 11, so a threshold of
                    // 10 would explode on every roll. The effective sides
                    // are the only value that can settle.
                    (lit.count(), sides, Some(descriptor), sides)
                }
            }
        }
        _ => return None,
    };

    // Modifier suffixes apply in a fixed order; anything left over
    // invalidates the whole fragment.
    let selection = parse_selection(&mut cur);
    let pool = parse_pool(&mut cur);
    let explode = parse_explode(&mut cur, default_explode);
    let degrade = parse_degrade(&mut cur);
    if !cur.at_end() {
        return None;
    }

    Some(Term::Dice(DiceTerm {
        count,
        sides,
        percentile,
        selection,
        pool,
        explode,
        degrade,
        sign,
        source: fragment.to_string(),
    }))
}

fn try_constant(tokens: &[TokenKind], sign: Sign, fragment: &str) -> Option<Term> {
    match tokens {
        [TokenKind::Integer(value)] => Some(Term::Constant(ConstantTerm {
            value: *value as Int,
            sign,
            source: fragment.to_string(),
        })),
        _ => None,
    }
}

fn parse_selection(cur: &mut Cursor<'_>) -> Option<SelectionRule> {
    match cur.peek() {
        Some(TokenKind::Selection(lit)) => {
            let lit = *lit;
            cur.next();
            Some(SelectionRule {
                mode: lit.mode,
                count: lit.count,
            })
        }
        _ => None,
    }
}

fn parse_pool(cur: &mut Cursor<'_>) -> Option<PoolRule> {
    let mark = cur.mark();
    let comparator = take_comparator(cur)?;
    let threshold = match take_positive_int(cur) {
        Some(n) => n,
        None => {
            cur.rewind(mark);
            return None;
        }
    };
    let mut target = None;
    if matches!(cur.peek(), Some(TokenKind::Hash)) {
        let hash_mark = cur.mark();
        cur.next();
        match take_positive_int(cur) {
            Some(n) => target = Some(n),
            // Leave the `#` unconsumed; the trailing check rejects the
            // fragment.
            None => cur.rewind(hash_mark),
        }
    }
    Some(PoolRule {
        comparator,
        threshold,
        target,
    })
}

fn parse_explode(cur: &mut Cursor<'_>, default: UInt) -> Option<ExplodeRule> {
    if !matches!(cur.peek(), Some(TokenKind::Bang)) {
        return None;
    }
    // `!` directly followed by a comparator is a degrade marker.
    if cur.peek_at(1).map_or(false, |t| comparator_of(t).is_some()) {
        return None;
    }
    let mark = cur.mark();
    cur.next();
    let threshold = match cur.peek() {
        Some(TokenKind::Integer(n)) => {
            let n = *n;
            cur.next();
            n
        }
        _ => default,
    };
    if threshold == 0 {
        cur.rewind(mark);
        return None;
    }
    Some(ExplodeRule { threshold })
}

fn parse_degrade(cur: &mut Cursor<'_>) -> Option<DegradeRule> {
    let mark = cur.mark();
    if !matches!(cur.peek(), Some(TokenKind::Bang)) {
        return None;
    }
    cur.next();
    let comparator = match take_comparator(cur) {
        Some(c) => c,
        None => {
            cur.rewind(mark);
            return None;
        }
    };
    let threshold = match take_positive_int(cur) {
        Some(n) => n,
        None => {
            cur.rewind(mark);
            return None;
        }
    };
    let mut step = None;
    if matches!(cur.peek(), Some(TokenKind::Colon)) {
        let colon_mark = cur.mark();
        cur.next();
        match cur.peek() {
            Some(TokenKind::Integer(n)) => {
                let n = *n;
                cur.next();
                // `:0` falls back to the default step of 1.
                if n > 0 {
                    step = Some(n);
                }
            }
            _ => cur.rewind(colon_mark),
        }
    }
    Some(DegradeRule {
        comparator,
        threshold,
        step,
    })
}

fn take_comparator(cur: &mut Cursor<'_>) -> Option<Comparator> {
    let comparator = comparator_of(cur.peek()?)?;
    cur.next();
    Some(comparator)
}

fn take_positive_int(cur: &mut Cursor<'_>) -> Option<UInt> {
    match cur.peek() {
        Some(TokenKind::Integer(n)) if *n > 0 => {
            let n = *n;
            cur.next();
            Some(n)
        }
        _ => None,
    }
}

fn comparator_of(token: &TokenKind) -> Option<Comparator> {
    match token {
        TokenKind::Greater => Some(Comparator::Greater),
        TokenKind::GreaterEq => Some(Comparator::GreaterEq),
        TokenKind::Less => Some(Comparator::Less),
        TokenKind::LessEq => Some(Comparator::LessEq),
        TokenKind::Equal => Some(Comparator::Equal),
        _ => None,
    }
}

/// Backtracking view over a fragment's tokens. A failed modifier attempt
/// rewinds to its mark so the next grammar sees the same position.
struct Cursor<'t> {
    tokens: &'t [TokenKind],
    pos: usize,
}

impl<'t> Cursor<'t> {
    fn new(tokens: &'t [TokenKind]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn next(&mut self) -> Option<&'t TokenKind> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn peek(&self) -> Option<&'t TokenKind> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&'t TokenKind> {
        self.tokens.get(self.pos + offset)
    }

    fn at_end(&self) -> bool {
        self.pos == self.tokens.len()
    }

    fn mark(&self) -> usize {
        self.pos
    }

    fn rewind(&mut self, mark: usize) {
        self.pos = mark;
    }
}
