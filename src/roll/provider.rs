use crate::common::{NonEmpty, UInt};
use crate::expr::{ChallengeTerm, DiceExpression, DiceTerm, Term};
use crate::roll::error::{ProviderError, RollError};
use crate::roll::eval;
use crate::roll::result::{ChallengeRoll, ConstantRoll, DiceRoll, RollResult, TermRoll};
use crate::roll::roller::DieRoller;
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;

/// One batch of same-sided dice in a composite request.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DiceRequest {
    pub count: UInt,
    pub sides: UInt,
}

/// A die a provider may render distinctly, such as the tens and ones dice
/// of a percentile pair.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CustomDie {
    pub sides: UInt,
    /// Renderer-owned appearance hint. The evaluator never sets or reads
    /// it.
    pub theme_color: Option<String>,
}

/// An external source of raw die values, typically a physics-based dice
/// renderer.
///
/// Only [`roll_dice`](Self::roll_dice) is mandatory; the capability
/// methods change how values are physically sourced, never what they
/// mean.
#[async_trait]
pub trait ValueProvider {
    async fn roll_dice(&mut self, count: UInt, sides: UInt) -> Result<Vec<UInt>, ProviderError>;

    /// Gates composite pre-batching in the evaluator.
    fn supports_composite(&self) -> bool {
        false
    }

    /// Roll several requests in one physical throw. Falls back to
    /// sequential [`roll_dice`](Self::roll_dice) calls.
    async fn roll_composite(
        &mut self,
        requests: &[DiceRequest],
    ) -> Result<Vec<Vec<UInt>>, ProviderError> {
        let mut chunks = Vec::with_capacity(requests.len());
        for request in requests {
            chunks.push(self.roll_dice(request.count, request.sides).await?);
        }
        Ok(chunks)
    }

    /// Roll visually distinct dice in one throw. Falls back to one
    /// [`roll_dice`](Self::roll_dice) call per die.
    async fn roll_custom(&mut self, dice: &[CustomDie]) -> Result<Vec<UInt>, ProviderError> {
        let mut values = Vec::with_capacity(dice.len());
        for die in dice {
            let rolled = self.roll_dice(1, die.sides).await?;
            match rolled.first() {
                Some(&value) => values.push(value),
                None => values.push(rand::thread_rng().roll_die(die.sides)),
            }
        }
        Ok(values)
    }
}

/// Evaluate an expression against an external value provider. Semantics
/// match [`roll_with`](crate::roll_with); only the value source differs.
pub async fn roll_with_provider<'a, P: ValueProvider + Send + ?Sized>(
    expression: &'a DiceExpression,
    provider: &mut P,
) -> Result<RollResult<'a>, RollError> {
    let mut cached = if provider.supports_composite() {
        prepare_composite(expression, provider).await?
    } else {
        HashMap::new()
    };

    let mut total = 0;
    let mut successes: Option<UInt> = None;
    let mut terms = Vec::with_capacity(expression.terms().len());
    for (index, term) in expression.terms().iter().enumerate() {
        let term_roll = match term {
            Term::Constant(constant) => {
                let signed = constant.sign.apply(constant.value);
                total += signed;
                TermRoll::Constant(ConstantRoll { value: signed })
            }
            Term::Challenge(challenge) => {
                let roll = roll_challenge_term(challenge, provider).await?;
                total += roll.signed_action_score;
                TermRoll::Challenge(roll)
            }
            Term::Dice(dice) => {
                let roll = roll_dice_term(dice, cached.remove(&index), provider).await?;
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

/// Batch all plain dice terms into one composite request up front, keyed
/// back to their term index. Exploding, percentile, and d100 terms need
/// dynamic or dual-channel value counts, so they keep dedicated calls.
async fn prepare_composite<P: ValueProvider + Send + ?Sized>(
    expression: &DiceExpression,
    provider: &mut P,
) -> Result<HashMap<usize, Vec<UInt>>, ProviderError> {
    let mut requests = Vec::new();
    let mut mapping = Vec::new();
    for (index, term) in expression.terms().iter().enumerate() {
        if let Term::Dice(dice) = term {
            if dice.explode.is_none() && !dice.is_percentile() {
                mapping.push((index, requests.len()));
                requests.push(DiceRequest {
                    count: dice.count,
                    sides: dice.sides,
                });
            }
        }
    }
    if requests.is_empty() {
        return Ok(HashMap::new());
    }

    debug!("composite pre-batch of {} dice terms", requests.len());
    let chunks = provider.roll_composite(&requests).await?;
    let mut cached = HashMap::new();
    for (term_index, chunk) in mapping {
        cached.insert(term_index, chunks.get(chunk).cloned().unwrap_or_default());
    }
    Ok(cached)
}

async fn roll_dice_term<'a, P: ValueProvider + Send + ?Sized>(
    term: &'a DiceTerm,
    cached: Option<Vec<UInt>>,
    provider: &mut P,
) -> Result<DiceRoll<'a>, RollError> {
    let initial = match cached {
        Some(mut values) => {
            backfill(&mut values, term.count, term.sides);
            values
        }
        None => acquire_term_values(term, term.count, provider).await?,
    };
    let (values, explosions) = match &term.explode {
        Some(rule) => {
            let mut batches = NonEmpty::new(initial);
            while let Some(count) = eval::next_explosion_count(&batches, rule.threshold)? {
                batches.push(acquire_term_values(term, count, provider).await?);
            }
            (eval::flatten_batches(&batches), Some(batches))
        }
        None => (initial, None),
    };
    Ok(eval::evaluate_dice_term(term, values, explosions))
}

/// Fetch `count` values for one dice term. Percentile terms pull their
/// two channels separately; every path backfills short responses.
async fn acquire_term_values<P: ValueProvider + Send + ?Sized>(
    term: &DiceTerm,
    count: UInt,
    provider: &mut P,
) -> Result<Vec<UInt>, RollError> {
    match &term.percentile {
        Some(p) => {
            // Tens/ones pairs as visually distinct dice, so a physical
            // provider can render each pair together.
            let mut request = Vec::with_capacity(count as usize * 2);
            for _ in 0..count {
                request.push(CustomDie {
                    sides: p.tens_sides,
                    theme_color: None,
                });
                request.push(CustomDie {
                    sides: p.ones_sides,
                    theme_color: None,
                });
            }
            let raw = provider.roll_custom(&request).await?;
            let mut rng = rand::thread_rng();
            Ok((0..count as usize)
                .map(|i| {
                    let tens = raw
                        .get(i * 2)
                        .copied()
                        .unwrap_or_else(|| rng.roll_die(p.tens_sides));
                    let ones = raw
                        .get(i * 2 + 1)
                        .copied()
                        .unwrap_or_else(|| rng.roll_die(p.ones_sides));
                    tens * 10 + ones
                })
                .collect())
        }
        None if term.sides == 100 => {
            let tens = provider.roll_dice(count, 100).await?;
            let ones = provider.roll_dice(count, 10).await?;
            let mut rng = rand::thread_rng();
            Ok((0..count as usize)
                .map(|i| {
                    let tens = tens.get(i).copied().unwrap_or_else(|| rng.roll_die(100));
                    let ones = ones.get(i).copied().unwrap_or_else(|| rng.roll_die(10));
                    eval::percentile_value(tens, ones)
                })
                .collect())
        }
        None => {
            let mut values = provider.roll_dice(count, term.sides).await?;
            backfill(&mut values, count, term.sides);
            Ok(values)
        }
    }
}

async fn roll_challenge_term<'a, P: ValueProvider + Send + ?Sized>(
    term: &'a ChallengeTerm,
    provider: &mut P,
) -> Result<ChallengeRoll<'a>, RollError> {
    let config = &term.config;
    let (action_values, mut challenge_dice) = if provider.supports_composite() {
        let mut chunks = provider
            .roll_composite(&[
                DiceRequest {
                    count: 1,
                    sides: config.action_sides,
                },
                DiceRequest {
                    count: config.challenge_count,
                    sides: config.challenge_sides,
                },
            ])
            .await?
            .into_iter();
        let action = chunks.next().unwrap_or_default();
        let challenge = chunks.next().unwrap_or_default();
        (action, challenge)
    } else {
        let action = provider.roll_dice(1, config.action_sides).await?;
        let challenge = provider
            .roll_dice(config.challenge_count, config.challenge_sides)
            .await?;
        (action, challenge)
    };
    let action_die = action_values
        .first()
        .copied()
        .unwrap_or_else(|| rand::thread_rng().roll_die(config.action_sides));
    backfill(&mut challenge_dice, config.challenge_count, config.challenge_sides);
    Ok(eval::evaluate_challenge_term(term, action_die, challenge_dice))
}

/// Pad a short provider response with uniformly-random in-range values.
/// Partial external failures degrade silently so a roll always completes.
fn backfill(values: &mut Vec<UInt>, count: UInt, sides: UInt) {
    let count = count as usize;
    if values.len() < count {
        debug!(
            "provider returned {} of {} values; backfilling",
            values.len(),
            count
        );
        let mut rng = rand::thread_rng();
        while values.len() < count {
            values.push(rng.roll_die(sides));
        }
    }
    values.truncate(count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct ScriptedProvider {
        responses: VecDeque<Vec<UInt>>,
        composite: bool,
        dice_calls: Vec<(UInt, UInt)>,
        composite_calls: Vec<Vec<DiceRequest>>,
        custom_calls: Vec<Vec<UInt>>,
    }

    impl ScriptedProvider {
        fn new(responses: impl IntoIterator<Item = Vec<UInt>>) -> Self {
            Self {
                responses: responses.into_iter().collect(),
                ..Self::default()
            }
        }

        fn with_composite(mut self) -> Self {
            self.composite = true;
            self
        }

        fn pop(&mut self) -> Vec<UInt> {
            self.responses.pop_front().unwrap_or_default()
        }
    }

    #[async_trait]
    impl ValueProvider for ScriptedProvider {
        async fn roll_dice(
            &mut self,
            count: UInt,
            sides: UInt,
        ) -> Result<Vec<UInt>, ProviderError> {
            self.dice_calls.push((count, sides));
            Ok(self.pop())
        }

        fn supports_composite(&self) -> bool {
            self.composite
        }

        async fn roll_composite(
            &mut self,
            requests: &[DiceRequest],
        ) -> Result<Vec<Vec<UInt>>, ProviderError> {
            self.composite_calls.push(requests.to_vec());
            Ok(requests.iter().map(|_| self.pop()).collect())
        }

        async fn roll_custom(&mut self, dice: &[CustomDie]) -> Result<Vec<UInt>, ProviderError> {
            self.custom_calls.push(dice.iter().map(|d| d.sides).collect());
            Ok(self.pop())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl ValueProvider for FailingProvider {
        async fn roll_dice(
            &mut self,
            _count: UInt,
            _sides: UInt,
        ) -> Result<Vec<UInt>, ProviderError> {
            Err(ProviderError::new("renderer offline"))
        }
    }

    #[tokio::test]
    async fn composite_batches_plain_terms() {
        let expr = parse("2d6 + 1d8 + 3");
        let mut provider = ScriptedProvider::new([vec![2, 5], vec![7]]).with_composite();
        let result = roll_with_provider(&expr, &mut provider).await.unwrap();
        assert_eq!(result.total, 2 + 5 + 7 + 3);
        assert_eq!(
            provider.composite_calls,
            vec![vec![
                DiceRequest { count: 2, sides: 6 },
                DiceRequest { count: 1, sides: 8 },
            ]]
        );
        assert!(provider.dice_calls.is_empty());
    }

    #[tokio::test]
    async fn exploding_terms_skip_the_composite_batch() {
        let expr = parse("1d6! + 2d4");
        let mut provider =
            ScriptedProvider::new([vec![1, 2], vec![6], vec![4]]).with_composite();
        let result = roll_with_provider(&expr, &mut provider).await.unwrap();
        // The composite call covers only 2d4; the exploding term rolls
        // through dedicated calls.
        assert_eq!(
            provider.composite_calls,
            vec![vec![DiceRequest { count: 2, sides: 4 }]]
        );
        assert_eq!(provider.dice_calls, vec![(1, 6), (1, 6)]);
        assert_eq!(result.total, 6 + 4 + 1 + 2);
        match &result.terms[0] {
            TermRoll::Dice(roll) => assert_eq!(roll.explosion_count(), 1),
            other => panic!("unexpected term roll {:?}", other),
        }
    }

    #[tokio::test]
    async fn custom_percentile_rolls_component_pairs() {
        let expr = parse("d%66");
        let mut provider = ScriptedProvider::new([vec![4, 3]]);
        let result = roll_with_provider(&expr, &mut provider).await.unwrap();
        assert_eq!(provider.custom_calls, vec![vec![6, 6]]);
        assert_eq!(result.total, 43);
    }

    #[tokio::test]
    async fn standard_percentile_uses_dual_channels() {
        let expr = parse("d100");
        let mut provider = ScriptedProvider::new([vec![47], vec![3]]);
        let result = roll_with_provider(&expr, &mut provider).await.unwrap();
        assert_eq!(provider.dice_calls, vec![(1, 100), (1, 10)]);
        assert_eq!(result.total, 43);
    }

    #[tokio::test]
    async fn short_responses_are_backfilled_in_range() {
        let expr = parse("3d6");
        let mut provider = ScriptedProvider::new([vec![5]]);
        let result = roll_with_provider(&expr, &mut provider).await.unwrap();
        match &result.terms[0] {
            TermRoll::Dice(roll) => {
                assert_eq!(roll.dice.len(), 3);
                assert_eq!(roll.dice[0].value, 5);
                assert!(roll.dice.iter().all(|die| (1..=6).contains(&die.value)));
            }
            other => panic!("unexpected term roll {:?}", other),
        }
    }

    #[tokio::test]
    async fn challenge_uses_a_composite_pair() {
        let expr = parse("challenge");
        let mut provider = ScriptedProvider::new([vec![5], vec![3, 3]]).with_composite();
        let result = roll_with_provider(&expr, &mut provider).await.unwrap();
        assert_eq!(
            provider.composite_calls,
            vec![vec![
                DiceRequest { count: 1, sides: 6 },
                DiceRequest { count: 2, sides: 10 },
            ]]
        );
        match &result.terms[0] {
            TermRoll::Challenge(roll) => {
                assert_eq!(roll.outcome, crate::roll::result::ChallengeOutcome::StrongHit);
                assert!(roll.boon);
            }
            other => panic!("unexpected term roll {:?}", other),
        }
        assert_eq!(result.total, 5);
    }

    #[tokio::test]
    async fn provider_rolls_run_on_a_spawned_task() {
        // tokio::spawn requires the whole evaluation future to be Send.
        let handle = tokio::spawn(async {
            let expr = parse("2d6");
            let mut provider = ScriptedProvider::new([vec![2, 5]]);
            let result = roll_with_provider(&expr, &mut provider).await.unwrap();
            result.total
        });
        assert_eq!(handle.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn provider_errors_propagate() {
        let expr = parse("2d6");
        let mut provider = FailingProvider;
        let err = roll_with_provider(&expr, &mut provider).await.unwrap_err();
        assert!(matches!(err, RollError::Provider(_)));
    }
}
