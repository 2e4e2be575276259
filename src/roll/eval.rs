use crate::common::{Int, NonEmpty, SelectionMode, UInt};
use crate::expr::{ChallengeTerm, DiceTerm, SelectionRule};
use crate::roll::error::RollError;
use crate::roll::result::{ChallengeOutcome, ChallengeRoll, DegradeOutcome, DiceRoll, SingleDie};
use crate::roll::roller::DieRoller;
use log::debug;
use std::collections::HashSet;

/// Hard stop for exploding dice. A rule every roll satisfies (threshold 1)
/// would otherwise loop forever.
pub(crate) const MAX_EXPLOSION_BATCHES: usize = 100;

/// Roll and fully evaluate one dice term against a synchronous roller.
pub(crate) fn roll_dice_term<'a, R: DieRoller + ?Sized>(
    term: &'a DiceTerm,
    roller: &mut R,
) -> Result<DiceRoll<'a>, RollError> {
    let initial = roll_term_values(term, term.count, roller);
    let (values, explosions) = match &term.explode {
        Some(rule) => {
            let mut batches = NonEmpty::new(initial);
            while let Some(count) = next_explosion_count(&batches, rule.threshold)? {
                batches.push(roll_term_values(term, count, roller));
            }
            (flatten_batches(&batches), Some(batches))
        }
        None => (initial, None),
    };
    Ok(evaluate_dice_term(term, values, explosions))
}

/// Raw values for `count` dice of this term. Percentile terms roll their
/// two component dice per value.
pub(crate) fn roll_term_values<R: DieRoller + ?Sized>(
    term: &DiceTerm,
    count: UInt,
    roller: &mut R,
) -> Vec<UInt> {
    match &term.percentile {
        Some(p) => (0..count)
            .map(|_| {
                let tens = roller.roll_die(p.tens_sides);
                let ones = roller.roll_die(p.ones_sides);
                tens * 10 + ones
            })
            .collect(),
        None if term.sides == 100 => (0..count)
            .map(|_| {
                let tens = roller.roll_die(100);
                let ones = roller.roll_die(10);
                percentile_value(tens, ones)
            })
            .collect(),
        None => roller.roll_dice(count, term.sides),
    }
}

/// How many dice of the most recent batch explode, or `None` when the
/// chain has settled.
pub(crate) fn next_explosion_count(
    batches: &NonEmpty<Vec<UInt>>,
    threshold: UInt,
) -> Result<Option<UInt>, RollError> {
    let qualifying = batches.last().iter().filter(|&&v| v >= threshold).count();
    if qualifying == 0 {
        return Ok(None);
    }
    if batches.len() >= MAX_EXPLOSION_BATCHES {
        return Err(RollError::ExplosionOverflow);
    }
    Ok(Some(qualifying as UInt))
}

pub(crate) fn flatten_batches(batches: &NonEmpty<Vec<UInt>>) -> Vec<UInt> {
    batches.iter().flatten().copied().collect()
}

/// Shared term evaluation over an already-acquired value list: selection
/// marking, signed total over kept dice, pool counting, degrade trigger.
pub(crate) fn evaluate_dice_term<'a>(
    term: &'a DiceTerm,
    values: Vec<UInt>,
    explosions: Option<NonEmpty<Vec<UInt>>>,
) -> DiceRoll<'a> {
    let mut dice: Vec<SingleDie> = values
        .into_iter()
        .enumerate()
        .map(|(index, value)| SingleDie {
            index,
            value,
            kept: true,
            dropped: false,
        })
        .collect();
    apply_selection(term.selection.as_ref(), &mut dice);

    let total: Int = dice
        .iter()
        .filter(|die| !die.dropped)
        .map(|die| term.sign.apply(die.value as Int))
        .sum();

    // Pool successes count every die, dropped ones included.
    let (successes, met_target) = match &term.pool {
        Some(pool) => {
            let successes = dice
                .iter()
                .filter(|die| pool.comparator.matches(die.value, pool.threshold))
                .count() as UInt;
            (
                Some(successes),
                pool.target.map(|target| successes >= target),
            )
        }
        None => (None, None),
    };

    let degrade = term.degrade.as_ref().map(|rule| DegradeOutcome {
        triggered: dice
            .iter()
            .any(|die| rule.comparator.matches(die.value, rule.threshold)),
        step: rule.step.unwrap_or(1),
    });

    debug!("evaluated {:?} -> total {}", term.source, total);
    DiceRoll {
        term,
        dice,
        total,
        explosions,
        successes,
        met_target,
        degrade,
    }
}

fn apply_selection(selection: Option<&SelectionRule>, dice: &mut [SingleDie]) {
    let rule = match selection {
        Some(rule) => rule,
        None => return,
    };
    let target = (rule.count as usize).min(dice.len());
    if target == 0 {
        return;
    }

    let mut order: Vec<usize> = (0..dice.len()).collect();
    match rule.mode {
        SelectionMode::KeepHighest | SelectionMode::DropHighest => {
            order.sort_by(|&a, &b| dice[b].value.cmp(&dice[a].value));
        }
        SelectionMode::KeepLowest | SelectionMode::DropLowest => {
            order.sort_by(|&a, &b| dice[a].value.cmp(&dice[b].value));
        }
    }
    let selected: HashSet<usize> = order[..target].iter().copied().collect();
    let selected_are_kept = matches!(
        rule.mode,
        SelectionMode::KeepHighest | SelectionMode::KeepLowest
    );

    for die in dice.iter_mut() {
        let kept = selected.contains(&die.index) == selected_are_kept;
        die.kept = kept;
        die.dropped = !kept;
    }
}

pub(crate) fn evaluate_challenge_term<'a>(
    term: &'a ChallengeTerm,
    action_die: UInt,
    challenge_dice: Vec<UInt>,
) -> ChallengeRoll<'a> {
    let config = &term.config;
    let action_score = action_die as Int + config.action_modifier;
    let challenge_scores: Vec<Int> = challenge_dice
        .iter()
        .map(|&value| value as Int + config.challenge_modifier)
        .collect();
    let signed_action_score = term.sign.apply(action_score);

    let outcome = challenge_outcome(action_score, &challenge_scores);
    let doubles = is_doubles(&challenge_scores);
    let boon = outcome == ChallengeOutcome::StrongHit && doubles;
    let complication = outcome == ChallengeOutcome::Miss && doubles;

    debug!(
        "challenge {} vs {:?} -> {}",
        action_score, challenge_scores, outcome
    );
    ChallengeRoll {
        term,
        action_die,
        action_modifier: config.action_modifier,
        action_score,
        signed_action_score,
        challenge_dice,
        challenge_modifier: config.challenge_modifier,
        challenge_scores,
        outcome,
        boon,
        complication,
    }
}

fn challenge_outcome(action_score: Int, challenge_scores: &[Int]) -> ChallengeOutcome {
    if challenge_scores.len() < 2 {
        return ChallengeOutcome::Miss;
    }
    let beats = challenge_scores
        .iter()
        .filter(|&&score| action_score > score)
        .count();
    if beats == challenge_scores.len() {
        ChallengeOutcome::StrongHit
    } else if beats > 0 {
        ChallengeOutcome::WeakHit
    } else {
        ChallengeOutcome::Miss
    }
}

// Doubles are checked on the modified scores, and need at least two
// challenge dice.
fn is_doubles(scores: &[Int]) -> bool {
    scores.len() >= 2 && scores.windows(2).all(|pair| pair[0] == pair[1])
}

/// Combine a tens die (d100 faces) and a ones die (d10 faces) into a
/// 1..=100 result. There is no 0 on a percentile die; 00 + 0 is the
/// maximum, so any combined 0 maps to 100.
pub(crate) fn percentile_value(tens: UInt, ones: UInt) -> UInt {
    let sanitized_tens = if tens == 100 { 0 } else { tens % 100 };
    let tens_normalized = sanitized_tens / 10 * 10;
    let ones_normalized = if ones == 10 { 0 } else { ones % 10 };
    let total = tens_normalized + ones_normalized;
    if total == 0 {
        100
    } else {
        total
    }
}

/// One-shot d100 for oracle-table lookups, clamped to 1..=100. Reads the
/// tens and ones dice as digit indices (a tens face of 7 means 70).
pub fn roll_percentile<R: DieRoller + ?Sized>(roller: &mut R) -> UInt {
    let tens = normalize_tens_index(roller.roll_die(100));
    let ones = normalize_ones_index(roller.roll_die(10));
    let total = tens * 10 + ones;
    let total = if total == 0 { 100 } else { total };
    total.clamp(1, 100)
}

fn normalize_tens_index(value: UInt) -> UInt {
    if value == 100 {
        return 0;
    }
    if value % 10 == 0 && (10..=90).contains(&value) {
        return value / 10;
    }
    if (1..=9).contains(&value) {
        return value;
    }
    (value / 10).min(9)
}

fn normalize_ones_index(value: UInt) -> UInt {
    if value == 10 {
        0
    } else if (1..=9).contains(&value) {
        value
    } else {
        value % 10
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::vec1;
    use crate::expr::Term;
    use crate::parse;
    use crate::roll::roller::SeqRoller;

    fn only_dice_term(notation: &str) -> DiceTerm {
        match parse(notation).terms() {
            [Term::Dice(term)] => term.clone(),
            other => panic!("expected a dice term, got {:?}", other),
        }
    }

    fn kept_values(roll: &DiceRoll<'_>) -> Vec<UInt> {
        roll.dice
            .iter()
            .filter(|die| die.kept)
            .map(|die| die.value)
            .collect()
    }

    #[test]
    fn selection_marks_kept_and_dropped() {
        let term = only_dice_term("4d6dl1");
        let roll = evaluate_dice_term(&term, vec![3, 5, 1, 6], None);
        assert_eq!(kept_values(&roll), vec![3, 5, 6]);
        assert!(roll.dice[2].dropped);
        assert_eq!(roll.total, 14);
    }

    #[test]
    fn selection_keep_highest_breaks_ties_by_position() {
        let term = only_dice_term("3d6kh2");
        let roll = evaluate_dice_term(&term, vec![4, 4, 4], None);
        // Stable sort: the first two dice stay in the top positions.
        assert_eq!(kept_values(&roll), vec![4, 4]);
        assert!(roll.dice[2].dropped);
    }

    #[test]
    fn drop_modes_invert_the_selection() {
        let term = only_dice_term("4d6dh2");
        let roll = evaluate_dice_term(&term, vec![2, 6, 5, 3], None);
        assert_eq!(kept_values(&roll), vec![2, 3]);
        assert_eq!(roll.total, 5);
    }

    #[test]
    fn pool_counts_dropped_dice() {
        // Dropped dice still count toward pool successes.
        let term = only_dice_term("4d6kh1>=5");
        let roll = evaluate_dice_term(&term, vec![5, 6, 2, 5], None);
        assert_eq!(kept_values(&roll), vec![6]);
        assert_eq!(roll.successes, Some(3));
        assert_eq!(roll.met_target, None);
    }

    #[test]
    fn pool_target_is_met_exactly_at_the_target() {
        let term = only_dice_term("2d10>=8#2");
        let roll = evaluate_dice_term(&term, vec![8, 9], None);
        assert_eq!(roll.successes, Some(2));
        assert_eq!(roll.met_target, Some(true));

        let roll = evaluate_dice_term(&term, vec![8, 3], None);
        assert_eq!(roll.successes, Some(1));
        assert_eq!(roll.met_target, Some(false));
    }

    #[test]
    fn degrade_triggers_on_any_die() {
        let term = only_dice_term("3d8!<=2:2");
        let roll = evaluate_dice_term(&term, vec![7, 2, 5], None);
        assert_eq!(
            roll.degrade,
            Some(DegradeOutcome {
                triggered: true,
                step: 2
            })
        );

        let roll = evaluate_dice_term(&term, vec![7, 3, 5], None);
        assert_eq!(
            roll.degrade,
            Some(DegradeOutcome {
                triggered: false,
                step: 2
            })
        );
    }

    #[test]
    fn negative_sign_subtracts_kept_dice() {
        let term = match parse("-2d6").terms() {
            [Term::Dice(term)] => term.clone(),
            other => panic!("unexpected terms {:?}", other),
        };
        let roll = evaluate_dice_term(&term, vec![3, 4], None);
        assert_eq!(roll.total, -7);
    }

    #[test]
    fn explosion_chains_until_no_die_qualifies() {
        let term = only_dice_term("1d6!");
        let mut roller = SeqRoller::new([6, 6, 4]);
        let roll = roll_dice_term(&term, &mut roller).unwrap();
        assert_eq!(
            roll.dice.iter().map(|d| d.value).collect::<Vec<_>>(),
            vec![6, 6, 4]
        );
        assert_eq!(roll.explosion_count(), 2);
        assert_eq!(roll.explosions, Some(vec1![vec![6], vec![6], vec![4]]));
        assert_eq!(roll.total, 16);
    }

    #[test]
    fn explosion_selection_operates_on_the_flattened_list() {
        let term = only_dice_term("2d6kh2!");
        let mut roller = SeqRoller::new([6, 3, 2]);
        let roll = roll_dice_term(&term, &mut roller).unwrap();
        assert_eq!(kept_values(&roll), vec![6, 3]);
        assert_eq!(roll.total, 9);
    }

    #[test]
    fn runaway_explosion_is_capped() {
        let term = only_dice_term("1d6!1");
        let mut roller = rand::rngs::mock::StepRng::new(0, 0);
        assert_eq!(
            roll_dice_term(&term, &mut roller),
            Err(RollError::ExplosionOverflow)
        );
    }

    #[test]
    fn challenge_strong_hit_with_boon() {
        let term = match parse("challenge").terms() {
            [Term::Challenge(term)] => term.clone(),
            other => panic!("unexpected terms {:?}", other),
        };
        let roll = evaluate_challenge_term(&term, 5, vec![3, 3]);
        assert_eq!(roll.action_score, 5);
        assert_eq!(roll.outcome, ChallengeOutcome::StrongHit);
        assert!(roll.boon);
        assert!(!roll.complication);
    }

    #[test]
    fn challenge_outcomes() {
        assert_eq!(challenge_outcome(5, &[3, 4]), ChallengeOutcome::StrongHit);
        assert_eq!(challenge_outcome(5, &[3, 7]), ChallengeOutcome::WeakHit);
        assert_eq!(challenge_outcome(5, &[5, 7]), ChallengeOutcome::Miss);
        // Ties never beat a challenge die.
        assert_eq!(challenge_outcome(5, &[5, 5]), ChallengeOutcome::Miss);
        // Fewer than two challenge dice is always a miss.
        assert_eq!(challenge_outcome(5, &[3]), ChallengeOutcome::Miss);
    }

    #[test]
    fn challenge_doubles_use_modified_scores() {
        let term = match parse("challenge(d6 vs 2d10+1)").terms() {
            [Term::Challenge(term)] => term.clone(),
            other => panic!("unexpected terms {:?}", other),
        };
        // Dice 2 and 2 become scores 3 and 3.
        let roll = evaluate_challenge_term(&term, 6, vec![2, 2]);
        assert_eq!(roll.challenge_scores, vec![3, 3]);
        assert!(roll.boon);
    }

    #[test]
    fn challenge_complication_on_miss_doubles() {
        let term = match parse("challenge").terms() {
            [Term::Challenge(term)] => term.clone(),
            other => panic!("unexpected terms {:?}", other),
        };
        let roll = evaluate_challenge_term(&term, 2, vec![7, 7]);
        assert_eq!(roll.outcome, ChallengeOutcome::Miss);
        assert!(roll.complication);
        assert!(!roll.boon);
    }

    #[test]
    fn percentile_value_never_yields_zero() {
        assert_eq!(percentile_value(40, 3), 43);
        assert_eq!(percentile_value(47, 3), 43);
        assert_eq!(percentile_value(100, 10), 100);
        assert_eq!(percentile_value(100, 7), 7);
        assert_eq!(percentile_value(10, 10), 10);
        assert_eq!(percentile_value(90, 10), 90);
    }

    #[test]
    fn custom_percentile_combines_component_dice() {
        let term = only_dice_term("d%66");
        let mut roller = SeqRoller::new([4, 3]);
        let roll = roll_dice_term(&term, &mut roller).unwrap();
        assert_eq!(roll.dice[0].value, 43);
        assert_eq!(roll.total, 43);
    }

    #[test]
    fn custom_percentile_explosion_settles() {
        // The default threshold is the effective sides; only a maximum
        // roll chains.
        let term = only_dice_term("d%66!");
        assert_eq!(term.explode, Some(crate::expr::ExplodeRule { threshold: 66 }));
        let mut roller = SeqRoller::new([6, 6, 4, 3]);
        let roll = roll_dice_term(&term, &mut roller).unwrap();
        assert_eq!(roll.explosion_count(), 1);
        assert_eq!(roll.total, 66 + 43);

        let mut roller = SeqRoller::new([4, 3]);
        let roll = roll_dice_term(&term, &mut roller).unwrap();
        assert_eq!(roll.explosion_count(), 0);
        assert_eq!(roll.total, 43);
    }

    #[test]
    fn standard_percentile_wraps_double_zero_to_hundred() {
        let term = only_dice_term("d%100");
        let mut roller = SeqRoller::new([100, 10]);
        let roll = roll_dice_term(&term, &mut roller).unwrap();
        assert_eq!(roll.dice[0].value, 100);
    }

    #[test]
    fn oracle_percentile_stays_in_range() {
        let mut roller = SeqRoller::new([100, 10]);
        assert_eq!(roll_percentile(&mut roller), 100);
        let mut roller = SeqRoller::new([47, 3]);
        assert_eq!(roll_percentile(&mut roller), 43);
        let mut roller = SeqRoller::new([7, 3]);
        assert_eq!(roll_percentile(&mut roller), 73);
    }
}
