use crate::common::UInt;
use rand::Rng;

/// A synchronous source of raw die face values.
///
/// Every [`rand::Rng`] is a `DieRoller`, so `thread_rng()` or a seeded
/// test RNG can be passed straight to [`roll_with`](crate::roll_with).
pub trait DieRoller {
    /// One face value in `1..=sides`.
    fn roll_die(&mut self, sides: UInt) -> UInt;

    fn roll_dice(&mut self, count: UInt, sides: UInt) -> Vec<UInt> {
        (0..count).map(|_| self.roll_die(sides)).collect()
    }
}

impl<R: Rng> DieRoller for R {
    fn roll_die(&mut self, sides: UInt) -> UInt {
        self.gen_range(1..=sides)
    }
}

/// Scripted roller for deterministic tests: hands out the configured
/// values in order and panics when the script runs dry.
#[cfg(test)]
pub(crate) struct SeqRoller {
    values: Vec<UInt>,
    pos: usize,
}

#[cfg(test)]
impl SeqRoller {
    pub fn new(values: impl Into<Vec<UInt>>) -> Self {
        Self {
            values: values.into(),
            pos: 0,
        }
    }
}

#[cfg(test)]
impl DieRoller for SeqRoller {
    fn roll_die(&mut self, _sides: UInt) -> UInt {
        let value = self.values[self.pos];
        self.pos += 1;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn rng_rolls_stay_in_range() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let value = rng.roll_die(6);
            assert!((1..=6).contains(&value));
        }
    }

    #[test]
    fn step_rng_is_a_roller() {
        let mut rng = StepRng::new(0, 1);
        let values = rng.roll_dice(3, 20);
        assert_eq!(values.len(), 3);
        assert!(values.iter().all(|v| (1..=20).contains(v)));
    }

    #[test]
    fn seq_roller_replays_its_script() {
        let mut roller = SeqRoller::new([3, 5, 1, 6]);
        assert_eq!(roller.roll_dice(4, 6), vec![3, 5, 1, 6]);
    }
}
