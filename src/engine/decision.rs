use rand::rngs::StdRng;
use rand::Rng;

use crate::settings::{DecisionModelType, Settings};
use crate::time::{is_unreachable, PerceivedTime, Time};

/// Outcome of a decision over a set of alternatives: either one chosen
/// index, or a probability per alternative. Unreachable alternatives always
/// get probability zero.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Take(usize),
    Split(Vec<f64>),
}

/// A rule for distributing passengers over alternatives, given the perceived
/// arrival time of each alternative and the current time.
///
/// The profile computation is oblivious to the model in use; only the
/// assignment workers query it.
pub trait DecisionModel: Send + Sync {
    fn decide(&self, values: &[PerceivedTime], now: Time, rng: &mut StdRng) -> Decision;
}

pub fn from_settings(settings: &Settings) -> Box<dyn DecisionModel> {
    match settings.decision_model {
        DecisionModelType::Optimal => Box::new(Optimal),
        DecisionModelType::Logit => Box::new(Logit {
            beta: settings.decision_beta,
            randomized: settings.randomized_choices,
        }),
        DecisionModelType::Kirchhoff => Box::new(Kirchhoff {
            exponent: settings.kirchhoff_exponent,
        }),
        DecisionModelType::RelativeLogit => Box::new(RelativeLogit {
            beta: settings.decision_beta,
        }),
    }
}

/// Always the minimum perceived arrival time; ties go to the lowest index so
/// the choice is stable across iterations.
pub struct Optimal;

impl DecisionModel for Optimal {
    fn decide(&self, values: &[PerceivedTime], _now: Time, _rng: &mut StdRng) -> Decision {
        let mut best = 0;
        for (index, &value) in values.iter().enumerate() {
            if value < values[best] {
                best = index;
            }
        }
        Decision::Take(best)
    }
}

/// Multinomial logit over perceived arrival times. With `randomized` set,
/// one alternative is drawn per query instead of splitting the group.
pub struct Logit {
    pub beta: f64,
    pub randomized: bool,
}

impl DecisionModel for Logit {
    fn decide(&self, values: &[PerceivedTime], _now: Time, rng: &mut StdRng) -> Decision {
        let minimum = reachable_minimum(values);
        let weights: Vec<f64> = values
            .iter()
            .map(|&value| {
                if is_unreachable(value) {
                    0.0
                } else {
                    (-self.beta * (value - minimum)).exp()
                }
            })
            .collect();
        let probabilities = normalize(weights);
        if self.randomized {
            Decision::Take(sample(&probabilities, rng))
        } else {
            Decision::Split(probabilities)
        }
    }
}

/// Kirchhoff-style distribution: proportional to an inverse power of the
/// perceived remaining travel time.
pub struct Kirchhoff {
    pub exponent: f64,
}

impl DecisionModel for Kirchhoff {
    fn decide(&self, values: &[PerceivedTime], now: Time, _rng: &mut StdRng) -> Decision {
        let weights: Vec<f64> = values
            .iter()
            .map(|&value| {
                if is_unreachable(value) {
                    0.0
                } else {
                    let remaining = (value - now as f64).max(1.0);
                    remaining.powf(-self.exponent)
                }
            })
            .collect();
        Decision::Split(normalize(weights))
    }
}

/// Logit over perceived detour relative to the best alternative's remaining
/// travel time, so that the same absolute gap matters less on long journeys.
pub struct RelativeLogit {
    pub beta: f64,
}

impl DecisionModel for RelativeLogit {
    fn decide(&self, values: &[PerceivedTime], now: Time, _rng: &mut StdRng) -> Decision {
        let minimum = reachable_minimum(values);
        let reference = (minimum - now as f64).max(1.0);
        let weights: Vec<f64> = values
            .iter()
            .map(|&value| {
                if is_unreachable(value) {
                    0.0
                } else {
                    (-self.beta * (value - minimum) / reference * 100.0).exp()
                }
            })
            .collect();
        Decision::Split(normalize(weights))
    }
}

fn reachable_minimum(values: &[PerceivedTime]) -> PerceivedTime {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

fn normalize(mut weights: Vec<f64>) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    debug_assert!(total > 0.0, "at least one alternative must be reachable");
    for weight in &mut weights {
        *weight /= total;
    }
    weights
}

fn sample(probabilities: &[f64], rng: &mut StdRng) -> usize {
    let draw: f64 = rng.gen();
    let mut cumulative = 0.0;
    let mut best = 0;
    for (index, &probability) in probabilities.iter().enumerate() {
        cumulative += probability;
        if draw < cumulative {
            return index;
        }
        if probability > probabilities[best] {
            best = index;
        }
    }
    // rounding pushed the draw past the last bucket
    best
}

/// Distributes `units` indivisible passenger units according to `decision`.
/// Fractional parts are floored and the remainder goes to the most probable
/// branch, so the total is always exact.
pub fn split_units(units: u64, decision: &Decision) -> Vec<u64> {
    match decision {
        Decision::Take(index) => {
            let mut shares = vec![0; *index + 1];
            shares[*index] = units;
            shares
        }
        Decision::Split(probabilities) => {
            let mut shares: Vec<u64> = probabilities
                .iter()
                .map(|p| (p * units as f64).floor() as u64)
                .collect();
            let assigned: u64 = shares.iter().sum();
            let remainder = units - assigned;
            if remainder > 0 {
                let mut best = 0;
                for (index, &p) in probabilities.iter().enumerate() {
                    if p > probabilities[best] {
                        best = index;
                    }
                }
                shares[best] += remainder;
            }
            shares
        }
    }
}
