use serde::{Deserialize, Serialize};

use crate::time::Time;

/// How the departure time of a passenger group is chosen during
/// apportionment. The assignment core carries this option through to its
/// outputs but does not branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepartureTimeChoice {
    Equal,
    DecisionModelWithoutAdaption,
    DecisionModelWithAdaption,
    Rooftop,
}

impl Default for DepartureTimeChoice {
    fn default() -> Self {
        DepartureTimeChoice::Equal
    }
}

impl std::str::FromStr for DepartureTimeChoice {
    type Err = BadSettingValue;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use DepartureTimeChoice::*;
        let choice = match s {
            "equal" => Equal,
            "decision_model_without_adaption" => DecisionModelWithoutAdaption,
            "decision_model_with_adaption" => DecisionModelWithAdaption,
            "rooftop" => Rooftop,
            _ => {
                return Err(BadSettingValue {
                    option_name: "departure_time_choice",
                    value: s.to_string(),
                })
            }
        };
        Ok(choice)
    }
}

impl std::fmt::Display for DepartureTimeChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use DepartureTimeChoice::*;
        match self {
            Equal => write!(f, "equal"),
            DecisionModelWithoutAdaption => write!(f, "decision_model_without_adaption"),
            DecisionModelWithAdaption => write!(f, "decision_model_with_adaption"),
            Rooftop => write!(f, "rooftop"),
        }
    }
}

/// Which decision model the assignment workers use to choose between
/// alternatives with different perceived arrival times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionModelType {
    Optimal,
    Logit,
    Kirchhoff,
    RelativeLogit,
}

impl Default for DecisionModelType {
    fn default() -> Self {
        DecisionModelType::Optimal
    }
}

impl std::str::FromStr for DecisionModelType {
    type Err = BadSettingValue;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use DecisionModelType::*;
        let model = match s {
            "optimal" => Optimal,
            "logit" => Logit,
            "kirchhoff" => Kirchhoff,
            "relative_logit" => RelativeLogit,
            _ => {
                return Err(BadSettingValue {
                    option_name: "decision_model",
                    value: s.to_string(),
                })
            }
        };
        Ok(model)
    }
}

impl std::fmt::Display for DecisionModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use DecisionModelType::*;
        match self {
            Optimal => write!(f, "optimal"),
            Logit => write!(f, "logit"),
            Kirchhoff => write!(f, "kirchhoff"),
            RelativeLogit => write!(f, "relative_logit"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BadSettingValue {
    pub option_name: &'static str,
    pub value: String,
}

impl std::fmt::Display for BadSettingValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Bad value `{}` given for option `{}`",
            self.value, self.option_name
        )
    }
}

impl std::error::Error for BadSettingValue {}

/// All tunables of the assignment engine.
///
/// Cost weights are per second of the corresponding activity, except the
/// `*_costs` penalties (`transfer_costs`, `failure_costs`) which are flat
/// amounts of perceived seconds added per event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Every passenger is split into this many indivisible units, so that
    /// probabilistic decisions can distribute a demand entry over several
    /// alternatives without fractional loads.
    #[serde(default = "default_passenger_multiplier")]
    pub passenger_multiplier: u64,

    #[serde(default)]
    pub random_seed: u64,

    /// A connection counts as settled when its relative load changes by less
    /// than this fraction of its capacity between two iterations.
    #[serde(default = "default_convergence_limit")]
    pub convergence_limit: f64,

    /// Hard cap on the number of iterations; reaching it surfaces
    /// `converged = false` in the run summary.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Uncertainty of the arrival time of the previous vehicle, in seconds.
    /// Transfer evaluations average the profile over this window.
    #[serde(default = "default_max_delay")]
    pub max_delay: Time,

    #[serde(default = "default_waiting_costs")]
    pub waiting_costs: f64,

    #[serde(default = "default_walking_costs")]
    pub walking_costs: f64,

    /// Flat perceived penalty for every vehicle-to-vehicle transfer.
    #[serde(default = "default_transfer_costs")]
    pub transfer_costs: f64,

    /// Flat perceived penalty applied when boarding fails.
    #[serde(default = "default_failure_costs")]
    pub failure_costs: f64,

    /// How long a passenger who failed to board expects to be stranded, in
    /// seconds.
    #[serde(default = "default_stranding_waiting_time")]
    pub stranding_waiting_time: Time,

    #[serde(default = "default_congestion_enter_costs")]
    pub congestion_enter_costs: f64,

    #[serde(default = "default_congestion_travel_costs")]
    pub congestion_travel_costs: f64,

    #[serde(default = "default_congestion_exit_costs")]
    pub congestion_exit_costs: f64,

    /// Below this relative load a connection is congestion-free.
    #[serde(default = "default_load_factor_cutoff")]
    pub load_factor_cutoff: f64,

    /// Relative load at which the congestion cost switches from quadratic to
    /// exponential growth.
    #[serde(default = "default_load_factor_switch_point")]
    pub load_factor_switch_point: f64,

    #[serde(default = "default_load_factor_coefficient1")]
    pub load_factor_coefficient1: f64,

    #[serde(default = "default_load_factor_coefficient2")]
    pub load_factor_coefficient2: f64,

    /// When false, demand entries departing directly at a stop are rejected
    /// during the split by destination.
    #[serde(default = "default_allow_departure_stops")]
    pub allow_departure_stops: bool,

    /// When true, walking transfers pay the departure stop's minimum
    /// transfer buffer in addition to the walking time.
    #[serde(default)]
    pub use_transfer_buffer_times: bool,

    #[serde(default)]
    pub departure_time_choice: DepartureTimeChoice,

    #[serde(default)]
    pub decision_model: DecisionModelType,

    /// Scale of the logit models, in inverse perceived seconds.
    #[serde(default = "default_decision_beta")]
    pub decision_beta: f64,

    #[serde(default = "default_kirchhoff_exponent")]
    pub kirchhoff_exponent: f64,

    /// When true, the logit model draws a single alternative per group
    /// instead of splitting the group proportionally.
    #[serde(default)]
    pub randomized_choices: bool,
}

pub fn default_passenger_multiplier() -> u64 {
    100
}

pub fn default_convergence_limit() -> f64 {
    0.01
}

pub fn default_max_iterations() -> usize {
    100
}

pub fn default_max_delay() -> Time {
    300
}

pub fn default_waiting_costs() -> f64 {
    0.5
}

pub fn default_walking_costs() -> f64 {
    1.0
}

pub fn default_transfer_costs() -> f64 {
    300.0
}

pub fn default_failure_costs() -> f64 {
    900.0
}

pub fn default_stranding_waiting_time() -> Time {
    1800
}

pub fn default_congestion_enter_costs() -> f64 {
    180.0
}

pub fn default_congestion_travel_costs() -> f64 {
    0.5
}

pub fn default_congestion_exit_costs() -> f64 {
    90.0
}

pub fn default_load_factor_cutoff() -> f64 {
    0.75
}

pub fn default_load_factor_switch_point() -> f64 {
    1.0
}

pub fn default_load_factor_coefficient1() -> f64 {
    2.0
}

pub fn default_load_factor_coefficient2() -> f64 {
    1.0
}

pub fn default_allow_departure_stops() -> bool {
    true
}

pub fn default_decision_beta() -> f64 {
    0.005
}

pub fn default_kirchhoff_exponent() -> f64 {
    2.0
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            passenger_multiplier: default_passenger_multiplier(),
            random_seed: 0,
            convergence_limit: default_convergence_limit(),
            max_iterations: default_max_iterations(),
            max_delay: default_max_delay(),
            waiting_costs: default_waiting_costs(),
            walking_costs: default_walking_costs(),
            transfer_costs: default_transfer_costs(),
            failure_costs: default_failure_costs(),
            stranding_waiting_time: default_stranding_waiting_time(),
            congestion_enter_costs: default_congestion_enter_costs(),
            congestion_travel_costs: default_congestion_travel_costs(),
            congestion_exit_costs: default_congestion_exit_costs(),
            load_factor_cutoff: default_load_factor_cutoff(),
            load_factor_switch_point: default_load_factor_switch_point(),
            load_factor_coefficient1: default_load_factor_coefficient1(),
            load_factor_coefficient2: default_load_factor_coefficient2(),
            allow_departure_stops: default_allow_departure_stops(),
            use_transfer_buffer_times: false,
            departure_time_choice: DepartureTimeChoice::default(),
            decision_model: DecisionModelType::default(),
            decision_beta: default_decision_beta(),
            kirchhoff_exponent: default_kirchhoff_exponent(),
            randomized_choices: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SettingsError {
    ZeroPassengerMultiplier,
    NonPositiveConvergenceLimit(f64),
    NegativeCostWeight(&'static str, f64),
    NegativeDuration(&'static str, Time),
    CutoffAboveSwitchPoint { cutoff: f64, switch_point: f64 },
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use SettingsError::*;
        match self {
            ZeroPassengerMultiplier => {
                write!(f, "passenger_multiplier must be at least 1")
            }
            NonPositiveConvergenceLimit(value) => {
                write!(f, "convergence_limit must be positive, got {}", value)
            }
            NegativeCostWeight(name, value) => {
                write!(f, "{} must be non-negative, got {}", name, value)
            }
            NegativeDuration(name, value) => {
                write!(f, "{} must be non-negative, got {}", name, value)
            }
            CutoffAboveSwitchPoint {
                cutoff,
                switch_point,
            } => {
                write!(
                    f,
                    "load_factor_cutoff ({}) must not exceed load_factor_switch_point ({})",
                    cutoff, switch_point
                )
            }
        }
    }
}

impl std::error::Error for SettingsError {}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.passenger_multiplier == 0 {
            return Err(SettingsError::ZeroPassengerMultiplier);
        }
        if self.convergence_limit <= 0.0 {
            return Err(SettingsError::NonPositiveConvergenceLimit(
                self.convergence_limit,
            ));
        }
        let cost_weights = [
            ("waiting_costs", self.waiting_costs),
            ("walking_costs", self.walking_costs),
            ("transfer_costs", self.transfer_costs),
            ("failure_costs", self.failure_costs),
            ("congestion_enter_costs", self.congestion_enter_costs),
            ("congestion_travel_costs", self.congestion_travel_costs),
            ("congestion_exit_costs", self.congestion_exit_costs),
            ("load_factor_coefficient1", self.load_factor_coefficient1),
            ("load_factor_coefficient2", self.load_factor_coefficient2),
        ];
        for (name, value) in cost_weights {
            if value < 0.0 {
                return Err(SettingsError::NegativeCostWeight(name, value));
            }
        }
        if self.max_delay < 0 {
            return Err(SettingsError::NegativeDuration("max_delay", self.max_delay));
        }
        if self.stranding_waiting_time < 0 {
            return Err(SettingsError::NegativeDuration(
                "stranding_waiting_time",
                self.stranding_waiting_time,
            ));
        }
        if self.load_factor_cutoff > self.load_factor_switch_point {
            return Err(SettingsError::CutoffAboveSwitchPoint {
                cutoff: self.load_factor_cutoff,
                switch_point: self.load_factor_switch_point,
            });
        }
        Ok(())
    }
}
