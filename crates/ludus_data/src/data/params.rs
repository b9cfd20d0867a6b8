use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::state::TraitIndex;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
/// Transformation applied to raw payoffs before they are compared.
pub enum FitnessMapKind {
    /// Fitness equals payoff.
    None,
    /// `b + w * payoff`.
    #[default]
    Static,
    /// `b + w * (payoff - b)`.
    Convex,
    /// `b * exp(w * payoff)`.
    Exponential,
}

keyword_enum!(FitnessMapKind {
    None => ["none", "n"],
    Static => ["static", "s"],
    Convex => ["convex", "c"],
    Exponential => ["exponential", "exp", "e"],
});

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
/// Strategy revision protocol used by asynchronous and synchronous updates.
pub enum UpdateRuleKind {
    /// Adopt the reference trait if strictly better, stay on ties.
    Best,
    /// Adopt the reference trait if strictly better, toss a coin on ties.
    BestRandom,
    /// Noisy linear imitation of the fitness difference.
    Imitate,
    /// Linear imitation restricted to strictly better references.
    ImitateBetter,
    /// Fermi rule, logistic in the fitness difference.
    #[default]
    Thermal,
    /// Adopt with probability `f_ref / (f_ref + f_focal)`.
    Proportional,
    /// Adopt the trait with the highest mean-field payoff.
    BestResponse,
}

keyword_enum!(UpdateRuleKind {
    Best => ["best", "b"],
    BestRandom => ["best-random", "br"],
    Imitate => ["imitate", "i"],
    ImitateBetter => ["imitate-better", "ib"],
    Thermal => ["thermal", "fermi", "t"],
    Proportional => ["proportional", "p"],
    BestResponse => ["best-response", "bestresponse"],
});

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
/// How focal agents are chosen and how many of them revise per event.
pub enum PopulationUpdate {
    /// One uniformly chosen focal per event.
    #[default]
    Async,
    /// Every agent revises against the same frozen state, then all commit.
    Sync,
    /// Fitness-weighted parent, offspring replaces a random neighbour.
    MoranBirthDeath,
    /// Random agent dies, replaced by a fitness-weighted neighbour.
    MoranDeathBirth,
    /// Random focal copies a fitness-weighted member of its neighbourhood (self included).
    MoranImitate,
}

keyword_enum!(PopulationUpdate {
    Async => ["async", "a"],
    Sync => ["sync", "s"],
    MoranBirthDeath => ["moran-bd", "bd"],
    MoranDeathBirth => ["moran-db", "db"],
    MoranImitate => ["moran-imitate", "mi"],
});

impl PopulationUpdate {
    /// Whether the focal/parent is drawn weighted by fitness.
    #[must_use]
    pub fn is_moran(self) -> bool {
        matches!(
            self,
            Self::MoranBirthDeath | Self::MoranDeathBirth | Self::MoranImitate
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
/// Kernel for discrete trait mutations.
pub enum MutationKernel {
    /// Uniform over all active traits, the current one included.
    #[default]
    All,
    /// Uniform over all active traits except the current one.
    Other,
    /// Uniform within `±range` of the current index, clamped.
    Range,
}

keyword_enum!(MutationKernel {
    All => ["all", "a"],
    Other => ["other", "o"],
    Range => ["range", "r"],
});

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
/// Kernel for continuous trait mutations.
pub enum ContinuousKernel {
    /// Uniform within `±width` of the current value.
    #[default]
    Uniform,
    /// Gaussian with standard deviation `width`, truncated to the trait domain.
    Gaussian,
}

keyword_enum!(ContinuousKernel {
    Uniform => ["uniform", "u"],
    Gaussian => ["gaussian", "g"],
});

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
/// Migration regime between demes.
pub enum MigrationKind {
    /// No migration.
    #[default]
    None,
    /// Swap the traits of two agents in different demes.
    Diffusion,
    /// Fitness-weighted source overwrites a uniformly random destination.
    BirthDeath,
    /// Uniform destination replaced from outside its deme, fitness-weighted.
    DeathBirth,
}

keyword_enum!(MigrationKind {
    None => ["none", "n"],
    Diffusion => ["diffusion", "d"],
    BirthDeath => ["birth-death", "bd"],
    DeathBirth => ["death-birth", "db"],
});

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
/// Whether interaction payoffs are summed or averaged over interactions.
pub enum Accounting {
    #[default]
    Accumulated,
    Averaged,
}

keyword_enum!(Accounting {
    Accumulated => ["accumulated", "acc"],
    Averaged => ["averaged", "avg"],
});

/// Which neighbours an agent meets when scored on an explicit graph.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Partners {
    /// Every neighbour, or groups of the configured size drawn from the
    /// neighbourhood when it is larger than one group.
    #[default]
    All,
    /// One random neighbour (one random group for group games) per scoring.
    Random,
}

keyword_enum!(Partners {
    All => ["all", "neighbours"],
    Random => ["random", "single"],
});

/// Hierarchical deme geometry: `count` contiguous demes of `size` agents.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct DemeLayout {
    pub count: usize,
    pub size: usize,
}

impl DemeLayout {
    #[must_use]
    pub fn population_size(&self) -> usize {
        self.count * self.size
    }

    /// Deme containing `agent`.
    #[must_use]
    pub fn deme_of(&self, agent: usize) -> usize {
        agent / self.size
    }

    /// Agent index range of deme `deme`.
    #[must_use]
    pub fn members(&self, deme: usize) -> std::ops::Range<usize> {
        deme * self.size..(deme + 1) * self.size
    }
}

impl fmt::Display for DemeLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.count, self.size)
    }
}

impl FromStr for DemeLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (count, size) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("deme layout '{s}' must read <count>x<size>"))?;
        let count: usize = count
            .trim()
            .parse()
            .map_err(|_| format!("invalid deme count in '{s}'"))?;
        let size: usize = size
            .trim()
            .parse()
            .map_err(|_| format!("invalid deme size in '{s}'"))?;
        if count == 0 || size == 0 {
            return Err(format!("deme layout '{s}' must be non-empty"));
        }
        Ok(Self { count, size })
    }
}

impl TryFrom<String> for DemeLayout {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DemeLayout> for String {
    fn from(value: DemeLayout) -> Self {
        value.to_string()
    }
}

/// Interaction or reproduction graph of a population.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(try_from = "String", into = "String")]
pub enum Geometry {
    /// Implicit complete graph handled through aggregate counts.
    #[default]
    WellMixed,
    /// Explicit complete graph.
    Complete,
    /// Ring where each agent links to `k/2` agents on either side.
    Linear { k: usize },
    /// Periodic square lattice with four neighbours.
    VonNeumann,
    /// Periodic square lattice with eight neighbours.
    Moore,
    /// Periodic hexagonal lattice with six neighbours.
    Hexagonal,
    /// Hub `0` linked to every leaf.
    Star,
    /// Ring with an additional hub `0` linked to everyone.
    Wheel,
    /// Connected random regular graph of degree `k`.
    RandomRegular { k: usize },
    /// Connected Erdős–Rényi graph with average degree `k`.
    Random { k: usize },
}

impl Geometry {
    /// Lattices need a square population size.
    #[must_use]
    pub fn is_lattice(self) -> bool {
        matches!(self, Self::VonNeumann | Self::Moore | Self::Hexagonal)
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WellMixed => f.write_str("well-mixed"),
            Self::Complete => f.write_str("complete"),
            Self::Linear { k } => write!(f, "linear:{k}"),
            Self::VonNeumann => f.write_str("von-neumann"),
            Self::Moore => f.write_str("moore"),
            Self::Hexagonal => f.write_str("hexagonal"),
            Self::Star => f.write_str("star"),
            Self::Wheel => f.write_str("wheel"),
            Self::RandomRegular { k } => write!(f, "random-regular:{k}"),
            Self::Random { k } => write!(f, "random:{k}"),
        }
    }
}

impl FromStr for Geometry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (s.as_str(), None),
        };
        let degree = |default: usize| -> Result<usize, String> {
            match arg {
                None => Ok(default),
                Some(a) => a
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| format!("invalid degree '{a}' for geometry '{name}'")),
            }
        };
        match name {
            "well-mixed" | "wellmixed" | "m" => Ok(Self::WellMixed),
            "complete" | "c" => Ok(Self::Complete),
            "linear" | "l" => Ok(Self::Linear { k: degree(2)? }),
            "von-neumann" | "n" => Ok(Self::VonNeumann),
            "moore" | "moore8" => Ok(Self::Moore),
            "hexagonal" | "h" => Ok(Self::Hexagonal),
            "star" | "s" => Ok(Self::Star),
            "wheel" | "w" => Ok(Self::Wheel),
            "random-regular" | "rr" => Ok(Self::RandomRegular { k: degree(4)? }),
            "random" | "r" => Ok(Self::Random { k: degree(4)? }),
            _ => Err(format!("unknown geometry '{s}'")),
        }
    }
}

impl TryFrom<String> for Geometry {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Geometry> for String {
    fn from(value: Geometry) -> Self {
        value.to_string()
    }
}

/// Initial trait configuration of a population.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "String", into = "String")]
pub enum InitKind {
    /// Each agent draws a uniformly random active trait.
    Uniform,
    /// Each agent draws a trait from the given (normalised) frequencies.
    Frequencies(Vec<f64>),
    /// Every agent carries the same trait.
    Mono(TraitIndex),
    /// Residents of one trait and a single randomly placed mutant.
    Mutant {
        resident: TraitIndex,
        mutant: TraitIndex,
    },
    /// Residents of trait 0 with one agent of trait 1 at the centre of a lattice.
    Kaleidoscope,
}

impl Default for InitKind {
    fn default() -> Self {
        Self::Uniform
    }
}

impl fmt::Display for InitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uniform => f.write_str("uniform"),
            Self::Frequencies(freqs) => {
                let parts: Vec<String> = freqs.iter().map(|x| x.to_string()).collect();
                write!(f, "frequencies:{}", parts.join(","))
            }
            Self::Mono(t) => write!(f, "mono:{t}"),
            Self::Mutant { resident, mutant } => write!(f, "mutant:{resident},{mutant}"),
            Self::Kaleidoscope => f.write_str("kaleidoscope"),
        }
    }
}

impl FromStr for InitKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name, arg),
            None => (s.as_str(), ""),
        };
        let numbers = |arg: &str| -> Result<Vec<f64>, String> {
            arg.split(',')
                .map(|x| {
                    x.trim()
                        .parse::<f64>()
                        .map_err(|_| format!("invalid number '{x}' in init '{s}'"))
                })
                .collect()
        };
        let index = |x: f64| -> Result<TraitIndex, String> {
            if x >= 0.0 && x.fract() == 0.0 {
                Ok(x as TraitIndex)
            } else {
                Err(format!("invalid trait index '{x}' in init '{s}'"))
            }
        };
        match name {
            "uniform" | "u" => Ok(Self::Uniform),
            "kaleidoscope" | "k" => Ok(Self::Kaleidoscope),
            "frequencies" | "f" => {
                let freqs = numbers(arg)?;
                if freqs.iter().any(|x| !x.is_finite() || *x < 0.0) {
                    return Err(format!("frequencies in '{s}' must be non-negative"));
                }
                if freqs.iter().sum::<f64>() <= 0.0 {
                    return Err(format!("frequencies in '{s}' must not all be zero"));
                }
                Ok(Self::Frequencies(freqs))
            }
            "mono" => {
                let v = numbers(if arg.is_empty() { "0" } else { arg })?;
                Ok(Self::Mono(index(v[0])?))
            }
            "mutant" => {
                let v = numbers(if arg.is_empty() { "0,1" } else { arg })?;
                if v.len() != 2 {
                    return Err(format!("mutant init '{s}' needs <resident>,<mutant>"));
                }
                Ok(Self::Mutant {
                    resident: index(v[0])?,
                    mutant: index(v[1])?,
                })
            }
            _ => Err(format!("unknown init '{s}'")),
        }
    }
}

impl TryFrom<String> for InitKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InitKind> for String {
    fn from(value: InitKind) -> Self {
        value.to_string()
    }
}
