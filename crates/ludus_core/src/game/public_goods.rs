use super::{
    expected_group_scores, for_each_composition, Game, GameDescriptor, Interaction, PayoffKind,
};
use crate::error::{CoreError, Result};
use ludus_data::TraitIndex;
use serde::{Deserialize, Serialize};

/// Behaviour attached to a trait of the public goods game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Defector,
    Cooperator,
    /// Contributes like a cooperator and additionally punishes.
    Punisher,
    /// Abstains and receives the loner payoff.
    Loner,
    /// Empty site.
    Vacant,
}

/// Additive adjustments applied after the base public good, in list order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "term", rename_all = "kebab-case")]
pub enum PayoffTerm {
    /// Punishers fine every defector in the group.
    Punishment { fine: f64, cost: f64 },
    /// Punishers also fine contributors who do not punish.
    SecondOrderPunishment { fine: f64, cost: f64 },
    /// Every participant pays a fee.
    ParticipationCost { cost: f64 },
}

/// Linear public goods game.
///
/// Contributors pay `cost`, the pot is multiplied by `multiplier` and split
/// among all participants. Punishers are contributors for the base payoff;
/// punishment and fees are separate [`PayoffTerm`]s. Groups with fewer than
/// two participants do not play and every member receives the loner payoff.
#[derive(Debug, Clone)]
pub struct PublicGoods {
    descriptor: GameDescriptor,
    roles: Vec<Role>,
    multiplier: f64,
    cost: f64,
    loner_payoff: f64,
    terms: Vec<PayoffTerm>,
    min: f64,
    max: f64,
    monomorphic: Vec<f64>,
}

#[derive(Default)]
struct Tally {
    defectors: usize,
    cooperators: usize,
    punishers: usize,
}

impl PublicGoods {
    pub fn new(
        roles: Vec<Role>,
        group_size: usize,
        multiplier: f64,
        cost: f64,
        loner_payoff: f64,
        terms: Vec<PayoffTerm>,
    ) -> Result<Self> {
        for (i, role) in roles.iter().enumerate() {
            if roles[..i].contains(role) {
                return Err(CoreError::config(format!("role {role:?} listed twice")));
            }
        }
        let active = roles.iter().filter(|r| **r != Role::Vacant).count();
        if active < 2 {
            return Err(CoreError::config(
                "public goods game needs at least 2 non-vacant roles",
            ));
        }
        if group_size < 2 {
            return Err(CoreError::config(format!(
                "group size {group_size} leaves no co-players"
            )));
        }
        if !(multiplier > 0.0) || !(cost >= 0.0) || !loner_payoff.is_finite() {
            return Err(CoreError::config(
                "public goods needs multiplier > 0, cost >= 0 and a finite loner payoff",
            ));
        }
        let vacant = roles.iter().position(|r| *r == Role::Vacant);
        let descriptor = GameDescriptor {
            name: "public-goods".to_string(),
            trait_names: roles.iter().map(|r| format!("{r:?}")).collect(),
            interaction: Interaction::Group { size: group_size },
            payoffs: PayoffKind::Computed,
            mean_field: true,
            vacant,
        };
        let mut game = Self {
            descriptor,
            roles,
            multiplier,
            cost,
            loner_payoff,
            terms,
            min: 0.0,
            max: 0.0,
            monomorphic: Vec::new(),
        };
        game.compute_bounds(group_size)?;
        Ok(game)
    }

    fn compute_bounds(&mut self, group_size: usize) -> Result<()> {
        let n = self.roles.len();
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut slots = vec![0; n];
        let mut scores = vec![0.0; n];
        let mut result: Result<()> = Ok(());
        for_each_composition(&mut slots, 0, group_size, &mut |counts| {
            if let Err(e) = self.group_scores(counts, &mut scores) {
                result = Err(e);
                return;
            }
            for t in 0..n {
                if counts[t] > 0 && self.descriptor.is_active(t) {
                    min = min.min(scores[t]);
                    max = max.max(scores[t]);
                }
            }
        });
        result?;
        let mut monomorphic = vec![f64::NAN; n];
        for (t, mono) in monomorphic.iter_mut().enumerate() {
            if !self.descriptor.is_active(t) {
                continue;
            }
            let mut counts = vec![0; n];
            counts[t] = group_size;
            self.group_scores(&counts, &mut scores)?;
            *mono = scores[t];
        }
        self.min = min;
        self.max = max;
        self.monomorphic = monomorphic;
        Ok(())
    }

    fn tally(&self, counts: &[usize]) -> Tally {
        let mut tally = Tally::default();
        for (role, &k) in self.roles.iter().zip(counts) {
            match role {
                Role::Defector => tally.defectors += k,
                Role::Cooperator => tally.cooperators += k,
                Role::Punisher => tally.punishers += k,
                Role::Loner | Role::Vacant => {}
            }
        }
        tally
    }
}

impl Game for PublicGoods {
    fn descriptor(&self) -> &GameDescriptor {
        &self.descriptor
    }

    fn group_scores(&self, counts: &[usize], trait_scores: &mut [f64]) -> Result<()> {
        self.descriptor.check_len("group counts", counts.len())?;
        self.descriptor.check_len("trait scores", trait_scores.len())?;
        let tally = self.tally(counts);
        let participants = tally.defectors + tally.cooperators + tally.punishers;
        if participants < 2 {
            for (role, score) in self.roles.iter().zip(trait_scores.iter_mut()) {
                *score = match role {
                    Role::Vacant => f64::NAN,
                    _ => self.loner_payoff,
                };
            }
            return Ok(());
        }

        let contributors = (tally.cooperators + tally.punishers) as f64;
        let share = self.multiplier * self.cost * contributors / participants as f64;
        let mut defector = share;
        let mut cooperator = share - self.cost;
        let mut punisher = share - self.cost;
        for term in &self.terms {
            match *term {
                PayoffTerm::Punishment { fine, cost } => {
                    defector -= fine * tally.punishers as f64;
                    punisher -= cost * tally.defectors as f64;
                }
                PayoffTerm::SecondOrderPunishment { fine, cost } => {
                    cooperator -= fine * tally.punishers as f64;
                    punisher -= cost * tally.cooperators as f64;
                }
                PayoffTerm::ParticipationCost { cost } => {
                    defector -= cost;
                    cooperator -= cost;
                    punisher -= cost;
                }
            }
        }

        for (role, score) in self.roles.iter().zip(trait_scores.iter_mut()) {
            *score = match role {
                Role::Defector => defector,
                Role::Cooperator => cooperator,
                Role::Punisher => punisher,
                Role::Loner => self.loner_payoff,
                Role::Vacant => f64::NAN,
            };
        }
        Ok(())
    }

    fn mean_field_scores(
        &self,
        densities: &[f64],
        group_size: usize,
        trait_scores: &mut [f64],
    ) -> Result<()> {
        expected_group_scores(self, densities, group_size, trait_scores)
    }

    fn monomorphic_score(&self, trait_index: TraitIndex) -> f64 {
        self.monomorphic[trait_index]
    }

    fn min_payoff(&self) -> f64 {
        self.min
    }

    fn max_payoff(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_punishment() -> PublicGoods {
        PublicGoods::new(
            vec![Role::Defector, Role::Cooperator, Role::Punisher],
            5,
            3.0,
            1.0,
            0.0,
            vec![PayoffTerm::Punishment {
                fine: 1.0,
                cost: 0.3,
            }],
        )
        .unwrap()
    }

    #[test]
    fn test_punisher_counts_as_contributor() {
        let game = with_punishment();
        let mut scores = [0.0; 3];
        game.group_scores(&[2, 2, 1], &mut scores).unwrap();
        // pot = 3 * 1 * 3 / 5 = 1.8
        assert!((scores[0] - (1.8 - 1.0)).abs() < 1e-12);
        assert!((scores[1] - 0.8).abs() < 1e-12);
        assert!((scores[2] - (0.8 - 0.6)).abs() < 1e-12);
    }

    #[test]
    fn test_lonely_participant_gets_loner_payoff() {
        let game = PublicGoods::new(
            vec![Role::Defector, Role::Cooperator, Role::Loner],
            3,
            3.0,
            1.0,
            0.5,
            Vec::new(),
        )
        .unwrap();
        let mut scores = [0.0; 3];
        game.group_scores(&[0, 1, 2], &mut scores).unwrap();
        assert_eq!(scores, [0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_mean_field_matches_enumeration_for_pure_population() {
        let game = with_punishment();
        let mut scores = [0.0; 3];
        game.mean_field_scores(&[0.0, 1.0, 0.0], 5, &mut scores)
            .unwrap();
        assert!((scores[1] - game.monomorphic_score(1)).abs() < 1e-12);
        // a lone defector among cooperators shares the whole pot
        assert!((scores[0] - 3.0 * 4.0 / 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_vacant_role_scores_nan() {
        let game = PublicGoods::new(
            vec![Role::Defector, Role::Cooperator, Role::Vacant],
            3,
            2.0,
            1.0,
            0.0,
            Vec::new(),
        )
        .unwrap();
        assert_eq!(game.descriptor().vacant, Some(2));
        let mut scores = [0.0; 3];
        game.group_scores(&[1, 1, 1], &mut scores).unwrap();
        assert!(scores[2].is_nan());
        assert!(game.min_payoff().is_finite());
    }

    #[test]
    fn test_duplicate_roles_rejected() {
        let err = PublicGoods::new(
            vec![Role::Defector, Role::Defector],
            3,
            2.0,
            1.0,
            0.0,
            Vec::new(),
        );
        assert!(err.is_err());
    }
}
