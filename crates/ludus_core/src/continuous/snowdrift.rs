use super::ContinuousGame;
use crate::error::{CoreError, Result};

/// Grid resolution used to bound the payoff range.
const PAYOFF_GRID: usize = 100;

/// Continuous snowdrift game with quadratic benefit and cost.
///
/// An agent investing `x` against a partner investing `y` receives
/// `B(x + y) - C(x)` with `B(z) = b2 z^2 + b1 z` and `C(x) = c2 x^2 + c1 x`.
/// Investments lie in `[0, max_investment]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousSnowdrift {
    pub b2: f64,
    pub b1: f64,
    pub c2: f64,
    pub c1: f64,
    pub max_investment: f64,
    bounds: Vec<(f64, f64)>,
    range: (f64, f64),
}

impl ContinuousSnowdrift {
    pub fn new(b2: f64, b1: f64, c2: f64, c1: f64, max_investment: f64) -> Result<Self> {
        if ![b2, b1, c2, c1].iter().all(|x| x.is_finite()) {
            return Err(CoreError::config("snowdrift coefficients must be finite"));
        }
        if !(max_investment > 0.0 && max_investment.is_finite()) {
            return Err(CoreError::config(format!(
                "maximum investment {max_investment} must be positive"
            )));
        }
        Ok(Self::build(b2, b1, c2, c1, max_investment))
    }

    fn build(b2: f64, b1: f64, c2: f64, c1: f64, max_investment: f64) -> Self {
        let mut game = Self {
            b2,
            b1,
            c2,
            c1,
            max_investment,
            bounds: vec![(0.0, max_investment)],
            range: (0.0, 0.0),
        };
        game.range = game.scan_range();
        game
    }

    fn benefit(&self, z: f64) -> f64 {
        self.b2 * z * z + self.b1 * z
    }

    fn cost(&self, x: f64) -> f64 {
        self.c2 * x * x + self.c1 * x
    }

    fn scan_range(&self) -> (f64, f64) {
        let step = self.max_investment / PAYOFF_GRID as f64;
        let mut range = (f64::INFINITY, f64::NEG_INFINITY);
        for i in 0..=PAYOFF_GRID {
            for j in 0..=PAYOFF_GRID {
                let p = self.payoff(&[i as f64 * step], &[j as f64 * step]);
                range = (range.0.min(p), range.1.max(p));
            }
        }
        range
    }
}

impl Default for ContinuousSnowdrift {
    fn default() -> Self {
        // b2 = -1.4, b1 = 6, c2 = -1.6, c1 = 4.56 shows evolutionary branching
        Self::build(-1.4, 6.0, -1.6, 4.56, 1.0)
    }
}

impl ContinuousGame for ContinuousSnowdrift {
    fn name(&self) -> &str {
        "continuous-snowdrift"
    }

    fn bounds(&self) -> &[(f64, f64)] {
        &self.bounds
    }

    fn payoff(&self, focal: &[f64], opponent: &[f64]) -> f64 {
        let (x, y) = (focal[0], opponent[0]);
        self.benefit(x + y) - self.cost(x)
    }

    fn min_payoff(&self) -> f64 {
        self.range.0
    }

    fn max_payoff(&self) -> f64 {
        self.range.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payoff() {
        let game = ContinuousSnowdrift::new(0.0, 2.0, 0.0, 1.0, 1.0).unwrap();
        // B(0.75) - C(0.5) = 1.5 - 0.5
        assert!((game.payoff(&[0.5], &[0.25]) - 1.0).abs() < 1e-12);
        assert_eq!(game.dimension(), 1);
        assert!(game.min_payoff() <= 0.0 && game.max_payoff() >= 3.0);
    }

    #[test]
    fn test_invalid_investment_rejected() {
        assert!(ContinuousSnowdrift::new(0.0, 1.0, 0.0, 1.0, 0.0).is_err());
    }
}
