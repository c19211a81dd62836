use std::cmp::Ordering;

use serde::Serialize;

use crate::nba::db::EfficiencyEntry;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

/// Pearson correlation coefficient. `None` when it is undefined: fewer than
/// two points, mismatched lengths, or either side constant.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 || is_constant(xs) || is_constant(ys) {
        return None;
    }
    let mean_x = mean(xs)?;
    let mean_y = mean(ys)?;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    let r = cov / (var_x.sqrt() * var_y.sqrt());
    if r.is_finite() {
        Some(r.max(-1.0).min(1.0))
    } else {
        None
    }
}

/// Least-squares line `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn equation(&self) -> String {
        format!("y = {:.4}x + {:.4}", self.slope, self.intercept)
    }
}

pub fn linear_fit(xs: &[f64], ys: &[f64]) -> Option<LinearFit> {
    if xs.len() != ys.len() || xs.len() < 2 || is_constant(xs) {
        return None;
    }
    let mean_x = mean(xs)?;
    let mean_y = mean(ys)?;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        sxy += (x - mean_x) * (y - mean_y);
        sxx += (x - mean_x) * (x - mean_x);
    }
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    Some(LinearFit { slope, intercept: mean_y - slope * mean_x })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Strong,
    Moderate,
    Weak,
}

impl Strength {
    pub fn of(r: f64) -> Self {
        if r > 0.7 {
            Strength::Strong
        } else if r > 0.4 {
            Strength::Moderate
        } else {
            Strength::Weak
        }
    }

    /// One-line reading of a correlation between `subject` and win percentage.
    pub fn describe(&self, subject: &str) -> String {
        match self {
            Strength::Strong => format!(
                "There is a strong positive correlation between {} and win percentage.",
                subject
            ),
            Strength::Moderate => format!(
                "There is a moderate positive correlation between {} and win percentage.",
                subject
            ),
            Strength::Weak => format!("There is a weak correlation between {} and win percentage.", subject),
        }
    }
}

pub const DEFENSIVE_RATING_FORMULA: &str = "2.0 x BLK + 1.5 x STL + 0.5 x DREB - 0.25 x PF (per game)";

/// Composite defensive rating from per-game averages.
pub fn defensive_rating(blocks: f64, steals: f64, def_rebounds: f64, fouls: f64) -> f64 {
    2.0 * blocks + 1.5 * steals + 0.5 * def_rebounds - 0.25 * fouls
}

/// The `n` best finite efficiencies, highest first. Equal values keep their
/// input order.
pub fn top_efficiencies(players: &[(String, f64)], n: usize) -> Vec<EfficiencyEntry> {
    let mut ranked: Vec<&(String, f64)> = players.iter().filter(|(_, eff)| eff.is_finite()).collect();
    // sort_by is stable
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ranked
        .into_iter()
        .take(n)
        .map(|(name, eff)| EfficiencyEntry { player_name: name.clone(), efficiency: *eff })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Top,
    Middle,
    Bottom,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Top => "Top Tier",
            Tier::Middle => "Middle Tier",
            Tier::Bottom => "Bottom Tier",
        }
    }
}

/// Tier of the team at `index` in a ranking of `n` teams. Thirds are
/// `n / 3` wide (at least one); the bottom tier takes the remainder.
pub fn tier(index: usize, n: usize) -> Tier {
    let size = (n / 3).max(1);
    if index < size {
        Tier::Top
    } else if index < 2 * size {
        Tier::Middle
    } else {
        Tier::Bottom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn perfect_lines_correlate_fully() {
        let xs = [0.33, 0.35, 0.37, 0.39];
        let up: Vec<f64> = xs.iter().map(|x| 2.0 * x + 0.1).collect();
        let down: Vec<f64> = xs.iter().map(|x| 1.0 - x).collect();
        assert!(close(pearson(&xs, &up).unwrap(), 1.0));
        assert!(close(pearson(&xs, &down).unwrap(), -1.0));
    }

    #[test]
    fn pearson_matches_hand_computation() {
        // sxy = 4, sxx = 10, syy = 2 => r = 4 / sqrt(20)
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let ys = [2.0, 3.0, 3.0, 3.0, 4.0];
        let r = pearson(&xs, &ys).unwrap();
        assert!(close(r, 4.0 / 20f64.sqrt()));
        assert!(r >= -1.0 && r <= 1.0);
    }

    #[test]
    fn pearson_is_undefined_for_degenerate_input() {
        assert_eq!(pearson(&[], &[]), None);
        assert_eq!(pearson(&[0.4], &[0.5]), None);
        assert_eq!(pearson(&[0.1, 0.2], &[0.5]), None);
        assert_eq!(pearson(&[0.36, 0.36, 0.36], &[0.2, 0.5, 0.7]), None);
        assert_eq!(pearson(&[0.31, 0.36, 0.39], &[0.5, 0.5, 0.5]), None);
    }

    #[test]
    fn regression_recovers_the_line() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let ys: Vec<f64> = xs.iter().map(|x| 0.5 * x - 1.0).collect();
        let fit = linear_fit(&xs, &ys).unwrap();
        assert!(close(fit.slope, 0.5));
        assert!(close(fit.intercept, -1.0));
        assert_eq!(fit.equation(), "y = 0.5000x + -1.0000");
        assert!(linear_fit(&[2.0, 2.0], &[1.0, 3.0]).is_none());
    }

    #[test]
    fn medians_for_odd_and_even_lengths() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 6.0]), Some(3.0));
    }

    #[test]
    fn strength_thresholds_are_exclusive() {
        assert_eq!(Strength::of(0.71), Strength::Strong);
        assert_eq!(Strength::of(0.7), Strength::Moderate);
        assert_eq!(Strength::of(0.41), Strength::Moderate);
        assert_eq!(Strength::of(0.4), Strength::Weak);
        assert_eq!(Strength::of(-0.9), Strength::Weak);
    }

    #[test]
    fn defensive_rating_weights() {
        // 2*5 + 1.5*7 + 0.5*34 - 0.25*20
        assert!(close(defensive_rating(5.0, 7.0, 34.0, 20.0), 32.5));
    }

    #[test]
    fn top_efficiencies_keep_best_five_in_roster_order_on_ties() {
        let roster: Vec<(String, f64)> = vec![
            ("Holiday".to_string(), 12.0),
            ("Tatum".to_string(), 24.0),
            ("Brown".to_string(), 18.0),
            ("White".to_string(), 12.0),
            ("Porzingis".to_string(), 20.0),
            ("Horford".to_string(), 12.0),
            ("Hauser".to_string(), f64::NAN),
            ("Pritchard".to_string(), 7.0),
        ];
        let top = top_efficiencies(&roster, 5);
        let names: Vec<&str> = top.iter().map(|e| e.player_name.as_str()).collect();
        assert_eq!(names, vec!["Tatum", "Porzingis", "Brown", "Holiday", "White"]);
        assert!(top.windows(2).all(|w| w[0].efficiency >= w[1].efficiency));
    }

    #[test]
    fn short_rosters_return_what_they_have() {
        let roster = vec![("Solo".to_string(), 9.5)];
        assert_eq!(top_efficiencies(&roster, 5).len(), 1);
        assert!(top_efficiencies(&[], 5).is_empty());
    }

    #[test]
    fn tiers_split_thirds() {
        let tiers: Vec<Tier> = (0..30).map(|i| tier(i, 30)).collect();
        assert_eq!(tiers.iter().filter(|t| **t == Tier::Top).count(), 10);
        assert_eq!(tiers.iter().filter(|t| **t == Tier::Middle).count(), 10);
        assert_eq!(tiers.iter().filter(|t| **t == Tier::Bottom).count(), 10);
        // a lone team still lands in the top tier
        assert_eq!(tier(0, 1), Tier::Top);
        assert_eq!(tier(1, 2), Tier::Middle);
        assert_eq!(tier(9, 10), Tier::Bottom);
    }
}
