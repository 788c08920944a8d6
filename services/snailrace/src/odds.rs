//! Parimutuel odds and wager settlement
//!
//! Pure functions over `(race pool, entrant pool)`. Nothing here touches a
//! lock or the store.

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, Result};
use crate::simulator::Placings;

/// Decimal win odds: total pool over the entrant's pool
pub fn win_odds(race_pool: i64, entrant_pool: i64) -> Option<f64> {
    if entrant_pool <= 0 {
        return None;
    }
    Some(race_pool as f64 / entrant_pool as f64)
}

/// Place odds, win odds compressed a third of the way toward evens
pub fn place_odds(race_pool: i64, entrant_pool: i64) -> Option<f64> {
    win_odds(race_pool, entrant_pool).map(|odds| 1.0 + (odds - 1.0) / 3.0)
}

/// Wager type tag as chosen by a bettor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WagerType {
    Win,
    Place,
    EachWay,
    Quinella,
    Exacta,
    Trifecta,
}

impl WagerType {
    /// Number of entrant indices the type needs
    pub fn arity(&self) -> usize {
        match self {
            WagerType::Win | WagerType::Place | WagerType::EachWay => 1,
            WagerType::Quinella | WagerType::Exacta => 2,
            WagerType::Trifecta => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WagerType::Win => "win",
            WagerType::Place => "place",
            WagerType::EachWay => "each-way",
            WagerType::Quinella => "quinella",
            WagerType::Exacta => "exacta",
            WagerType::Trifecta => "trifecta",
        }
    }
}

impl std::str::FromStr for WagerType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "win" => Ok(WagerType::Win),
            "place" => Ok(WagerType::Place),
            "each-way" | "each_way" | "eachway" => Ok(WagerType::EachWay),
            "quinella" => Ok(WagerType::Quinella),
            "exacta" => Ok(WagerType::Exacta),
            "trifecta" => Ok(WagerType::Trifecta),
            other => Err(format!("unknown wager type: {}", other)),
        }
    }
}

/// A validated wager selection carrying exactly the indices its type needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "entrants", rename_all = "snake_case")]
pub enum WagerKind {
    Win(usize),
    Place(usize),
    EachWay(usize),
    Quinella(usize, usize),
    Exacta(usize, usize),
    Trifecta(usize, usize, usize),
}

impl WagerKind {
    /// Validate arity, range and distinctness of the selected entrants
    pub fn new(wager_type: WagerType, indices: &[usize], entrants: usize) -> Result<Self> {
        if indices.len() != wager_type.arity() {
            return Err(EngineError::WrongArity {
                wager_type: wager_type.name(),
                expected: wager_type.arity(),
                actual: indices.len(),
            });
        }

        for (pos, &index) in indices.iter().enumerate() {
            if index >= entrants {
                return Err(EngineError::InvalidEntrant { index, entrants });
            }
            if indices[..pos].contains(&index) {
                return Err(EngineError::DuplicateEntrant(index));
            }
        }

        Ok(match wager_type {
            WagerType::Win => WagerKind::Win(indices[0]),
            WagerType::Place => WagerKind::Place(indices[0]),
            WagerType::EachWay => WagerKind::EachWay(indices[0]),
            WagerType::Quinella => WagerKind::Quinella(indices[0], indices[1]),
            WagerType::Exacta => WagerKind::Exacta(indices[0], indices[1]),
            WagerType::Trifecta => WagerKind::Trifecta(indices[0], indices[1], indices[2]),
        })
    }

    pub fn wager_type(&self) -> WagerType {
        match self {
            WagerKind::Win(_) => WagerType::Win,
            WagerKind::Place(_) => WagerType::Place,
            WagerKind::EachWay(_) => WagerType::EachWay,
            WagerKind::Quinella(..) => WagerType::Quinella,
            WagerKind::Exacta(..) => WagerType::Exacta,
            WagerKind::Trifecta(..) => WagerType::Trifecta,
        }
    }

    /// Entrants whose sub-pools receive a share of the stake
    pub fn legs(&self) -> Vec<usize> {
        match *self {
            WagerKind::Win(a) | WagerKind::Place(a) | WagerKind::EachWay(a) => vec![a],
            WagerKind::Quinella(a, b) | WagerKind::Exacta(a, b) => vec![a, b],
            WagerKind::Trifecta(a, b, c) => vec![a, b, c],
        }
    }

    /// Split a stake across the legs
    ///
    /// Each leg gets `stake / legs`, the first `stake % legs` legs one unit
    /// more, so the shares always add back up to the stake.
    pub fn split_stake(&self, stake: i64) -> Vec<(usize, i64)> {
        let legs = self.legs();
        let count = legs.len() as i64;
        let base = stake / count;
        let remainder = stake % count;

        legs.into_iter()
            .enumerate()
            .map(|(pos, entrant)| {
                let extra = if (pos as i64) < remainder { 1 } else { 0 };
                (entrant, base + extra)
            })
            .collect()
    }

    /// Amount returned to the bettor, 0 for a losing wager
    ///
    /// `pools` are the final entrant sub-pools and `race_pool` their total.
    pub fn payout(&self, stake: i64, race_pool: i64, pools: &[i64], placings: &Placings) -> i64 {
        let win = |idx: usize| pools.get(idx).and_then(|&p| win_odds(race_pool, p));
        let place = |idx: usize| pools.get(idx).and_then(|&p| place_odds(race_pool, p));
        let finished = |idx: usize| placings.place_of(idx).unwrap_or(u32::MAX);
        let stake_f = stake as f64;

        let amount = match *self {
            WagerKind::Win(a) if finished(a) == 1 => win(a).map(|w| stake_f * w),
            WagerKind::Place(a) if finished(a) <= 3 => place(a).map(|p| stake_f * p),
            WagerKind::EachWay(a) if finished(a) <= 3 => {
                let half = stake_f / 2.0;
                let place_leg = place(a).map(|p| half * p);
                let win_leg = if finished(a) == 1 {
                    win(a).map(|w| half * w)
                } else {
                    Some(0.0)
                };
                place_leg.zip(win_leg).map(|(p, w)| p + w)
            }
            WagerKind::Quinella(a, b) => {
                let mut top_two = [finished(a), finished(b)];
                top_two.sort_unstable();
                if top_two == [1, 2] {
                    place(a).zip(place(b)).map(|(pa, pb)| stake_f * pa * pb)
                } else {
                    None
                }
            }
            WagerKind::Exacta(a, b) if finished(a) == 1 && finished(b) == 2 => {
                win(a).zip(place(b)).map(|(wa, pb)| stake_f * wa * pb)
            }
            WagerKind::Trifecta(a, b, c)
                if finished(a) == 1 && finished(b) == 2 && finished(c) == 3 =>
            {
                win(a)
                    .zip(place(b))
                    .zip(place(c))
                    .map(|((wa, pb), pc)| stake_f * wa * pb * pc)
            }
            _ => None,
        };

        amount.map(|value| value.trunc() as i64).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placings(order: &[usize]) -> Placings {
        Placings::from_order(order.to_vec())
    }

    #[test]
    fn test_win_and_place_odds() {
        assert_eq!(win_odds(1000, 500), Some(2.0));
        let place = place_odds(1000, 500).unwrap();
        assert!((place - 4.0 / 3.0).abs() < 1e-9);
        assert_eq!(win_odds(1000, 0), None);
        assert_eq!(place_odds(1000, -5), None);
    }

    #[test]
    fn test_odds_properties() {
        for race_pool in [1_i64, 10, 150, 1000, 98_765] {
            for entrant_pool in 1..=race_pool.min(400) {
                let win = win_odds(race_pool, entrant_pool).unwrap();
                let place = place_odds(race_pool, entrant_pool).unwrap();
                assert!(win >= 1.0);
                if win > 1.0 {
                    assert!(place < win);
                }
            }
        }
        assert!(win_odds(100, 101).unwrap() < 1.0);
    }

    #[test]
    fn test_arity_is_validated() {
        assert!(matches!(
            WagerKind::new(WagerType::Quinella, &[1], 5),
            Err(EngineError::WrongArity { expected: 2, actual: 1, .. })
        ));
        assert!(matches!(
            WagerKind::new(WagerType::Win, &[0, 1], 5),
            Err(EngineError::WrongArity { expected: 1, actual: 2, .. })
        ));
        assert!(matches!(
            WagerKind::new(WagerType::Trifecta, &[], 5),
            Err(EngineError::WrongArity { expected: 3, actual: 0, .. })
        ));
        assert_eq!(
            WagerKind::new(WagerType::Exacta, &[3, 1], 5).unwrap(),
            WagerKind::Exacta(3, 1)
        );
    }

    #[test]
    fn test_indices_must_be_in_range_and_distinct() {
        assert!(matches!(
            WagerKind::new(WagerType::Win, &[5], 5),
            Err(EngineError::InvalidEntrant { index: 5, entrants: 5 })
        ));
        assert!(matches!(
            WagerKind::new(WagerType::Trifecta, &[0, 2, 0], 5),
            Err(EngineError::DuplicateEntrant(0))
        ));
    }

    #[test]
    fn test_split_stake_sums_to_stake() {
        let trifecta = WagerKind::Trifecta(4, 0, 2);
        assert_eq!(trifecta.split_stake(100), vec![(4, 34), (0, 33), (2, 33)]);
        assert_eq!(trifecta.split_stake(3), vec![(4, 1), (0, 1), (2, 1)]);

        let quinella = WagerKind::Quinella(1, 2);
        assert_eq!(quinella.split_stake(101), vec![(1, 51), (2, 50)]);

        for stake in 3..500 {
            for kind in [trifecta, quinella, WagerKind::Win(0)] {
                let total: i64 = kind.split_stake(stake).iter().map(|(_, s)| s).sum();
                assert_eq!(total, stake);
            }
        }
    }

    #[test]
    fn test_scenario_win_pays_double() {
        // pool 1000, entrant A holds 500
        let pools = [500, 300, 200];
        let kind = WagerKind::Win(0);
        assert_eq!(kind.payout(100, 1000, &pools, &placings(&[0, 1, 2])), 200);
        assert_eq!(kind.payout(100, 1000, &pools, &placings(&[1, 0, 2])), 0);
    }

    #[test]
    fn test_scenario_quinella_either_order() {
        // A place odds 1.5, B place odds 2.0
        let pools = [400, 250, 350];
        let kind = WagerKind::Quinella(0, 1);
        assert_eq!(kind.payout(100, 1000, &pools, &placings(&[0, 1, 2])), 300);
        assert_eq!(kind.payout(100, 1000, &pools, &placings(&[1, 0, 2])), 300);
        assert_eq!(kind.payout(100, 1000, &pools, &placings(&[0, 2, 1])), 0);
    }

    #[test]
    fn test_scenario_trifecta_exact_order_only() {
        let pools = [500, 250, 250];
        let kind = WagerKind::Trifecta(0, 1, 2);
        // win(A) = 2.0, place(B) = place(C) = 2.0
        assert_eq!(kind.payout(30, 1000, &pools, &placings(&[0, 1, 2])), 240);
        for order in [[0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]] {
            assert_eq!(kind.payout(30, 1000, &pools, &placings(&order)), 0);
        }
    }

    #[test]
    fn test_place_and_each_way() {
        let pools = [100, 100, 100, 700];
        let order = placings(&[3, 1, 0, 2]);
        // entrant 0: win odds 10, place odds 4
        assert_eq!(WagerKind::Place(0).payout(10, 1000, &pools, &order), 40);
        assert_eq!(WagerKind::Place(2).payout(10, 1000, &pools, &order), 0);
        // placed but not first: only the place leg
        assert_eq!(WagerKind::EachWay(0).payout(10, 1000, &pools, &order), 20);

        let winning = placings(&[0, 1, 2, 3]);
        // both legs: 5 * 4 + 5 * 10
        assert_eq!(WagerKind::EachWay(0).payout(10, 1000, &pools, &winning), 70);
    }

    #[test]
    fn test_exacta_requires_order() {
        let pools = [500, 250, 250];
        let kind = WagerKind::Exacta(0, 1);
        assert_eq!(kind.payout(10, 1000, &pools, &placings(&[0, 1, 2])), 40);
        assert_eq!(kind.payout(10, 1000, &pools, &placings(&[1, 0, 2])), 0);
    }

    #[test]
    fn test_payout_truncates() {
        // win odds 3.0 / 1 = 3, place odds 1 + 2/3
        let pools = [1, 2];
        assert_eq!(WagerKind::Place(0).payout(10, 3, &pools, &placings(&[0, 1])), 16);
    }

    #[test]
    fn test_wager_type_parsing() {
        assert_eq!("Each-Way".parse::<WagerType>(), Ok(WagerType::EachWay));
        assert_eq!("trifecta".parse::<WagerType>(), Ok(WagerType::Trifecta));
        assert!("double".parse::<WagerType>().is_err());
    }
}
