//! Stock ledger arithmetic.
//!
//! The functions here are pure. Stores call them *inside* the transaction that
//! holds the variant row lock, against the row state read under that lock, and
//! write back only on `Ok`. That placement is what makes Reserve and Release safe
//! under concurrent callers; nothing in this module performs IO.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use catalog_core::{DomainError, DomainResult};

/// Total and reserved units of one variant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub stock: u32,
    pub reserved: u32,
}

impl StockLevel {
    pub fn new(stock: u32, reserved: u32) -> Self {
        Self { stock, reserved }
    }

    /// `stock - reserved`, saturating at zero for rows over-reserved by `set_total`.
    pub fn available(&self) -> u32 {
        self.stock.saturating_sub(self.reserved)
    }

    /// `reserved <= stock`.
    pub fn is_consistent(&self) -> bool {
        self.reserved <= self.stock
    }

    /// Hold `quantity` more units. Zero is a no-op that never fails.
    pub fn reserve(self, quantity: u32) -> DomainResult<Self> {
        if quantity == 0 {
            return Ok(self);
        }
        match self.reserved.checked_add(quantity) {
            Some(reserved) if reserved <= self.stock => Ok(Self { reserved, ..self }),
            _ => Err(DomainError::InsufficientStock {
                requested: quantity,
                available: self.available(),
            }),
        }
    }

    /// Return `quantity` held units. Zero is a no-op that never fails.
    pub fn release(self, quantity: u32) -> DomainResult<Self> {
        match self.reserved.checked_sub(quantity) {
            Some(reserved) => Ok(Self { reserved, ..self }),
            None => Err(DomainError::InvalidReleaseQuantity {
                requested: quantity,
                reserved: self.reserved,
            }),
        }
    }

    /// Overwrite total stock.
    ///
    /// Does not check `reserved <= new_stock`; an administrative overwrite below the
    /// current reservation level is accepted as-is.
    pub fn set_total(self, new_stock: u32) -> Self {
        Self {
            stock: new_stock,
            ..self
        }
    }

    pub fn apply(self, mutation: StockMutation) -> DomainResult<Self> {
        match mutation {
            StockMutation::Reserve(q) => self.reserve(q),
            StockMutation::Release(q) => self.release(q),
            StockMutation::SetTotal(n) => Ok(self.set_total(n)),
        }
    }
}

/// A single-row stock change, executed atomically by a store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockMutation {
    Reserve(u32),
    Release(u32),
    SetTotal(u32),
}

impl StockMutation {
    pub fn from_action(action: StockAction, quantity: u32) -> Self {
        match action {
            StockAction::Reserve => Self::Reserve(quantity),
            StockAction::Release => Self::Release(quantity),
            StockAction::Update => Self::SetTotal(quantity),
        }
    }

    pub fn action(&self) -> StockAction {
        match self {
            Self::Reserve(_) => StockAction::Reserve,
            Self::Release(_) => StockAction::Release,
            Self::SetTotal(_) => StockAction::Update,
        }
    }

    pub fn quantity(&self) -> u32 {
        match *self {
            Self::Reserve(q) | Self::Release(q) | Self::SetTotal(q) => q,
        }
    }
}

/// External action tag for stock management requests.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StockAction {
    Reserve,
    Release,
    /// Overwrite total stock.
    Update,
}

impl StockAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reserve => "RESERVE",
            Self::Release => "RELEASE",
            Self::Update => "UPDATE",
        }
    }
}

impl core::fmt::Display for StockAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RESERVE" => Ok(Self::Reserve),
            "RELEASE" => Ok(Self::Release),
            "UPDATE" => Ok(Self::Update),
            _ => Err(DomainError::invalid_stock_action(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn reserve_up_to_available_is_inclusive() {
        let level = StockLevel::new(10, 4);
        let ok = level.reserve(6).unwrap();
        assert_eq!(ok, StockLevel::new(10, 10));

        let err = level.reserve(7).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                requested: 7,
                available: 6
            }
        );
    }

    #[test]
    fn reserve_overflow_is_insufficient_stock() {
        let level = StockLevel::new(u32::MAX, u32::MAX - 1);
        assert!(matches!(
            level.reserve(u32::MAX),
            Err(DomainError::InsufficientStock { .. })
        ));
    }

    #[test]
    fn zero_quantities_are_no_ops() {
        // Over-reserved after an administrative overwrite: a zero reservation still succeeds.
        let level = StockLevel::new(3, 5);
        assert_eq!(level.reserve(0).unwrap(), level);
        assert_eq!(level.release(0).unwrap(), level);
    }

    #[test]
    fn release_cannot_go_negative() {
        let level = StockLevel::new(10, 3);
        assert_eq!(level.release(3).unwrap(), StockLevel::new(10, 0));
        assert_eq!(
            level.release(4).unwrap_err(),
            DomainError::InvalidReleaseQuantity {
                requested: 4,
                reserved: 3
            }
        );
    }

    #[test]
    fn set_total_overwrites_without_reservation_check() {
        let level = StockLevel::new(100, 30).set_total(10);
        assert_eq!(level, StockLevel::new(10, 30));
        assert!(!level.is_consistent());
        assert_eq!(level.available(), 0);
    }

    #[test]
    fn scenario_reserve_release_set_total() {
        let level = StockLevel::new(100, 0);
        let level = level.apply(StockMutation::Reserve(50)).unwrap();
        assert_eq!(level.reserved, 50);
        let level = level.apply(StockMutation::Release(20)).unwrap();
        assert_eq!(level.reserved, 30);
        let level = level.apply(StockMutation::SetTotal(300)).unwrap();
        assert_eq!(level, StockLevel::new(300, 30));
    }

    #[test]
    fn parses_action_tags_case_insensitively() {
        assert_eq!("reserve".parse::<StockAction>().unwrap(), StockAction::Reserve);
        assert_eq!(" RELEASE ".parse::<StockAction>().unwrap(), StockAction::Release);
        assert_eq!("Update".parse::<StockAction>().unwrap(), StockAction::Update);
        assert_eq!(
            "DESTROY".parse::<StockAction>().unwrap_err(),
            DomainError::InvalidStockAction("DESTROY".to_string())
        );
    }

    #[test]
    fn mutation_maps_back_to_its_action() {
        let m = StockMutation::from_action(StockAction::Update, 7);
        assert_eq!(m, StockMutation::SetTotal(7));
        assert_eq!(m.action(), StockAction::Update);
        assert_eq!(m.quantity(), 7);
    }

    fn mutation() -> impl Strategy<Value = StockMutation> {
        prop_oneof![
            (0u32..200).prop_map(StockMutation::Reserve),
            (0u32..200).prop_map(StockMutation::Release),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: any sequence of reserve/release attempts on a consistent level
        /// keeps `reserved <= stock`, and a failed attempt leaves the level unchanged.
        #[test]
        fn reserve_and_release_preserve_invariant(
            stock in 0u32..1_000,
            ops in prop::collection::vec(mutation(), 0..50)
        ) {
            let mut level = StockLevel::new(stock, 0);
            for op in ops {
                if let Ok(next) = level.apply(op) {
                    level = next;
                }
                prop_assert!(level.is_consistent());
                prop_assert_eq!(level.stock, stock);
            }
        }

        /// Property: serially applying `n` reservations of `q` succeeds exactly
        /// `floor(stock / q)` times.
        #[test]
        fn serial_reservations_succeed_floor_times(
            stock in 0u32..500,
            q in 1u32..50,
            n in 0usize..100
        ) {
            let mut level = StockLevel::new(stock, 0);
            let mut ok = 0u32;
            for _ in 0..n {
                if let Ok(next) = level.reserve(q) {
                    level = next;
                    ok += 1;
                }
            }
            let expected = core::cmp::min(n as u32, stock / q);
            prop_assert_eq!(ok, expected);
            prop_assert_eq!(level.reserved, q * expected);
        }
    }
}
