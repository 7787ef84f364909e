pub mod gaussian_hmm;
pub mod stationary;

pub use gaussian_hmm::{HmmFitter, HmmParams};
pub use stationary::{long_run_stats, stationary_distribution};

pub const MONTHS_PER_YEAR: usize = 12;

/// Regime labels in canonical order: state 0 carries the lower mean return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    Bear = 0,
    Bull = 1,
}

impl Regime {
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Regime::Bear),
            1 => Some(Regime::Bull),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Bear => "Bear",
            Regime::Bull => "Bull",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regime_indexing() {
        assert_eq!(Regime::from_index(0), Some(Regime::Bear));
        assert_eq!(Regime::from_index(1), Some(Regime::Bull));
        assert_eq!(Regime::from_index(2), None);
        assert_eq!(Regime::Bull.as_str(), "Bull");
    }
}
