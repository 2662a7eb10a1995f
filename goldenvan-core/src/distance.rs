use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Coordinates;

/// Road distance and driving time between two points, in the provider's integer units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceEstimate {
    pub meters: u64,
    pub seconds: u64,
}

impl DistanceEstimate {
    pub fn kilometers(&self) -> Decimal {
        Decimal::new(self.meters as i64, 3).normalize()
    }

    pub fn minutes(&self) -> Decimal {
        (Decimal::from(self.seconds) / Decimal::from(60)).round_dp(2)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DistanceError {
    #[error("distance service unreachable: {0}")]
    Unavailable(String),
    #[error("distance service timed out")]
    Timeout,
    #[error("no route between the given points: {0}")]
    NoRoute(String),
}

#[async_trait]
pub trait DistanceResolver: Send + Sync {
    async fn resolve(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<DistanceEstimate, DistanceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kilometers_are_exact() {
        let estimate = DistanceEstimate { meters: 20_450, seconds: 1_530 };
        assert_eq!(estimate.kilometers(), Decimal::new(2045, 2));
        assert_eq!(estimate.minutes(), Decimal::new(2550, 2));
    }
}
