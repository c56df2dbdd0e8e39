use crate::collaborators::ImageStrategy;
use crate::error::Unavailable;
use log::{debug, warn};
use std::sync::Arc;

/// Ordered "cheap first" strategies, tried until one produces a value
#[derive(Clone, Default)]
pub struct StrategyChain {
    strategies: Vec<Arc<dyn ImageStrategy>>,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Arc<dyn ImageStrategy>>) -> Self {
        StrategyChain { strategies }
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// First successful result. The error names the last strategy tried and
    /// carries every reason in order.
    pub async fn first(&self, input: &str) -> Result<String, Unavailable> {
        let mut reasons = Vec::new();

        for (position, strategy) in self.strategies.iter().enumerate() {
            match strategy.attempt(input).await {
                Ok(value) => {
                    if position > 0 {
                        debug!("'{}' resolved by {} after {} miss(es)", input, strategy.name(), position);
                    }
                    return Ok(value);
                }
                Err(unavailable) => {
                    if position + 1 < self.strategies.len() {
                        warn!("{} missed '{}', falling back", strategy.name(), input);
                    }
                    reasons.push(unavailable.to_string());
                }
            }
        }

        let last = self.strategies.last().map(|s| s.name()).unwrap_or("chain");
        Err(Unavailable::new(
            last,
            if reasons.is_empty() {
                "no strategies configured".to_string()
            } else {
                reasons.join("; ")
            },
        ))
    }
}
