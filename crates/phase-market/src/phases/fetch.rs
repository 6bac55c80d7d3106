use crate::error::MarketError;
use crate::keys;
use crate::source::{DataSource, SeriesSpec};
use async_trait::async_trait;
use phase_core::{Blackboard, Phase, PhaseContext, PhaseResult, RetryPolicy};
use std::sync::Arc;
use tracing::info;

/// Retrieves the intraday series and publishes it under `market.series`
pub struct FetchPhase {
    source: Arc<dyn DataSource>,
    spec: SeriesSpec,
    retry: RetryPolicy,
    blackboard: Arc<Blackboard>,
}

impl FetchPhase {
    pub fn new(
        source: Arc<dyn DataSource>,
        spec: SeriesSpec,
        retry: RetryPolicy,
        blackboard: Arc<Blackboard>,
    ) -> Self {
        Self {
            source,
            spec,
            retry,
            blackboard,
        }
    }
}

#[async_trait]
impl Phase for FetchPhase {
    fn id(&self) -> &str {
        super::FETCH
    }

    async fn execute(&self, ctx: &PhaseContext) -> PhaseResult<()> {
        let fetched = ctx
            .call_with_retry(&self.retry, "fetch_series", || self.source.fetch(&self.spec))
            .await?;

        let series = fetched.value;
        if series.is_empty() {
            return Err(MarketError::DataUnavailable {
                symbol: self.spec.symbol.clone(),
                reason: format!(
                    "no {} points in the last {} days",
                    self.spec.interval, self.spec.lookback_days
                ),
            }
            .into());
        }

        info!(
            "Fetched {} {} points for {} from {} ({} attempt(s))",
            series.len(),
            self.spec.interval,
            self.spec.symbol,
            self.source.name(),
            fetched.attempts
        );
        self.blackboard.put_typed(&keys::SERIES, &series)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockSource, two_level_series};
    use phase_core::PhaseError;

    fn spec() -> SeriesSpec {
        SeriesSpec {
            symbol: "INUV".to_string(),
            interval: "5min".to_string(),
            lookback_days: 15,
        }
    }

    fn phase(source: MockSource, blackboard: &Arc<Blackboard>) -> FetchPhase {
        FetchPhase::new(
            Arc::new(source),
            spec(),
            RetryPolicy::fast(),
            Arc::clone(blackboard),
        )
    }

    #[tokio::test]
    async fn test_writes_series() {
        let mut source = MockSource::new();
        source
            .expect_fetch()
            .withf(|spec: &SeriesSpec| spec.symbol == "INUV" && spec.interval == "5min")
            .times(1)
            .returning(|_| Ok(two_level_series()));
        source.expect_name().return_const("mock_source");

        let blackboard = Blackboard::shared();
        phase(source, &blackboard)
            .execute(&PhaseContext::new("fetch"))
            .await
            .unwrap();

        assert_eq!(blackboard.get_typed(&keys::SERIES).unwrap(), two_level_series());
    }

    #[tokio::test]
    async fn test_empty_series_fails_without_retry() {
        let mut source = MockSource::new();
        source.expect_fetch().times(1).returning(|_| Ok(Vec::new()));

        let blackboard = Blackboard::shared();
        let err = phase(source, &blackboard)
            .execute(&PhaseContext::new("fetch"))
            .await
            .unwrap_err();

        assert!(matches!(err, PhaseError::Structural(msg) if msg.contains("INUV")));
        assert!(blackboard.is_empty());
    }

    #[tokio::test]
    async fn test_transient_errors_exhaust_retries() {
        let mut source = MockSource::new();
        source
            .expect_fetch()
            .times(3)
            .returning(|_| Err(MarketError::AlphaVantageError("HTTP error: 503".to_string())));

        let blackboard = Blackboard::shared();
        let err = phase(source, &blackboard)
            .execute(&PhaseContext::new("fetch"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PhaseError::RetriesExhausted { attempts: 3, last_error } if last_error.contains("503")
        ));
        assert!(!blackboard.contains_key(keys::SERIES.name()));
    }
}
