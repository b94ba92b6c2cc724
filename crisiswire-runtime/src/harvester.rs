//! Harvester
//!
//! Runs a set of collectors on a fixed interval and forwards each round's
//! candidates to an ingest target:
//! - Collectors run independently; one failing never stops the others
//! - A signal reported by several collectors in one round is forwarded once
//! - A round's forwarding is bounded per item by the forwarder timeout
//! - The loop ends after `max_rounds` or on Ctrl-C

use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crisiswire_collectors::{
    fingerprint, Collector, CollectorError, ForwardReport, Forwarder, IngestTarget,
};

/// Harvester configuration
#[derive(Debug, Clone)]
pub struct HarvesterConfig {
    /// Delay between the start of two rounds
    pub interval: Duration,
    /// Rounds to run (0 = until interrupted)
    pub max_rounds: u64,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            max_rounds: 1,
        }
    }
}

/// What a harvest did
#[derive(Debug, Default, Serialize)]
pub struct HarvestReport {
    pub rounds: u64,
    pub collected: usize,
    pub forwarded: ForwardReport,
    /// Stopped by Ctrl-C rather than by the round limit
    pub interrupted: bool,
}

pub struct Harvester {
    collectors: Vec<Box<dyn Collector>>,
    forwarder: Forwarder,
    config: HarvesterConfig,
}

impl Harvester {
    pub fn new(forwarder: Forwarder, config: HarvesterConfig) -> Self {
        Self {
            collectors: Vec::new(),
            forwarder,
            config,
        }
    }

    pub fn add_collector(&mut self, collector: Box<dyn Collector>) {
        info!(
            "Registered collector {} ({})",
            collector.id(),
            collector.signal_type()
        );
        self.collectors.push(collector);
    }

    pub fn collector_count(&self) -> usize {
        self.collectors.len()
    }

    /// Run rounds until the limit or Ctrl-C
    pub async fn run(&mut self, target: &dyn IngestTarget) -> HarvestReport {
        let mut report = HarvestReport::default();
        let mut ticker = interval(self.config.interval.max(Duration::from_millis(1)));

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        info!(
            "Harvester starting with {} collectors",
            self.collectors.len()
        );

        loop {
            if self.config.max_rounds > 0 && report.rounds >= self.config.max_rounds {
                break;
            }

            let round = async {
                ticker.tick().await;
                self.run_round(target).await
            };

            tokio::select! {
                _ = &mut shutdown => {
                    warn!("Interrupted, stopping harvester");
                    report.interrupted = true;
                    break;
                }
                (collected, forwarded) = round => {
                    report.rounds += 1;
                    report.collected += collected;
                    report.forwarded.merge(forwarded);
                }
            }
        }

        info!(
            "Harvester finished: {} rounds, {} collected, {} accepted, {} failed",
            report.rounds,
            report.collected,
            report.forwarded.accepted(),
            report.forwarded.failed()
        );
        report
    }

    async fn run_round(&mut self, target: &dyn IngestTarget) -> (usize, ForwardReport) {
        let mut batch = Vec::new();

        for collector in &mut self.collectors {
            match collector.collect().await {
                Ok(candidates) => {
                    debug!(
                        "Collector {} produced {} candidates",
                        collector.id(),
                        candidates.len()
                    );
                    batch.extend(candidates);
                }
                Err(CollectorError::NoWork) => {
                    // Normal - nothing new this round
                }
                Err(CollectorError::NotReady(msg)) => {
                    debug!("Collector {} not ready: {}", collector.id(), msg);
                }
                Err(e) => {
                    error!("Collector {} error: {}", collector.id(), e);
                }
            }
        }

        let collected = batch.len();
        let mut seen = HashSet::new();
        batch.retain(|candidate| seen.insert(fingerprint(candidate)));
        if batch.len() < collected {
            debug!(
                "Dropped {} signals reported by more than one collector",
                collected - batch.len()
            );
        }

        let forwarded = self.forwarder.forward(target, batch).await;
        (collected, forwarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crisiswire_collectors::ForwardingError;
    use crisiswire_core::{Candidate, CollectorSettings, Sanitizer};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OneShotCollector {
        batches: Vec<Vec<Candidate>>,
    }

    #[async_trait]
    impl Collector for OneShotCollector {
        fn id(&self) -> &str {
            "one-shot"
        }

        fn signal_type(&self) -> &str {
            "feed"
        }

        async fn collect(&mut self) -> Result<Vec<Candidate>, CollectorError> {
            self.batches.pop().ok_or(CollectorError::NoWork)
        }
    }

    struct BrokenCollector;

    #[async_trait]
    impl Collector for BrokenCollector {
        fn id(&self) -> &str {
            "broken"
        }

        fn signal_type(&self) -> &str {
            "scrape"
        }

        async fn collect(&mut self) -> Result<Vec<Candidate>, CollectorError> {
            Err(CollectorError::Network("connection refused".to_string()))
        }
    }

    #[derive(Default)]
    struct CountingTarget {
        submitted: AtomicUsize,
    }

    #[async_trait]
    impl IngestTarget for CountingTarget {
        async fn submit(&self, _candidate: &Candidate) -> Result<String, ForwardingError> {
            let n = self.submitted.fetch_add(1, Ordering::SeqCst);
            Ok(format!("id-{n}"))
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    fn signal(title: &str) -> Candidate {
        Candidate::new()
            .with("title", title)
            .with("type", "Conflict")
            .with("severity", 55)
            .with("summary", "Shelling reported near border crossing")
            .with("sources", vec!["https://wire.example/border"])
    }

    #[tokio::test]
    async fn test_runs_bounded_rounds() {
        let forwarder = Forwarder::new(Sanitizer::default(), &CollectorSettings::default());
        let mut harvester = Harvester::new(
            forwarder,
            HarvesterConfig {
                interval: Duration::from_millis(10),
                max_rounds: 3,
            },
        );
        harvester.add_collector(Box::new(OneShotCollector {
            batches: vec![vec![signal("b")], vec![signal("a1"), signal("a2")]],
        }));
        harvester.add_collector(Box::new(BrokenCollector));
        assert_eq!(harvester.collector_count(), 2);

        let target = CountingTarget::default();
        let report = harvester.run(&target).await;

        assert_eq!(report.rounds, 3);
        assert_eq!(report.collected, 3);
        assert_eq!(report.forwarded.accepted(), 3);
        assert!(!report.interrupted);
        assert_eq!(target.submitted.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_round_forwards_shared_signal_once() {
        let forwarder = Forwarder::new(Sanitizer::default(), &CollectorSettings::default());
        let mut harvester = Harvester::new(
            forwarder,
            HarvesterConfig {
                interval: Duration::from_millis(10),
                max_rounds: 1,
            },
        );
        harvester.add_collector(Box::new(OneShotCollector {
            batches: vec![vec![signal("Border clash"), signal("Port closed")]],
        }));
        harvester.add_collector(Box::new(OneShotCollector {
            batches: vec![vec![signal("border clash ")]],
        }));

        let target = CountingTarget::default();
        let report = harvester.run(&target).await;

        assert_eq!(report.collected, 3);
        assert_eq!(report.forwarded.len(), 2);
        assert_eq!(target.submitted.load(Ordering::SeqCst), 2);
    }
}
