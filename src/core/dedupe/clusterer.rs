//! The dedupe stage: clusters the whole entering set during setup, then
//! keeps only each cluster's canonical member.

use super::oracles::oracle_from_options;
use super::{DistanceOracle, DuplicateClusters};
use crate::core::config::StageOptions;
use crate::core::item::Item;
use crate::core::stage::{Decision, Stage, StageKind};
use crate::error::StageError;
use std::collections::BTreeSet;

const THRESHOLD_KEY: &str = "threshold";

/// Near-duplicate consolidation stage
pub struct DuplicateClusterer {
    name: String,
    options: StageOptions,
    oracle: Option<Box<dyn DistanceOracle>>,
    state: Option<Ready>,
}

struct Ready {
    clusters: DuplicateClusters,
    unreadable: BTreeSet<String>,
}

impl DuplicateClusterer {
    /// Stage whose oracle is chosen by the `oracle` option
    pub fn new(name: impl Into<String>, options: StageOptions) -> Self {
        Self {
            name: name.into(),
            options,
            oracle: None,
            state: None,
        }
    }

    /// Stage with an explicitly supplied oracle
    pub fn with_oracle(
        name: impl Into<String>,
        options: StageOptions,
        oracle: Box<dyn DistanceOracle>,
    ) -> Self {
        Self {
            oracle: Some(oracle),
            ..Self::new(name, options)
        }
    }

    /// Clusters computed by the last `setup`
    pub fn clusters(&self) -> Option<&DuplicateClusters> {
        self.state.as_ref().map(|ready| &ready.clusters)
    }

    fn threshold(&self) -> Result<f64, StageError> {
        let threshold = self.options.require_f64(THRESHOLD_KEY)?;
        if threshold < 0.0 {
            return Err(StageError::InvalidOption {
                key: THRESHOLD_KEY.to_string(),
                expected: "a non-negative number".to_string(),
            });
        }
        Ok(threshold)
    }
}

impl Stage for DuplicateClusterer {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Dedupe
    }

    fn setup(&mut self, items: &[Item]) -> Result<(), StageError> {
        let threshold = self.threshold()?;
        if self.oracle.is_none() {
            self.oracle = Some(oracle_from_options(&self.options, threshold)?);
        }
        let oracle = self.oracle.as_ref().ok_or(StageError::NotReady)?;

        let comparison = oracle.compare(items).map_err(StageError::OracleFailed)?;

        // Unreadable items are dropped outright, so they never anchor a cluster
        let ids: Vec<&str> = items
            .iter()
            .map(Item::id)
            .filter(|id| !comparison.unreadable.contains(*id))
            .collect();
        let clusters = DuplicateClusters::from_edges(&ids, &comparison.edges, threshold);

        tracing::info!(
            stage = %self.name,
            items = items.len(),
            clusters = clusters.clusters().len(),
            duplicates = clusters.duplicate_count(),
            unreadable = comparison.unreadable.len(),
            "duplicate clusters computed"
        );

        self.state = Some(Ready {
            clusters,
            unreadable: comparison.unreadable,
        });
        Ok(())
    }

    fn decide(&self, item: &Item) -> Result<Decision, StageError> {
        let ready = self.state.as_ref().ok_or(StageError::NotReady)?;

        if ready.unreadable.contains(item.id()) {
            return Ok(Decision::drop("unreadable image"));
        }

        Ok(match ready.clusters.canonical_of(item.id()) {
            Some(canonical) if canonical != item.id() => {
                Decision::drop(format!("duplicate of {canonical}"))
            }
            _ => Decision::keep(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dedupe::{Comparison, Edge};
    use crate::error::OracleError;

    /// Replays a fixed comparison regardless of the items
    struct FixedOracle(Result<Comparison, OracleError>);

    impl DistanceOracle for FixedOracle {
        fn compare(&self, _items: &[Item]) -> Result<Comparison, OracleError> {
            self.0.clone()
        }
    }

    fn items(ids: &[&str]) -> Vec<Item> {
        ids.iter().map(|id| Item::new(*id, format!("/in/{id}"))).collect()
    }

    fn clusterer(threshold: f64, comparison: Comparison) -> DuplicateClusterer {
        DuplicateClusterer::with_oracle(
            "dedupe",
            StageOptions::new().with(THRESHOLD_KEY, threshold),
            Box::new(FixedOracle(Ok(comparison))),
        )
    }

    fn keeps(stage: &DuplicateClusterer, items: &[Item]) -> Vec<String> {
        items
            .iter()
            .filter(|item| stage.decide(item).unwrap().keep)
            .map(|item| item.id().to_string())
            .collect()
    }

    #[test]
    fn keeps_one_member_per_cluster() {
        let items = items(&["A", "B", "C", "D", "E"]);
        let edges = vec![
            Edge::new("A", "B", 3.0),
            Edge::new("B", "C", 5.0),
            Edge::new("C", "D", 20.0),
        ];
        let mut stage = clusterer(10.0, edges.into());
        stage.setup(&items).unwrap();

        assert_eq!(keeps(&stage, &items), vec!["A", "D", "E"]);
        assert_eq!(
            stage.decide(&items[2]).unwrap(),
            Decision::drop("duplicate of A")
        );
    }

    #[test]
    fn identical_pair_with_zero_threshold() {
        let items = items(&["x.png", "y.png"]);
        let mut stage = clusterer(0.0, vec![Edge::new("y.png", "x.png", 0.0)].into());
        stage.setup(&items).unwrap();

        assert_eq!(keeps(&stage, &items), vec!["x.png"]);
    }

    #[test]
    fn empty_set_is_fine() {
        let mut stage = clusterer(10.0, Comparison::default());
        stage.setup(&[]).unwrap();
        assert!(stage.clusters().unwrap().clusters().is_empty());
    }

    #[test]
    fn unreadable_items_are_dropped_and_never_canonical() {
        let items = items(&["a", "b", "c"]);
        let comparison = Comparison {
            edges: vec![Edge::new("a", "b", 0.0), Edge::new("b", "c", 0.0)],
            unreadable: BTreeSet::from(["a".to_string()]),
        };
        let mut stage = clusterer(1.0, comparison);
        stage.setup(&items).unwrap();

        assert_eq!(
            stage.decide(&items[0]).unwrap(),
            Decision::drop("unreadable image")
        );
        assert_eq!(keeps(&stage, &items), vec!["b"]);
    }

    #[test]
    fn threshold_is_required_and_non_negative() {
        let mut missing = DuplicateClusterer::with_oracle(
            "dedupe",
            StageOptions::new(),
            Box::new(FixedOracle(Ok(Comparison::default()))),
        );
        assert!(matches!(
            missing.setup(&[]),
            Err(StageError::MissingOption { .. })
        ));

        let mut negative = clusterer(-1.0, Comparison::default());
        assert!(matches!(
            negative.setup(&[]),
            Err(StageError::InvalidOption { .. })
        ));
    }

    #[test]
    fn oracle_failure_is_fatal() {
        let mut stage = DuplicateClusterer::with_oracle(
            "dedupe",
            StageOptions::new().with(THRESHOLD_KEY, 5),
            Box::new(FixedOracle(Err(OracleError::Failed("backend down".to_string())))),
        );

        assert!(matches!(
            stage.setup(&items(&["a"])),
            Err(StageError::OracleFailed(_))
        ));
    }

    #[test]
    fn decide_before_setup_is_an_error() {
        let stage = clusterer(1.0, Comparison::default());
        assert!(matches!(
            stage.decide(&items(&["a"])[0]),
            Err(StageError::NotReady)
        ));
    }
}
