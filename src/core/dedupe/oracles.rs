//! Built-in distance oracles.

use super::{Comparison, DistanceOracle, Edge};
use crate::core::config::StageOptions;
use crate::core::item::Item;
use crate::error::{OracleError, StageError};
use image_hasher::{HashAlg, Hasher, HasherConfig, ImageHash};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};
use xxhash_rust::xxh3::xxh3_128;

pub(super) const ORACLE_KEY: &str = "oracle";
pub(super) const HASH_SIZE_KEY: &str = "hash_size";
const DEFAULT_HASH_SIZE: u32 = 8;

/// Build the oracle selected by the `oracle` option
///
/// `max_distance` lets an oracle skip reporting pairs that could never
/// qualify under the stage threshold.
pub(super) fn oracle_from_options(
    options: &StageOptions,
    max_distance: f64,
) -> Result<Box<dyn DistanceOracle>, StageError> {
    match options.str(ORACLE_KEY)?.unwrap_or("perceptual") {
        "perceptual" => {
            let hash_size = match options.u64(HASH_SIZE_KEY)? {
                None => DEFAULT_HASH_SIZE,
                Some(size @ 2..=64) => size as u32,
                Some(_) => {
                    return Err(StageError::InvalidOption {
                        key: HASH_SIZE_KEY.to_string(),
                        expected: "an integer between 2 and 64".to_string(),
                    })
                }
            };
            Ok(Box::new(
                PerceptualHashOracle::new(hash_size).with_max_distance(max_distance),
            ))
        }
        "exact" => Ok(Box::new(ContentDigestOracle)),
        _ => Err(StageError::InvalidOption {
            key: ORACLE_KEY.to_string(),
            expected: "'perceptual' or 'exact'".to_string(),
        }),
    }
}

/// Hamming distance between gradient hashes of the decoded images
///
/// Every pair of decodable items is compared. Items that fail to decode
/// contribute no edges.
pub struct PerceptualHashOracle {
    hasher: Hasher,
    max_distance: Option<f64>,
}

impl PerceptualHashOracle {
    pub fn new(hash_size: u32) -> Self {
        let hasher = HasherConfig::new()
            .hash_size(hash_size, hash_size)
            .hash_alg(HashAlg::Gradient)
            .to_hasher();

        Self {
            hasher,
            max_distance: None,
        }
    }

    /// Only report pairs at or below `max_distance`
    pub fn with_max_distance(mut self, max_distance: f64) -> Self {
        self.max_distance = Some(max_distance);
        self
    }

    fn hash(&self, item: &Item) -> Option<ImageHash> {
        match image::open(item.path()) {
            Ok(image) => Some(self.hasher.hash_image(&image)),
            Err(e) => {
                tracing::warn!(id = item.id(), error = %e, "cannot hash unreadable image");
                None
            }
        }
    }
}

impl DistanceOracle for PerceptualHashOracle {
    fn compare(&self, items: &[Item]) -> Result<Comparison, OracleError> {
        let hashes: Vec<Option<ImageHash>> = items.par_iter().map(|item| self.hash(item)).collect();

        let unreadable: BTreeSet<String> = items
            .iter()
            .zip(&hashes)
            .filter(|(_, hash)| hash.is_none())
            .map(|(item, _)| item.id().to_string())
            .collect();

        if !items.is_empty() && unreadable.len() == items.len() {
            return Err(OracleError::Failed(format!(
                "none of the {} items could be hashed",
                items.len()
            )));
        }

        let hashed: Vec<(&Item, &ImageHash)> = items
            .iter()
            .zip(&hashes)
            .filter_map(|(item, hash)| hash.as_ref().map(|h| (item, h)))
            .collect();

        let edges: Vec<Edge> = (0..hashed.len())
            .into_par_iter()
            .flat_map_iter(|i| {
                let (item_a, hash_a) = hashed[i];
                hashed[i + 1..].iter().filter_map(move |(item_b, hash_b)| {
                    let distance = f64::from(hash_a.dist(hash_b));
                    let within = self.max_distance.is_none_or(|max| distance <= max);
                    within.then(|| Edge::new(item_a.id(), item_b.id(), distance))
                })
            })
            .collect();

        tracing::debug!(
            hashed = hashed.len(),
            unreadable = unreadable.len(),
            edges = edges.len(),
            "perceptual comparison finished"
        );

        Ok(Comparison { edges, unreadable })
    }
}

/// Byte-identical detection via xxh3-128 content digests
///
/// Items sharing a digest are chained with distance-0 edges.
pub struct ContentDigestOracle;

impl DistanceOracle for ContentDigestOracle {
    fn compare(&self, items: &[Item]) -> Result<Comparison, OracleError> {
        let digests: Vec<Option<u128>> = items
            .par_iter()
            .map(|item| match std::fs::read(item.path()) {
                Ok(bytes) => Some(xxh3_128(&bytes)),
                Err(e) => {
                    tracing::warn!(id = item.id(), error = %e, "cannot read item content");
                    None
                }
            })
            .collect();

        let mut unreadable = BTreeSet::new();
        let mut buckets: HashMap<u128, Vec<&str>> = HashMap::new();
        for (item, digest) in items.iter().zip(digests) {
            match digest {
                Some(digest) => buckets.entry(digest).or_default().push(item.id()),
                None => {
                    unreadable.insert(item.id().to_string());
                }
            }
        }

        if !items.is_empty() && unreadable.len() == items.len() {
            return Err(OracleError::Failed(format!(
                "none of the {} items could be read",
                items.len()
            )));
        }

        let edges = buckets
            .values()
            .flat_map(|ids| ids.windows(2).map(|pair| Edge::new(pair[0], pair[1], 0.0)))
            .collect();

        Ok(Comparison { edges, unreadable })
    }
}
