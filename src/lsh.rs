//! Multi-layer locality-sensitive hashing for approximate nearest-neighbour
//! candidate retrieval.
//!
//! An index has `L` layers; each layer draws `H` hash functions from one family
//! and maps the composite signature `(h_1(v), .., h_H(v))` of every item to a
//! bucket. A query probes one bucket per layer and returns the union of what it
//! finds, re-ranked by true distance.
//!
//! - `HashFamily::PStable { width }`: `h(v) = floor((a·v + b) / width)` with
//!   `a ~ N(0, I)` and `b ~ U[0, width)`; collisions track Euclidean distance.
//! - `HashFamily::RandomHyperplane`: `h(v) = [a·v >= 0]`; collisions track angle,
//!   so results are re-ranked by cosine distance.
//!
//! More hashes per layer make buckets more selective (fewer false positives,
//! lower per-layer recall); more layers recover recall. A query with the exact
//! vector of an indexed item always hits that item's bucket in every layer.
//!
//! The index is an immutable snapshot: rebuild it when the feature space changes.

use std::collections::{HashMap, HashSet};
use std::fmt;

use log::{debug, info, trace};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::{FeatureSpace, ItemId};
use crate::distance::{check_finite, cmp_distance_then_id, dot, DistanceMetric};
use crate::error::{Error, Result};

/// Hash function family of an index.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum HashFamily {
    /// Quantised Gaussian projections (Euclidean).
    PStable { width: f64 },
    /// Sign of a Gaussian projection (cosine).
    RandomHyperplane,
}

impl Default for HashFamily {
    fn default() -> Self {
        HashFamily::PStable { width: 4.0 }
    }
}

impl HashFamily {
    /// Metric used to re-rank candidates.
    pub fn metric(&self) -> DistanceMetric {
        match self {
            HashFamily::PStable { .. } => DistanceMetric::Euclidean,
            HashFamily::RandomHyperplane => DistanceMetric::Cosine,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LshParams {
    pub layers: usize,
    pub hashes_per_layer: usize,
    pub family: HashFamily,
    pub seed: u64,
}

impl Default for LshParams {
    fn default() -> Self {
        Self { layers: 8, hashes_per_layer: 4, family: HashFamily::default(), seed: 42 }
    }
}

impl LshParams {
    pub fn new(layers: usize, hashes_per_layer: usize) -> Self {
        Self { layers, hashes_per_layer, ..Self::default() }
    }

    pub fn with_family(mut self, family: HashFamily) -> Self {
        self.family = family;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.layers == 0 {
            return Err(Error::invalid("layers", "must be at least 1"));
        }
        if self.hashes_per_layer == 0 {
            return Err(Error::invalid("hashes_per_layer", "must be at least 1"));
        }
        if let HashFamily::PStable { width } = self.family {
            if !(width.is_finite() && width > 0.0) {
                return Err(Error::invalid(
                    "width",
                    format!("bucket width must be positive, got {}", width),
                ));
            }
        }
        Ok(())
    }
}

/// One hash table: `H` projections and the buckets they induce.
#[derive(Clone, Debug)]
struct HashLayer {
    // H x d, row-major
    projections: Vec<f64>,
    offsets: Vec<f64>,
    buckets: HashMap<Vec<i64>, Vec<usize>>,
}

impl HashLayer {
    fn sample(seed: u64, nhashes: usize, dim: usize, family: HashFamily) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let projections: Vec<f64> = (0..nhashes * dim)
            .map(|_| StandardNormal.sample(&mut rng))
            .collect();
        let offsets: Vec<f64> = match family {
            HashFamily::PStable { width } => {
                (0..nhashes).map(|_| rng.random::<f64>() * width).collect()
            }
            HashFamily::RandomHyperplane => vec![0.0; nhashes],
        };
        Self { projections, offsets, buckets: HashMap::new() }
    }

    fn signature(&self, v: &[f64], family: HashFamily) -> Vec<i64> {
        let dim = v.len();
        self.offsets
            .iter()
            .enumerate()
            .map(|(h, &b)| {
                let projected = dot(&self.projections[h * dim..(h + 1) * dim], v);
                match family {
                    HashFamily::PStable { width } => ((projected + b) / width).floor() as i64,
                    HashFamily::RandomHyperplane => i64::from(projected >= 0.0),
                }
            })
            .collect()
    }
}

/// Per-query probe counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueryStats {
    /// Layers whose bucket for the query signature was non-empty.
    pub buckets_probed: usize,
    /// Candidates summed over layers, duplicates included.
    pub overall_candidates: usize,
    /// Distinct candidates after merging layers.
    pub unique_candidates: usize,
}

impl fmt::Display for QueryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} buckets probed, {} overall candidates, {} unique",
            self.buckets_probed, self.overall_candidates, self.unique_candidates
        )
    }
}

/// Immutable LSH index over a feature space.
#[derive(Clone, Debug)]
pub struct LshIndex {
    params: LshParams,
    space: FeatureSpace,
    layers: Vec<HashLayer>,
}

impl LshIndex {
    /// Index every vector of `space`.
    ///
    /// Layers are hashed independently on the rayon pool; layer `l` draws its
    /// functions from `seed + l`, so a build is reproducible.
    pub fn build(space: &FeatureSpace, params: LshParams) -> Result<Self> {
        params.validate()?;
        let dim = space.nfeatures();
        info!(
            "Building LSH index: {} items, {} layers x {} hashes ({:?})",
            space.len(),
            params.layers,
            params.hashes_per_layer,
            params.family
        );

        let layers: Vec<HashLayer> = (0..params.layers)
            .into_par_iter()
            .map(|l| {
                let mut layer = HashLayer::sample(
                    params.seed.wrapping_add(l as u64),
                    params.hashes_per_layer,
                    dim,
                    params.family,
                );
                for i in 0..space.len() {
                    let key = layer.signature(space.row(i), params.family);
                    layer.buckets.entry(key).or_default().push(i);
                }
                trace!("Layer {}: {} buckets", l, layer.buckets.len());
                layer
            })
            .collect();

        let index = Self { params, space: space.clone(), layers };
        debug!(
            "LSH index ready: {} buckets total, largest bucket {}",
            index.bucket_count(),
            index.max_bucket_size()
        );
        Ok(index)
    }

    pub fn params(&self) -> &LshParams {
        &self.params
    }

    /// Number of indexed items.
    pub fn len(&self) -> usize {
        self.space.len()
    }

    pub fn is_empty(&self) -> bool {
        self.space.is_empty()
    }

    /// Non-empty buckets across all layers.
    pub fn bucket_count(&self) -> usize {
        self.layers.iter().map(|l| l.buckets.len()).sum()
    }

    pub fn max_bucket_size(&self) -> usize {
        self.layers
            .iter()
            .flat_map(|l| l.buckets.values().map(Vec::len))
            .max()
            .unwrap_or(0)
    }

    fn check_query(&self, vector: &[f64]) -> Result<()> {
        if vector.len() != self.space.nfeatures() {
            return Err(Error::DimensionMismatch {
                expected: self.space.nfeatures(),
                found: vector.len(),
            });
        }
        check_finite("query", vector)
    }

    fn probe(&self, vector: &[f64]) -> (Vec<usize>, QueryStats) {
        let mut stats = QueryStats::default();
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for layer in &self.layers {
            let key = layer.signature(vector, self.params.family);
            if let Some(bucket) = layer.buckets.get(&key) {
                stats.buckets_probed += 1;
                stats.overall_candidates += bucket.len();
                unique.extend(bucket.iter().copied().filter(|i| seen.insert(*i)));
            }
        }
        stats.unique_candidates = unique.len();
        (unique, stats)
    }

    /// Distinct ids sharing a bucket with `vector` in at least one layer,
    /// unranked, in index order.
    pub fn candidates(&self, vector: &[f64]) -> Result<Vec<ItemId>> {
        self.check_query(vector)?;
        let (mut found, _) = self.probe(vector);
        found.sort_unstable();
        Ok(found.into_iter().map(|i| self.space.ids()[i].clone()).collect())
    }

    /// Up to `t` candidates ranked by true distance (ties by id).
    pub fn query(&self, vector: &[f64], t: usize) -> Result<Vec<(ItemId, f64)>> {
        self.query_with_stats(vector, t).map(|(ranked, _)| ranked)
    }

    /// `query` plus probe counts.
    pub fn query_with_stats(
        &self,
        vector: &[f64],
        t: usize,
    ) -> Result<(Vec<(ItemId, f64)>, QueryStats)> {
        if t == 0 {
            return Err(Error::invalid("t", "must be at least 1"));
        }
        self.check_query(vector)?;
        let (found, stats) = self.probe(vector);
        let metric = self.params.family.metric();

        let mut ranked: Vec<(ItemId, f64)> = found
            .into_iter()
            .map(|i| {
                (
                    self.space.ids()[i].clone(),
                    metric.distance_unchecked(vector, self.space.row(i)),
                )
            })
            .collect();
        ranked.sort_by(cmp_distance_then_id);
        ranked.truncate(t);
        debug!("LSH query: {}", stats);
        Ok((ranked, stats))
    }

    /// Query with the stored vector of `id`; the item itself is included.
    pub fn query_item(&self, id: &ItemId, t: usize) -> Result<Vec<(ItemId, f64)>> {
        let vector = self.space.vector(id)?;
        self.query(vector, t)
    }
}
