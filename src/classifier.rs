//! Exemplar-based k-NN classification.
//!
//! A query takes the majority label among its `k` nearest exemplars. When
//! several labels share the top vote count, the one whose voters are closer in
//! total wins; if the totals are equal too, the lexicographically smallest label
//! wins. Neighbour selection itself breaks distance ties by ascending id, so a
//! classification is fully deterministic.

use std::collections::{BTreeMap, HashMap};

use log::{debug, info, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::{FeatureSpace, ItemId, LabelTable};
use crate::distance::{check_finite, cmp_distance_then_id, DistanceMetric};
use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Exemplar {
    pub id: ItemId,
    pub label: String,
    pub vector: Vec<f64>,
}

/// Labelled reference vectors.
#[derive(Clone, Debug, Default)]
pub struct ExemplarSet {
    exemplars: Vec<Exemplar>,
    nfeatures: usize,
}

impl ExemplarSet {
    /// Fails with `DimensionMismatch` if the vectors differ in length.
    pub fn new(exemplars: Vec<Exemplar>) -> Result<Self> {
        let nfeatures = exemplars.first().map(|e| e.vector.len()).unwrap_or(0);
        if let Some(bad) = exemplars.iter().find(|e| e.vector.len() != nfeatures) {
            return Err(Error::DimensionMismatch { expected: nfeatures, found: bad.vector.len() });
        }
        Ok(Self { exemplars, nfeatures })
    }

    /// Attach each labelled id to its vector in `space`.
    ///
    /// Fails with `InconsistentIndex` if a labelled id has no vector.
    pub fn from_labels(space: &FeatureSpace, labels: &LabelTable) -> Result<Self> {
        let exemplars = labels
            .iter()
            .map(|(id, label)| {
                let vector = space.vector(id).map_err(|_| {
                    Error::InconsistentIndex(format!("labelled item {} has no feature vector", id))
                })?;
                Ok(Exemplar { id: id.clone(), label: label.clone(), vector: vector.to_vec() })
            })
            .collect::<Result<Vec<_>>>()?;
        debug!("ExemplarSet: {} exemplars from label table", exemplars.len());
        Self::new(exemplars)
    }

    pub fn len(&self) -> usize {
        self.exemplars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exemplars.is_empty()
    }

    pub fn nfeatures(&self) -> usize {
        self.nfeatures
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.exemplars.iter().any(|e| &e.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Exemplar> {
        self.exemplars.iter()
    }

    /// Distinct labels, sorted.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.exemplars.iter().map(|e| e.label.as_str()).collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    }
}

/// Outcome of one classification.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub label: String,
    /// The `k` nearest exemplars as `(id, label, distance)`, ascending.
    pub neighbours: Vec<(ItemId, String, f64)>,
}

impl Classification {
    /// Neighbours that voted for the winning label.
    pub fn support(&self) -> usize {
        self.neighbours.iter().filter(|(_, l, _)| *l == self.label).count()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifierParams {
    pub k: usize,
    pub metric: DistanceMetric,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self { k: 3, metric: DistanceMetric::Euclidean }
    }
}

/// Classify `query` against `exemplars` with the `k` nearest.
///
/// Fails with `InvalidParameter` if `k == 0`, `InsufficientData` if
/// `k > |exemplars|`, and `DimensionMismatch` on a query of the wrong length.
pub fn classify(
    query: &[f64],
    exemplars: &ExemplarSet,
    k: usize,
    metric: DistanceMetric,
) -> Result<Classification> {
    metric.validate()?;
    if k == 0 {
        return Err(Error::invalid("k", "must be at least 1"));
    }
    if k > exemplars.len() {
        return Err(Error::InsufficientData { requested: k, available: exemplars.len() });
    }
    if query.len() != exemplars.nfeatures() {
        return Err(Error::DimensionMismatch { expected: exemplars.nfeatures(), found: query.len() });
    }
    check_finite("query", query)?;

    let mut scored: Vec<((ItemId, f64), &str)> = exemplars
        .iter()
        .map(|e| ((e.id.clone(), metric.distance_unchecked(query, &e.vector)), e.label.as_str()))
        .collect();
    scored.sort_by(|a, b| cmp_distance_then_id(&a.0, &b.0));
    scored.truncate(k);

    // label -> (votes, total distance); BTreeMap keeps the final tie-break ordered
    let mut tally: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for ((_, d), label) in &scored {
        let entry = tally.entry(*label).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += d;
    }
    let mut winner: Option<(&str, usize, f64)> = None;
    for (label, (votes, total)) in tally {
        let better = match winner {
            None => true,
            Some((_, best_votes, best_total)) => {
                votes > best_votes || (votes == best_votes && total < best_total)
            }
        };
        if better {
            winner = Some((label, votes, total));
        }
    }
    let label = winner.map(|(l, _, _)| l.to_string()).unwrap_or_default();
    trace!("Classified as {:?} from {} neighbours", label, scored.len());

    Ok(Classification {
        label,
        neighbours: scored
            .into_iter()
            .map(|((id, d), l)| (id, l.to_string(), d))
            .collect(),
    })
}

/// k-NN classifier over an exemplar set.
#[derive(Clone, Debug, Default)]
pub struct ExemplarClassifier {
    params: ClassifierParams,
}

impl ExemplarClassifier {
    pub fn new(params: ClassifierParams) -> Self {
        Self { params }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.params.k = k;
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.params.metric = metric;
        self
    }

    pub fn params(&self) -> &ClassifierParams {
        &self.params
    }

    pub fn classify(&self, query: &[f64], exemplars: &ExemplarSet) -> Result<Classification> {
        classify(query, exemplars, self.params.k, self.params.metric)
    }

    /// Classify the stored vector of `id`.
    pub fn classify_item(
        &self,
        space: &FeatureSpace,
        id: &ItemId,
        exemplars: &ExemplarSet,
    ) -> Result<Classification> {
        self.classify(space.vector(id)?, exemplars)
    }

    /// Label every item of `space` that is not itself an exemplar.
    pub fn classify_all(
        &self,
        space: &FeatureSpace,
        exemplars: &ExemplarSet,
    ) -> Result<HashMap<ItemId, String>> {
        let unlabeled: Vec<usize> = (0..space.len())
            .filter(|&i| !exemplars.contains(&space.ids()[i]))
            .collect();
        info!(
            "Classifying {} unlabeled items against {} exemplars (k={})",
            unlabeled.len(),
            exemplars.len(),
            self.params.k
        );

        let labels = unlabeled
            .par_iter()
            .map(|&i| {
                let c = self.classify(space.row(i), exemplars)?;
                Ok((space.ids()[i].clone(), c.label))
            })
            .collect::<Result<HashMap<ItemId, String>>>()?;

        debug!("Classified {} items", labels.len());
        Ok(labels)
    }
}
