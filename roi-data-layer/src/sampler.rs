//! Shuffled index batches over the example store.

use crate::{common::*, config::OverlapThresholds, example::ExampleStore};

/// Selects which examples take part in the permutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SamplingPolicy {
    /// Only examples having both foreground and background regions.
    Eligible,
    /// Every example in the store.
    All,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self::Eligible
    }
}

/// Produces fixed-size batches of example indices from a shuffled
/// permutation, reshuffling when the permutation runs out.
#[derive(Debug)]
pub struct IndexSampler {
    store: Arc<ExampleStore>,
    thresholds: OverlapThresholds,
    policy: SamplingPolicy,
    batch_size: usize,
    rng: StdRng,
    perm: Vec<usize>,
    cursor: usize,
}

impl IndexSampler {
    /// Creates a sampler and draws its first permutation.
    pub fn new(
        store: Arc<ExampleStore>,
        thresholds: OverlapThresholds,
        policy: SamplingPolicy,
        batch_size: NonZeroUsize,
        seed: u64,
    ) -> Result<Self> {
        let mut sampler = Self {
            store,
            thresholds,
            policy,
            batch_size: batch_size.get(),
            rng: StdRng::seed_from_u64(seed),
            perm: vec![],
            cursor: 0,
        };
        sampler.reshuffle()?;
        Ok(sampler)
    }

    /// Permutes all example positions, keeps the ones allowed by the
    /// sampling policy and rewinds the cursor.
    ///
    /// The relative order of the kept positions is the one of the fresh
    /// permutation. It fails if fewer examples than the batch size remain,
    /// in which case the previous permutation is left untouched.
    pub fn reshuffle(&mut self) -> Result<()> {
        let mut perm: Vec<usize> = (0..self.store.len()).collect();
        perm.shuffle(&mut self.rng);

        if let SamplingPolicy::Eligible = self.policy {
            let eligible = self.store.eligible_mask(&self.thresholds);
            perm.retain(|&index| eligible[index]);
        }

        ensure!(
            !perm.is_empty(),
            "no eligible examples among {} examples in the store",
            self.store.len()
        );
        ensure!(
            perm.len() >= self.batch_size,
            "only {} eligible examples, fewer than the batch size {}",
            perm.len(),
            self.batch_size
        );

        debug!(
            "reshuffled {} of {} examples",
            perm.len(),
            self.store.len()
        );
        self.perm = perm;
        self.cursor = 0;
        Ok(())
    }

    /// Returns the next batch of example indices.
    pub fn next_indices(&mut self) -> Result<&[usize]> {
        if self.cursor + self.batch_size >= self.perm.len() {
            self.reshuffle()?;
        }

        let range = self.cursor..(self.cursor + self.batch_size);
        self.cursor += self.batch_size;
        Ok(&self.perm[range])
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn policy(&self) -> SamplingPolicy {
        self.policy
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn permutation(&self) -> &[usize] {
        &self.perm
    }

    pub fn store(&self) -> &Arc<ExampleStore> {
        &self.store
    }
}
