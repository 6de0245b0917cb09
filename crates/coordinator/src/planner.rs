//! Assigns sources to a fixed number of partitions.

use crate::key_range::{KeyRangeGenerator, ModuloKeyRange};
use multiscan_common::{DataSource, Error, FilterParams, ReaderSettings, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// The ordered list of sources one worker reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub index: usize,
    pub sources: Vec<DataSource>,
}

impl Partition {
    fn new(index: usize, sources: Vec<DataSource>) -> Self {
        Self { index, sources }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Plans the partition layout once, before any worker starts.
#[derive(Debug, Default)]
pub struct PartitionPlanner<G = ModuloKeyRange> {
    key_ranges: G,
}

impl PartitionPlanner<ModuloKeyRange> {
    pub fn new() -> Self {
        Self {
            key_ranges: ModuloKeyRange,
        }
    }
}

impl<G: KeyRangeGenerator> PartitionPlanner<G> {
    pub fn with_key_ranges(key_ranges: G) -> Self {
        Self { key_ranges }
    }

    /// Plans partitions for the sources and split key described by settings.
    pub fn plan_settings(&self, settings: &ReaderSettings) -> Result<Vec<Partition>> {
        self.plan(
            &settings.data_sources(),
            settings.num_partitions,
            settings.split_key(),
        )
    }

    /// Splits `sources` into exactly `num_partitions` partitions.
    ///
    /// With at least as many sources as partitions, whole sources are handed
    /// out in contiguous groups and only the leftover sources are either
    /// assigned one per partition (no split key) or key-range split across
    /// every partition. With fewer sources than partitions every source is
    /// key-range split, which requires a split key.
    pub fn plan(
        &self,
        sources: &[DataSource],
        num_partitions: usize,
        split_key: Option<&str>,
    ) -> Result<Vec<Partition>> {
        if num_partitions == 0 {
            return Err(Error::configuration("partition count must be at least 1"));
        }
        let split_key = split_key.filter(|key| !key.is_empty());

        let partitions = if sources.len() >= num_partitions {
            self.plan_by_source(sources, num_partitions, split_key)?
        } else {
            if split_key.is_none() {
                return Err(Error::configuration(
                    "split key required when source count < partition count",
                ));
            }
            let params = self.key_ranges(num_partitions)?;
            params
                .into_iter()
                .enumerate()
                .map(|(j, p)| Partition::new(j, key_range_clones(sources, &p)))
                .collect()
        };

        info!(
            sources = sources.len(),
            partitions = num_partitions,
            assigned = partitions.iter().map(Partition::len).sum::<usize>(),
            split_key = split_key.unwrap_or(""),
            "planned partitions"
        );
        Ok(partitions)
    }

    fn plan_by_source(
        &self,
        sources: &[DataSource],
        num_partitions: usize,
        split_key: Option<&str>,
    ) -> Result<Vec<Partition>> {
        let base = sources.len() / num_partitions;
        let mut partitions: Vec<Partition> = (0..num_partitions)
            .map(|j| Partition::new(j, sources[j * base..(j + 1) * base].to_vec()))
            .collect();

        let remainder = &sources[num_partitions * base..];
        if remainder.is_empty() {
            return Ok(partitions);
        }

        match split_key {
            None => {
                if remainder.len() > num_partitions {
                    return Err(Error::configuration(format!(
                        "{} leftover sources cannot be assigned to {} partitions",
                        remainder.len(),
                        num_partitions
                    )));
                }
                for (partition, source) in partitions.iter_mut().zip(remainder) {
                    partition.sources.push(source.clone());
                }
            }
            Some(_) => {
                let params = self.key_ranges(num_partitions)?;
                for (partition, p) in partitions.iter_mut().zip(params) {
                    debug!(partition = partition.index, params = ?p.values(), "splitting leftover sources");
                    partition.sources.extend(key_range_clones(remainder, &p));
                }
            }
        }

        Ok(partitions)
    }

    fn key_ranges(&self, num_partitions: usize) -> Result<Vec<FilterParams>> {
        let params = self.key_ranges.generate(num_partitions)?;
        if params.len() != num_partitions {
            return Err(Error::configuration(format!(
                "key-range generator returned {} ranges for {} partitions",
                params.len(),
                num_partitions
            )));
        }
        Ok(params)
    }
}

fn key_range_clones(sources: &[DataSource], params: &FilterParams) -> Vec<DataSource> {
    sources
        .iter()
        .map(|s| s.key_range_clone(params.clone()))
        .collect()
}
