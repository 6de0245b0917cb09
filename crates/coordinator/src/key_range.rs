use multiscan_common::{FilterParams, Result};

/// Produces one filter-parameter set per partition.
///
/// Implementations must be deterministic and the returned predicates must be
/// pairwise disjoint and together cover every row of any table they are
/// applied to.
pub trait KeyRangeGenerator: Send + Sync {
    fn generate(&self, num_partitions: usize) -> Result<Vec<FilterParams>>;
}

/// Splits on `mod(split_key, n) = j`, producing `[n, j]` for partition `j`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModuloKeyRange;

impl KeyRangeGenerator for ModuloKeyRange {
    fn generate(&self, num_partitions: usize) -> Result<Vec<FilterParams>> {
        let n = num_partitions as i64;
        Ok((0..n).map(|j| FilterParams::new(vec![n, j])).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_modulo_ranges_cover_all_keys_once() {
        let params = ModuloKeyRange.generate(4).unwrap();
        assert_eq!(params.len(), 4);

        for key in -20i64..20 {
            let matching = params
                .iter()
                .filter(|p| key.rem_euclid(p.values()[0]) == p.values()[1])
                .count();
            assert_eq!(matching, 1, "key {} matched {} ranges", key, matching);
        }
    }

    #[test]
    fn test_modulo_ranges_are_deterministic() {
        let a = ModuloKeyRange.generate(3).unwrap();
        let b = ModuloKeyRange.generate(3).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.iter().collect::<HashSet<_>>().len(), 3);
    }
}
