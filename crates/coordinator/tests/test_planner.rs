use multiscan_common::{DataSource, Error, FilterParams, ReaderSettings};
use multiscan_coordinator::{Partition, PartitionPlanner};
use std::collections::HashSet;

fn tables(count: usize) -> Vec<DataSource> {
    (0..count)
        .map(|i| DataSource::new(format!("mem://db{}", i % 2), "reader", "secret", format!("t{}", i)))
        .collect()
}

fn total_sources(partitions: &[Partition]) -> usize {
    partitions.iter().map(Partition::len).sum()
}

#[test]
fn test_even_split_reconstructs_sources() {
    for num_partitions in 1..=12 {
        for multiple in 1..=3 {
            let sources = tables(num_partitions * multiple);
            let partitions = PartitionPlanner::new()
                .plan(&sources, num_partitions, None)
                .unwrap();

            assert_eq!(partitions.len(), num_partitions);
            let flattened: Vec<DataSource> =
                partitions.into_iter().flat_map(|p| p.sources).collect();
            assert_eq!(flattened, sources);
            assert!(flattened.iter().all(|s| !s.split_by_key));
        }
    }
}

#[test]
fn test_every_source_assigned_once_without_split_key() {
    for num_sources in 1..=20 {
        for num_partitions in 1..=num_sources {
            let sources = tables(num_sources);
            let partitions = PartitionPlanner::new()
                .plan(&sources, num_partitions, None)
                .unwrap();

            assert_eq!(total_sources(&partitions), num_sources);
            let ids: HashSet<_> = partitions
                .iter()
                .flat_map(|p| p.sources.iter().map(|s| s.id))
                .collect();
            assert_eq!(ids.len(), num_sources);
        }
    }
}

#[test]
fn test_remainder_split_counts() {
    let sources = tables(7);
    let partitions = PartitionPlanner::new().plan(&sources, 3, Some("id")).unwrap();

    // base = 2, remainder = 1 cloned into each of the 3 partitions.
    assert_eq!(total_sources(&partitions), 3 * 2 + 3);
    for partition in &partitions {
        assert_eq!(partition.len(), 3);
        let clone = &partition.sources[2];
        assert_eq!(clone.table, "t6");
        assert!(clone.split_by_key);
    }
}

#[test]
fn test_full_split_is_disjoint_and_total() {
    let sources = tables(2);
    let num_partitions = 5;
    let partitions = PartitionPlanner::new()
        .plan(&sources, num_partitions, Some("id"))
        .unwrap();

    assert_eq!(partitions.len(), num_partitions);
    assert_eq!(total_sources(&partitions), num_partitions * sources.len());

    let params: Vec<FilterParams> = partitions
        .iter()
        .map(|p| {
            let first = p.sources[0].key_range().cloned().unwrap();
            assert!(p.sources.iter().all(|s| s.key_range() == Some(&first)));
            first
        })
        .collect();

    for key in 0i64..100 {
        let matching = params
            .iter()
            .filter(|p| key.rem_euclid(p.values()[0]) == p.values()[1])
            .count();
        assert_eq!(matching, 1);
    }

    let ids: HashSet<_> = partitions
        .iter()
        .flat_map(|p| p.sources.iter().map(|s| s.id))
        .collect();
    assert_eq!(ids.len(), num_partitions * sources.len());
}

#[test]
fn test_missing_split_key_fails_for_every_partition_count() {
    let sources = tables(3);
    for num_partitions in 4..10 {
        let err = PartitionPlanner::new()
            .plan(&sources, num_partitions, None)
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}

#[test]
fn test_partitions_round_trip_through_serde() {
    let partitions = PartitionPlanner::new()
        .plan(&tables(1), 2, Some("id"))
        .unwrap();
    let encoded = serde_json::to_string(&partitions).unwrap();
    let decoded: Vec<Partition> = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, partitions);
}

#[test]
fn test_plan_from_settings() {
    let settings = ReaderSettings::from_toml_str(
        r#"
        num_partitions = 2
        username = "reader"
        password = "secret"

        [[sources]]
        url = "mem://db1"
        table = "t1"

        [[sources]]
        url = "mem://db1"
        table = "t2"

        [[sources]]
        url = "mem://db2"
        table = "t3"
        "#,
    )
    .unwrap();

    let partitions = PartitionPlanner::new().plan_settings(&settings).unwrap();
    let names: Vec<Vec<&str>> = partitions
        .iter()
        .map(|p| p.sources.iter().map(|s| s.table.as_str()).collect())
        .collect();
    assert_eq!(names, vec![vec!["t1", "t3"], vec!["t2"]]);
}
