use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use spoof_sentry::core::geo::haversine_distance;
use spoof_sentry::{DatasetAssembler, DatasetSpec, LabeledDataset, SequentialRuleDetector};
use std::collections::HashMap;
use uuid::Uuid;

fn dataset(seed: u64, rows: usize, spoof_rate: f64) -> LabeledDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let spec = DatasetSpec {
        rows,
        spoof_rate,
        base_lat: 40.7128,
        base_lon: -74.006,
        start_time: 1_700_000_000,
    };
    DatasetAssembler::new(&mut rng).assemble(&mut rng, &spec)
}

proptest! {
    #[test]
    fn test_distance_is_symmetric(
        lat1 in -90.0f64..90.0,
        lon1 in -180.0f64..180.0,
        lat2 in -90.0f64..90.0,
        lon2 in -180.0f64..180.0,
    ) {
        let ab = haversine_distance(lat1, lon1, lat2, lon2).unwrap();
        let ba = haversine_distance(lat2, lon2, lat1, lon1).unwrap();
        prop_assert!((ab - ba).abs() < 1e-6);
        prop_assert!(ab >= 0.0);
    }

    #[test]
    fn test_distance_to_self_is_zero(
        lat in -90.0f64..90.0,
        lon in -180.0f64..180.0,
    ) {
        prop_assert_eq!(haversine_distance(lat, lon, lat, lon), Some(0.0));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_detection_ignores_row_order(
        seed in any::<u64>(),
        shuffle_seed in any::<u64>(),
        rows in 50usize..400,
    ) {
        let records = dataset(seed, rows, 0.4).unlabeled();
        let mut shuffled = records.clone();
        shuffled.shuffle(&mut StdRng::seed_from_u64(shuffle_seed));

        let detector = SequentialRuleDetector::default();
        let a = detector.detect(&records);
        let b = detector.detect(&shuffled);
        prop_assert_eq!(a.predictions, b.predictions);
        prop_assert_eq!(a.fired_rules, b.fired_rules);
    }

    #[test]
    fn test_label_is_constant_per_device(
        seed in any::<u64>(),
        rows in 25usize..600,
        spoof_rate in 0.05f64..=1.0,
    ) {
        let data = dataset(seed, rows, spoof_rate);
        prop_assert_eq!(data.len(), rows);

        let mut labels: HashMap<Uuid, bool> = HashMap::new();
        for record in &data.records {
            let label = *labels
                .entry(record.record.installation_id)
                .or_insert(record.spoofed);
            prop_assert_eq!(label, record.spoofed);
        }
    }
}
