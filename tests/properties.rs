//! Property tests for grouping, chunking and mapping.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use proptest::prelude::*;

use tagscan::prelude::*;
use tagscan::protocols::{SimulatedDevice, SimulatedTransport};
use tagscan::scan::{group_signals, map_results, BatchReader, ReaderConfig};

fn arb_entry() -> impl Strategy<Value = (Option<(&'static str, u16)>, &'static str)> {
    (
        prop::option::weighted(0.9, (prop::sample::select(vec!["h1", "h2", "h3"]), 0u16..2)),
        prop::sample::select(vec!["tagA", "tagB", "tagC", "tagD", " "]),
    )
}

fn entries(raw: &[(Option<(&'static str, u16)>, &'static str)]) -> Vec<SignalEntry> {
    raw.iter()
        .enumerate()
        .map(|(i, (endpoint, tag))| {
            let id = i as u32 + 1;
            let mut entry = SignalEntry::new(id, id, Metric::Current, Endpoint::new("unused", 0), *tag);
            entry.endpoint = endpoint.map(|(host, slot)| Endpoint::new(host, slot));
            entry
        })
        .collect()
}

proptest! {
    #[test]
    fn grouping_is_a_partition(raw in prop::collection::vec(arb_entry(), 0..60)) {
        let signals = entries(&raw);
        let grouping = group_signals(&signals);

        let scannable: Vec<&SignalEntry> = signals.iter().filter(|s| s.is_scannable()).collect();
        prop_assert_eq!(grouping.signal_count(), scannable.len());
        prop_assert_eq!(grouping.excluded, signals.len() - scannable.len());

        let endpoints: HashSet<&Endpoint> = grouping.groups.iter().map(|g| &g.endpoint).collect();
        prop_assert_eq!(endpoints.len(), grouping.groups.len());

        let mut owner: HashMap<SignalId, &Endpoint> = HashMap::new();
        for group in &grouping.groups {
            for id in &group.signals {
                prop_assert!(owner.insert(*id, &group.endpoint).is_none(), "signal {} grouped twice", id);
            }
            let distinct: HashSet<&String> = group.tags.iter().collect();
            prop_assert_eq!(distinct.len(), group.tags.len());
        }
        for signal in scannable {
            prop_assert_eq!(Some(owner[&signal.signal_id]), signal.endpoint.as_ref());
        }
    }

    #[test]
    fn every_grouped_signal_gets_one_reading(raw in prop::collection::vec(arb_entry(), 1..60)) {
        let signals = entries(&raw);
        let grouping = group_signals(&signals);
        let timestamp = Utc::now();

        let mut readings = Vec::new();
        for group in &grouping.groups {
            let results: Vec<ReadResult> = group
                .tags
                .iter()
                .map(|tag| ReadResult::success(tag.as_str(), 1.0))
                .collect();
            let mapped = map_results(&grouping.index, &group.endpoint, &results, timestamp);
            prop_assert!(mapped.anomalies.is_empty());
            readings.extend(mapped.readings);
        }

        prop_assert_eq!(readings.len(), grouping.signal_count());
        let ids: HashSet<SignalId> = readings.iter().map(|r| r.signal_id).collect();
        prop_assert_eq!(ids.len(), readings.len());
        prop_assert!(readings.iter().all(|r| r.timestamp == timestamp && r.is_consistent()));
    }

    #[test]
    fn chunks_never_exceed_limit(tag_count in 0usize..120, chunk_size in 1usize..40) {
        let endpoint = Endpoint::new("10.0.0.1", 0);
        let tags: Vec<String> = (0..tag_count).map(|i| format!("T[{}]", i)).collect();
        let mut device = SimulatedDevice::new();
        for tag in &tags {
            device = device.with_value(tag.as_str(), 1.0);
        }
        let transport = SimulatedTransport::new().with_device(endpoint.clone(), device);
        let reader = BatchReader::new(ReaderConfig::default().with_chunk_size(chunk_size));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let outcome = runtime.block_on(reader.read_group(&transport, &endpoint, &tags));

        let sizes = transport.chunk_sizes(&endpoint);
        prop_assert!(sizes.iter().all(|&n| n >= 1 && n <= chunk_size));
        prop_assert_eq!(sizes.iter().sum::<usize>(), tag_count);
        prop_assert_eq!(sizes.len(), tag_count.div_ceil(chunk_size));
        prop_assert_eq!(outcome.results.len(), tag_count);
        prop_assert!(outcome.results.iter().all(|r| r.is_success()));
    }
}
