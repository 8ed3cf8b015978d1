//! Hot-path benchmark: envelope decode and feature normalization.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hive_sentinel::features::{Normalizer, NETWORK_FEATURES};
use hive_sentinel::scaling::{CategoricalTable, ScalingParameters};
use hive_sentinel::telemetry::{decode_event, Modality};
use std::collections::BTreeMap;

const NETWORK_EVENT: &[u8] = br#"{"header":{"timestamp":1700000000},"payload":{"Network":{"protocol":"TCP","src_ip":"10.0.0.5","dest_ip":"10.0.0.9","src_port":443,"dest_port":51000}}}"#;

fn network_params() -> ScalingParameters {
    ScalingParameters {
        version: "bench".into(),
        modality: Modality::Network,
        feature_names: NETWORK_FEATURES.iter().map(|s| s.to_string()).collect(),
        center: vec![0.5; NETWORK_FEATURES.len()],
        scale: vec![2.0; NETWORK_FEATURES.len()],
    }
}

fn protocol_table() -> CategoricalTable {
    CategoricalTable {
        field: "protocol".into(),
        codes: BTreeMap::from([("TCP".into(), 0), ("UDP".into(), 1)]),
    }
}

fn bench_decode(c: &mut Criterion) {
    c.bench_function("decode_network_event", |b| {
        b.iter(|| decode_event(black_box(Some(b"hive-0")), black_box(Some(NETWORK_EVENT))))
    });
}

fn bench_normalize(c: &mut Criterion) {
    let normalizer = Normalizer::new(protocol_table());
    let params = network_params();
    let event = decode_event(Some(b"hive-0"), Some(NETWORK_EVENT)).unwrap();

    c.bench_function("normalize_network_record", |b| {
        b.iter(|| normalizer.normalize(black_box(&event.record), black_box(&params)))
    });
}

fn bench_decode_and_normalize(c: &mut Criterion) {
    let normalizer = Normalizer::new(protocol_table());
    let params = network_params();

    c.bench_function("decode_then_normalize", |b| {
        b.iter(|| {
            let event = decode_event(Some(b"hive-0"), Some(black_box(NETWORK_EVENT))).unwrap();
            black_box(normalizer.normalize(&event.record, &params))
        })
    });
}

criterion_group!(benches, bench_decode, bench_normalize, bench_decode_and_normalize);
criterion_main!(benches);
