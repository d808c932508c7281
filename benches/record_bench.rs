use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use master_query::core::record::{clean_name, ServerRecord};
use master_query::core::wire::put_string;

fn sample_record(name: &[u8]) -> Vec<u8> {
    let mut raw = vec![199, 255, 40, 171, 0x61, 0x1E, 0x62, 0x1E];
    put_string(&mut raw, name);
    put_string(&mut raw, b"DM-Rankin");
    raw.extend_from_slice(&[0x34, 0x12, 0x00, 6, 16, 0x22, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00]);
    raw
}

#[allow(clippy::unwrap_used)]
fn bench_record_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_decode");

    let plain = sample_record(b"Plain Deathmatch Server");
    let coloured = sample_record(b"\x1b\xff\x00\x00Red\x1b\x00\x00\xffBlue\xa0zzz Server \xc2\xa0Name");

    for (label, raw) in [("plain", &plain), ("coloured", &coloured)] {
        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_function(label, |b| {
            b.iter(|| ServerRecord::decode(black_box(raw)).unwrap())
        });
    }
    group.finish();
}

fn bench_clean_name(c: &mut Criterion) {
    let long: Vec<u8> = b"\x1b\xff\x00\x00zzz Name\xa0"
        .iter()
        .copied()
        .cycle()
        .take(254)
        .collect();
    c.bench_function("clean_name_254b", |b| b.iter(|| clean_name(black_box(&long))));
}

criterion_group!(benches, bench_record_decode, bench_clean_name);
criterion_main!(benches);
