use criterion::{black_box, criterion_group, criterion_main, Criterion};
use papershard::{assemble, EncodeParams, Reassembler};

fn bench_assemble(c: &mut Criterion) {
    let data: Vec<u8> = (0..1024 * 1024).map(|i| (i % 251) as u8).collect();
    let params = EncodeParams::default();

    c.bench_function("assemble_1mb_default", |b| {
        b.iter(|| assemble(black_box(&data), &params).unwrap())
    });

    let heavy = EncodeParams { payload_size: 512, data_shards: 16, parity_shards: 8 };
    c.bench_function("assemble_1mb_heavy_parity", |b| {
        b.iter(|| assemble(black_box(&data), &heavy).unwrap())
    });
}

fn bench_reassemble(c: &mut Criterion) {
    let data: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();
    let (_, frames) = assemble(&data, &EncodeParams::default()).unwrap();

    c.bench_function("reassemble_256k_complete", |b| {
        b.iter(|| {
            let mut r = Reassembler::new();
            r.ingest_all(black_box(&frames));
            r.finish()
        })
    });

    // Worst realistic case: every group loses its full parity budget and
    // reconstruction actually runs.
    let lossy = EncodeParams { payload_size: 512, data_shards: 10, parity_shards: 4 };
    let (_, frames) = assemble(&data, &lossy).unwrap();
    let kept: Vec<Vec<u8>> = frames
        .iter()
        .filter(|f| {
            let frame = papershard::Frame::from_bytes(f).unwrap();
            frame.kind() == papershard::FrameKind::Descriptor || frame.shard_index >= 4
        })
        .cloned()
        .collect();

    c.bench_function("reassemble_256k_max_loss", |b| {
        b.iter(|| {
            let mut r = Reassembler::new();
            r.ingest_all(black_box(&kept));
            r.finish()
        })
    });
}

criterion_group!(benches, bench_assemble, bench_reassemble);
criterion_main!(benches);
