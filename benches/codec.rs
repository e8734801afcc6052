use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use xcmp::protocol::{decode, Message, Opcode, ResultCode};
use xcmp::xnl::{encrypt_block, TeaKey};

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    // Typical control message (a handful of payload bytes)
    let small = Message::request(Opcode::DISPLAY_TEXT, vec![0u8; 16]);
    group.throughput(Throughput::Bytes(16));
    group.bench_function("encode_16b", |b| {
        b.iter(|| {
            black_box(small.encode());
        });
    });

    // Large read-all style response
    let large = Message::response(Opcode::SOFTPOT, ResultCode::Success, vec![0u8; 1024]);
    group.throughput(Throughput::Bytes(1024));
    group.bench_function("encode_1kb", |b| {
        b.iter(|| {
            black_box(large.encode());
        });
    });

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    let small = Message::request(Opcode::DISPLAY_TEXT, vec![0u8; 16]).encode();
    group.throughput(Throughput::Bytes(16));
    group.bench_function("decode_16b", |b| {
        b.iter(|| {
            black_box(decode(&small).unwrap());
        });
    });

    let large = Message::response(Opcode::SOFTPOT, ResultCode::Success, vec![0u8; 1024]).encode();
    group.throughput(Throughput::Bytes(1024));
    group.bench_function("decode_1kb", |b| {
        b.iter(|| {
            black_box(decode(&large).unwrap());
        });
    });

    group.finish();
}

fn bench_tea(c: &mut Criterion) {
    let mut group = c.benchmark_group("tea");

    let key = TeaKey::new(
        [0x0011_2233, 0x4455_6677, 0x8899_AABB, 0xCCDD_EEFF],
        0x9E37_79B9,
    );
    let block = [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF];
    group.throughput(Throughput::Bytes(8));
    group.bench_function("encrypt_block", |b| {
        b.iter(|| {
            black_box(encrypt_block(black_box(&key), black_box(block)));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_tea);
criterion_main!(benches);
