//! Benchmarks for block address encoding and decoding.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use kv_block_index::cache::address::{encoded_words, BlockAddress};
use kv_block_index::cache::tier::MemoryTier;

fn bench_encode(c: &mut Criterion) {
    c.bench_function("encode_10k_addresses", |b| {
        b.iter(|| {
            for slot in 0..10_000 {
                let tier = MemoryTier::ALL[slot as usize % 3];
                black_box(BlockAddress::new(black_box(slot), tier));
            }
        })
    });
}

fn bench_decode(c: &mut Criterion) {
    let table: Vec<BlockAddress> = (0..10_000)
        .map(|slot| BlockAddress::new(slot, MemoryTier::ALL[slot as usize % 3]))
        .collect();

    c.bench_function("decode_10k_addresses", |b| {
        b.iter(|| {
            let mut host_blocks = 0usize;
            for addr in black_box(&table) {
                if addr.is_secondary() {
                    host_blocks += 1;
                }
                black_box(addr.slot());
            }
            black_box(host_blocks);
        })
    });

    c.bench_function("encoded_words_view_10k", |b| {
        b.iter(|| black_box(encoded_words(black_box(&table)).len()))
    });
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
