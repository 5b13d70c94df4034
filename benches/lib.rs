use std::hint::black_box;

use blocktab::cost::estimate_cost;
use blocktab::{BlockTable, CANDIDATE_BLOCK_SIZES, DOMAIN_LEN, select_block_size};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

/// Resembles a real property: long uniform stretches, with dense regions in the BMP.
fn synthetic_property() -> Vec<u8> {
    let mut state = 0x2545_f491u32;
    (0..DOMAIN_LEN)
        .map(|cp| {
            if cp < 0x3000 || (0x20000..0x20400).contains(&cp) {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state % 5) as u8
            } else if cp < 0xE0000 {
                1
            } else {
                2
            }
        })
        .collect()
}

fn bench(c: &mut Criterion) {
    let values = synthetic_property();

    let mut group = c.benchmark_group("cost::estimate_cost");
    group.throughput(Throughput::Elements(values.len() as u64));
    for &size in &CANDIDATE_BLOCK_SIZES {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| estimate_cost(black_box(&values), size))
        });
    }
    group.finish();

    c.bench_function("cost::select_block_size", |b| {
        b.iter(|| select_block_size(black_box(&values)))
    });

    let block_size = select_block_size(&values);
    c.bench_function("table::compile", |b| {
        b.iter(|| BlockTable::compile(black_box(&values), block_size, 0))
    });

    let table = match BlockTable::compile(&values, block_size, 0) {
        Ok(table) => table,
        Err(err) => panic!("{err}"),
    };
    let mut group = c.benchmark_group("table::decode");
    group.throughput(Throughput::Elements(values.len() as u64));
    group.bench_function("all", |b| {
        b.iter(|| {
            let mut sum = 0usize;
            for cp in 0..DOMAIN_LEN {
                sum += table[black_box(cp)] as usize;
            }
            sum
        })
    });
    group.finish();

    let bytes = match table.to_bytes() {
        Ok(bytes) => bytes,
        Err(err) => panic!("{err}"),
    };
    c.bench_function("persist::from_bytes", |b| {
        b.iter(|| BlockTable::<u8>::from_bytes(black_box(&bytes)))
    });
}

criterion_group!(benches, bench);
criterion_main!(benches);
