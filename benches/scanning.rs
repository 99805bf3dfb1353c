use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use memscan::core::types::{Address, ValueType};
use memscan::memory::comparator;
use memscan::memory::regions::ProtectionFlags;
use memscan::memory::scanner::{MemoryScanner, ScanOptions, ScanSession};
use memscan::process::SimulatedProcess;

fn noisy_buffer(len: usize) -> Vec<u8> {
    let mut state = 0x2545_F491u32;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

fn benchmark_comparator(c: &mut Criterion) {
    let mut group = c.benchmark_group("comparator");
    for size in [4 * 1024, 64 * 1024, 1024 * 1024] {
        let buffer = noisy_buffer(size);
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("i32_vectorized", size), &buffer, |b, buf| {
            let mut out = Vec::new();
            b.iter(|| {
                out.clear();
                comparator::match_offsets_i32(black_box(buf), black_box(1234), &mut out);
                out.len()
            });
        });
        group.bench_with_input(BenchmarkId::new("i32_scalar", size), &buffer, |b, buf| {
            let mut out = Vec::new();
            b.iter(|| {
                out.clear();
                comparator::scalar::match_offsets_i32(black_box(buf), black_box(1234), &mut out);
                out.len()
            });
        });
        group.bench_with_input(BenchmarkId::new("f32_vectorized", size), &buffer, |b, buf| {
            b.iter(|| comparator::any_match_f32(black_box(buf), black_box(1234.5)));
        });
        group.bench_with_input(BenchmarkId::new("f32_scalar", size), &buffer, |b, buf| {
            b.iter(|| comparator::scalar::any_match_f32(black_box(buf), black_box(1234.5)));
        });
    }
    group.finish();
}

fn simulated_target(regions: usize, region_size: usize) -> SimulatedProcess {
    let process = SimulatedProcess::new(1);
    for i in 0..regions {
        let base = Address::new(0x100_0000 + i * region_size * 2);
        process.add_region(base, region_size, ProtectionFlags::read_write());
        let noise = noisy_buffer(region_size);
        process.poke(base, &noise).unwrap();
        process
            .poke(base.add(region_size / 2), &1234i32.to_le_bytes())
            .unwrap();
    }
    process
}

fn benchmark_scan(c: &mut Criterion) {
    let process = simulated_target(16, 256 * 1024);
    let mut group = c.benchmark_group("scan");
    group.throughput(Throughput::Bytes(16 * 256 * 1024));
    group.sample_size(20);

    for (name, vectorized, threads) in [
        ("vectorized_1_thread", true, 1),
        ("scalar_1_thread", false, 1),
        ("vectorized_4_threads", true, 4),
    ] {
        group.bench_function(name, |b| {
            let options = ScanOptions {
                threads,
                use_vectorized: vectorized,
                ..ScanOptions::default()
            };
            b.iter(|| {
                let session = ScanSession::new();
                let scanner = MemoryScanner::new(&process, &session, options.clone());
                scanner.scan(black_box(1234), ValueType::Int32).unwrap().results.len()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_comparator, benchmark_scan);
criterion_main!(benches);
