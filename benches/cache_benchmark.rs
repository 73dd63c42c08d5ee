use std::sync::Arc;
use std::thread;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{seq::SliceRandom, thread_rng, Rng};
use serde_json::json;
use travel_api_client::cache::ResponseCache;

// Read-heavy mix over a shared response cache under thread contention.
pub fn cache_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("response_cache");

    for threads in [1usize, 4, 8] {
        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            &threads,
            |b, &threads| {
                b.iter(|| {
                    let cache = Arc::new(ResponseCache::new(Duration::from_secs(300)));

                    let keys: Vec<String> = (0..100)
                        .map(|i| format!("flights-JFK-LAX-2025-06-{:02}-{i}", (i % 28) + 1))
                        .collect();

                    // Seed part of the key space so reads see real hits.
                    for key in keys.iter().take(50) {
                        cache.set(key, json!({"data": [1, 2, 3, 4, 5]}));
                    }

                    let mut handles = Vec::new();
                    for _ in 0..threads {
                        let cache = Arc::clone(&cache);
                        let keys = keys.clone();
                        handles.push(thread::spawn(move || {
                            let mut rng = thread_rng();
                            for _ in 0..250 {
                                let key = keys.choose(&mut rng).unwrap();
                                if rng.gen_bool(0.3) {
                                    cache.set(key, json!({"data": [1, 2, 3, 4, 5]}));
                                } else {
                                    let _ = cache.get(key);
                                }
                            }
                        }));
                    }
                    for handle in handles {
                        handle.join().unwrap();
                    }

                    black_box(cache.stats())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, cache_benchmark);
criterion_main!(benches);
