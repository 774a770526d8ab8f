/*!
 * Synchronization Primitives Benchmarks
 *
 * Compare uncontended fast paths, contended handoff, and fair vs unfair
 * acquisition policies
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use parkway::{CountDownLatch, ReentrantLock, Semaphore};
use std::sync::Arc;
use std::thread;

fn bench_uncontended_lock(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncontended_lock");

    let unfair = ReentrantLock::new();
    group.bench_function("unfair", |b| {
        b.iter(|| {
            let guard = unfair.guard();
            black_box(&guard);
        });
    });

    let fair = ReentrantLock::fair();
    group.bench_function("fair", |b| {
        b.iter(|| {
            let guard = fair.guard();
            black_box(&guard);
        });
    });

    group.finish();
}

fn bench_contended_lock(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_lock");

    for num_threads in [2, 4, 8] {
        for (name, fair) in [("unfair", false), ("fair", true)] {
            group.bench_with_input(
                BenchmarkId::new(name, num_threads),
                &num_threads,
                |b, &num_threads| {
                    b.iter(|| {
                        let lock = Arc::new(if fair {
                            ReentrantLock::fair()
                        } else {
                            ReentrantLock::new()
                        });

                        let handles: Vec<_> = (0..num_threads)
                            .map(|_| {
                                let lock = Arc::clone(&lock);
                                thread::spawn(move || {
                                    for _ in 0..100 {
                                        let guard = lock.guard();
                                        black_box(&guard);
                                    }
                                })
                            })
                            .collect();

                        for handle in handles {
                            handle.join().unwrap();
                        }
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_handoff_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("handoff_latency");

    group.bench_function("lock", |b| {
        b.iter(|| {
            let lock = Arc::new(ReentrantLock::new());
            lock.lock();

            let lock_clone = Arc::clone(&lock);
            let handle = thread::spawn(move || {
                lock_clone.lock();
                lock_clone.unlock().unwrap();
            });

            while !lock.has_queued_threads() {
                thread::yield_now();
            }
            lock.unlock().unwrap();
            handle.join().unwrap();
        });
    });

    group.bench_function("latch", |b| {
        b.iter(|| {
            let latch = Arc::new(CountDownLatch::new(1));
            let latch_clone = Arc::clone(&latch);
            let handle = thread::spawn(move || latch_clone.wait());

            while !latch.has_queued_threads() {
                thread::yield_now();
            }
            latch.count_down();
            handle.join().unwrap().unwrap();
        });
    });

    group.finish();
}

fn bench_semaphore_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("semaphore_throughput");

    for permits in [1, 4] {
        group.bench_with_input(
            BenchmarkId::from_parameter(permits),
            &permits,
            |b, &permits| {
                b.iter(|| {
                    let sem = Arc::new(Semaphore::new(permits));

                    let handles: Vec<_> = (0..8)
                        .map(|_| {
                            let sem = Arc::clone(&sem);
                            thread::spawn(move || {
                                for _ in 0..50 {
                                    sem.acquire().unwrap();
                                    sem.release();
                                }
                            })
                        })
                        .collect();

                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_uncontended_lock,
    bench_contended_lock,
    bench_handoff_latency,
    bench_semaphore_throughput
);
criterion_main!(benches);
