//! 性能基准测试 - Gas 计算
//!
//! 测试场景:
//! 1. 付款前的余额充足性检查
//! 2. 中继金额计算（余额 - gas）
//! 3. 接近 U256 上限时的溢出路径
//!
//! 性能目标:
//! - 单次计算: < 1µs

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ethers::types::U256;
use relaycore::service::gas_calculator::{affordability, relay_amount};

// ============ 测试数据 ============

const GAS_PRICES_GWEI: &[u64] = &[1, 5, 30, 150];
const GAS_LIMIT: u64 = 21_000;

fn gwei(n: u64) -> U256 {
    U256::from(n) * U256::exp10(9)
}

// ============ 基准测试函数 ============

fn bench_affordability(c: &mut Criterion) {
    let mut group = c.benchmark_group("affordability");
    group.throughput(Throughput::Elements(1));

    let balance = U256::exp10(18);
    let payout = U256::exp10(15);
    for &price in GAS_PRICES_GWEI {
        group.bench_with_input(BenchmarkId::from_parameter(price), &gwei(price), |b, gp| {
            b.iter(|| {
                affordability(
                    black_box(balance),
                    black_box(*gp),
                    black_box(U256::from(GAS_LIMIT)),
                    black_box(payout),
                )
            })
        });
    }
    group.finish();
}

fn bench_relay_amount(c: &mut Criterion) {
    let mut group = c.benchmark_group("relay_amount");

    for &price in GAS_PRICES_GWEI {
        group.bench_with_input(BenchmarkId::from_parameter(price), &gwei(price), |b, gp| {
            b.iter(|| relay_amount(black_box(U256::exp10(17)), black_box(*gp), black_box(U256::from(GAS_LIMIT))))
        });
    }
    group.finish();
}

fn bench_overflow_path(c: &mut Criterion) {
    c.bench_function("affordability_overflow", |b| {
        b.iter(|| {
            affordability(
                black_box(U256::MAX),
                black_box(U256::MAX),
                black_box(U256::from(2u64)),
                black_box(U256::one()),
            )
        })
    });
}

criterion_group!(
    benches,
    bench_affordability,
    bench_relay_amount,
    bench_overflow_path
);
criterion_main!(benches);
