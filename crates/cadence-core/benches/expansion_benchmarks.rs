use cadence_core::generation::constraints::PriorityLedger;
use cadence_core::generation::guard::missing_dates;
use cadence_core::models::{DayOfWeek, Priority, RecurrencePattern};
use cadence_core::recurrence::Schedule;
use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::BTreeSet;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn schedule(pattern: RecurrencePattern) -> Schedule {
    let days: BTreeSet<DayOfWeek> = [DayOfWeek::Mon, DayOfWeek::Wed, DayOfWeek::Fri].into_iter().collect();
    Schedule::build(pattern, &days, Some(3), start(), None).unwrap()
}

fn bench_expand_by_pattern(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand_one_year");
    let end = start() + Duration::days(365);

    for pattern in [
        RecurrencePattern::Daily,
        RecurrencePattern::Weekdays,
        RecurrencePattern::Weekly,
        RecurrencePattern::Custom,
    ] {
        let schedule = schedule(pattern);
        group.bench_with_input(BenchmarkId::from_parameter(pattern), &schedule, |b, s| {
            b.iter(|| s.expand(black_box(start()), black_box(end)).unwrap())
        });
    }
    group.finish();
}

fn bench_expand_window_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand_daily_window");
    let schedule = schedule(RecurrencePattern::Daily);

    for days in [7i64, 30, 90, 366] {
        let end = start() + Duration::days(days - 1);
        group.bench_with_input(BenchmarkId::from_parameter(days), &end, |b, end| {
            b.iter(|| schedule.expand(black_box(start()), black_box(*end)).unwrap())
        });
    }
    group.finish();
}

fn bench_missing_dates(c: &mut Criterion) {
    let candidates = schedule(RecurrencePattern::Daily)
        .expand(start(), start() + Duration::days(365))
        .unwrap()
        .dates;
    let existing: Vec<NaiveDate> = candidates.iter().step_by(2).copied().collect();

    c.bench_function("missing_dates_half_present", |b| {
        b.iter(|| missing_dates(black_box(&candidates), black_box(&existing)))
    });
}

fn bench_priority_ledger(c: &mut Criterion) {
    c.bench_function("ledger_admit_100_owners_30_days", |b| {
        b.iter(|| {
            let mut ledger = PriorityLedger::new();
            for owner in 0..100 {
                let owner = format!("owner-{}", owner);
                for day in 0..30 {
                    let date = start() + Duration::days(day);
                    ledger.admit(&owner, date, Priority::Mit);
                    ledger.admit(&owner, date, Priority::Mit);
                }
            }
            black_box(ledger)
        })
    });
}

criterion_group!(
    benches,
    bench_expand_by_pattern,
    bench_expand_window_sizes,
    bench_missing_dates,
    bench_priority_ledger
);
criterion_main!(benches);
