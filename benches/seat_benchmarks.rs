//! Performance benchmarks for Seatguard
//!
//! Cookie issue/verify and touch validation sit on the input dispatch path,
//! so these guard against regressions there.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use seatguard::{
    cookie::CookieAuthority,
    input::{InputEvent, TouchAction, TouchEvent, TouchPoint, Validator},
};

/// Benchmark cookie creation and verification
fn bench_cookies(c: &mut Criterion) {
    let mut group = c.benchmark_group("cookies");
    let authority = CookieAuthority::create_from(&[7u8; 64]).unwrap();
    let raw = authority.make_cookie(123_456).serialize();

    group.bench_function("make_cookie", |b| {
        b.iter(|| black_box(authority.make_cookie(black_box(123_456))))
    });
    group.bench_function("verify_cookie", |b| {
        b.iter(|| black_box(authority.verify_cookie(black_box(&raw)).is_ok()))
    });

    group.finish();
}

fn frame(ids: std::ops::Range<i32>, action: TouchAction) -> InputEvent {
    ids.fold(TouchEvent::new(0, 0), |ev, id| {
        ev.with_point(TouchPoint::new(id, action))
    })
    .into()
}

/// Benchmark touch validation for consistent and churning streams
fn bench_validator(c: &mut Criterion) {
    let mut group = c.benchmark_group("validator");

    for contacts in [1, 5, 10].iter() {
        group.bench_with_input(
            format!("consistent_{}_contacts", contacts),
            contacts,
            |b, &contacts| {
                let validator = Validator::new(|ev| {
                    black_box(ev);
                });
                validator.validate_and_dispatch(frame(0..contacts, TouchAction::Down));
                b.iter(|| validator.validate_and_dispatch(frame(0..contacts, TouchAction::Change)));
            },
        );

        group.bench_with_input(
            format!("churn_{}_contacts", contacts),
            contacts,
            |b, &contacts| {
                b.iter_batched(
                    || {
                        let validator = Validator::new(|ev| {
                            black_box(ev);
                        });
                        validator.validate_and_dispatch(frame(0..contacts, TouchAction::Down));
                        validator
                    },
                    |validator| {
                        validator.validate_and_dispatch(frame(
                            contacts..contacts * 2,
                            TouchAction::Change,
                        ))
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_cookies, bench_validator);
criterion_main!(benches);
