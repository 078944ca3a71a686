use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rsvg::bench_only::{PathBuilder, Transform, Vpath, FLATNESS};

static INPUT: &str = "M10 20 C 30,40 50 60-70,80,90 100,110 120,130,140";

static ARCS: &str = "M 10 10 a 20 30 15 1 1 40 40 A 5 5 0 0 0 100 100 z";

fn path_parser(c: &mut Criterion) {
    c.bench_function("parse path into builder", |b| {
        let input = black_box(INPUT);

        b.iter(|| {
            let mut builder = PathBuilder::default();
            let _ = builder.parse(input);
        });
    });

    c.bench_function("flatten path with arcs", |b| {
        let mut builder = PathBuilder::default();
        let _ = builder.parse(ARCS);
        let path = builder.into_path();
        let transform = Transform::new_scale(4.0, 4.0);

        b.iter(|| Vpath::from_path(black_box(&path), &transform, FLATNESS));
    });
}

criterion_group!(benches, path_parser);
criterion_main!(benches);
