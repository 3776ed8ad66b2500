use criterion::{black_box, criterion_group, criterion_main, Criterion};
use copal::Value;

const SOURCE: &str = "Hello {user.name}, you have {count * 2 + 1} items ({if(count > 3, \"many\", \"few\")})";

fn make_ctx(count: i32) -> Value {
    Value::object([
        ("user", Value::object([("name", Value::from("Ada"))])),
        ("count", Value::from(count)),
    ])
}

fn bench_resolve(c: &mut Criterion) {
    let template = copal::parse(SOURCE).expect("bench template parses");
    let ctx = make_ctx(5);

    let mut g = c.benchmark_group("template");

    g.bench_function("parse", |b| b.iter(|| copal::parse(black_box(SOURCE))));
    g.bench_function("resolve", |b| b.iter(|| template.resolve(black_box(&ctx))));

    let single = copal::parse("{sqrt(x * x + y * y)}").expect("bench template parses");
    let xy = Value::object([("x", Value::from(3)), ("y", Value::from(4))]);
    g.bench_function("resolve_single", |b| b.iter(|| single.resolve(black_box(&xy))));

    let items = Value::list((0..100).map(|i| Value::object([("v", Value::from(i))])));
    let wide = Value::object([("items", items)]);
    let wildcard = copal::parse("{[items.*.v]}").expect("bench template parses");
    g.bench_function("wildcard_100", |b| b.iter(|| wildcard.resolve(black_box(&wide))));

    g.finish();
}

criterion_group!(benches, bench_resolve);
criterion_main!(benches);
