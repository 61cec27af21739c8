use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tabx::format::Mode;
use tabx::parser::parse_tokens;
use tabx::pipeline::{Table, compile, run_stages};
use tabx::value::{Row, Value};

fn make_table(count: usize, keys: usize) -> Table {
    let rows: Vec<Row> = (0..count)
        .map(|i| {
            vec![
                Value::Text(format!("topic{}", i % keys)),
                Value::Text(format!("consumer-{}", i % 13)),
                Value::Text((i * 31).to_string()),
                Value::Text("0".to_string()),
            ]
        })
        .collect();
    let headers = ["TOPIC", "HOST", "OFFSET", "LAG"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    Table::new(headers, rows)
}

fn bench_group(c: &mut Criterion) {
    let few_keys = make_table(10_000, 10);
    let many_keys = make_table(10_000, 5_000);
    let config = parse_tokens(Mode::Csv, &["group[0]:count"]).unwrap();
    let stages = compile(&config);

    c.bench_function("group_10k_few_keys", |b| {
        b.iter(|| black_box(run_stages(&stages, few_keys.clone()).unwrap()))
    });

    c.bench_function("group_10k_many_keys", |b| {
        b.iter(|| black_box(run_stages(&stages, many_keys.clone()).unwrap()))
    });
}

fn bench_group_sort(c: &mut Criterion) {
    let table = make_table(10_000, 100);
    let config = parse_tokens(Mode::Csv, &["group[0,1]", "sort[2]:desc"]).unwrap();
    let stages = compile(&config);

    c.bench_function("group_sort_10k", |b| {
        b.iter(|| black_box(run_stages(&stages, table.clone()).unwrap()))
    });
}

criterion_group!(benches, bench_group, bench_group_sort);
criterion_main!(benches);
