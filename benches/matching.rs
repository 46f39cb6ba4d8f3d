use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use resource_search::{Query, Resource, ResourceIndex, match_query, render};

fn synthetic_index(resources: usize, sections: usize) -> ResourceIndex {
    let resources = (0..resources)
        .map(|r| {
            (0..sections).fold(
                Resource::new(format!("Resource {r:04}"), "doc")
                    .with_url(format!("https://catalog.example/{r}")),
                |resource, s| {
                    resource.with_section(
                        format!("Heading {r}.{s}"),
                        format!(
                            "* item {s}\nSee [reference {s}](https://ref.example/{r}/{s}) for details on topic-{}",
                            (r * sections + s) % 97
                        ),
                    )
                },
            )
        })
        .collect();
    ResourceIndex::new(resources)
}

fn bench_match(c: &mut Criterion) {
    let index = synthetic_index(200, 12);
    const QUERIES: &[&str] = &["topic-42", "heading 1", "zzz", "reference"];
    for &raw in QUERIES {
        let query = Query::parse(raw).expect("non-empty query");
        c.bench_with_input(BenchmarkId::new("match_query", raw), &query, |b, query| {
            b.iter(|| black_box(match_query(query, &index).len()));
        });
    }
}

fn bench_render(c: &mut Criterion) {
    let index = synthetic_index(200, 12);
    const QUERIES: &[&str] = &["topic-42", "reference"];
    for &raw in QUERIES {
        let query = Query::parse(raw).expect("non-empty query");
        let groups = match_query(&query, &index);
        c.bench_with_input(BenchmarkId::new("render", raw), &groups, |b, groups| {
            b.iter(|| black_box(render(groups, &query).len()));
        });
    }
}

criterion_group!(benches, bench_match, bench_render);
criterion_main!(benches);
