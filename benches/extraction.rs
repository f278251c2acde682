use criterion::{Criterion, criterion_group, criterion_main};
use knowledge_assistant::loader::web::extract_page;
use std::hint::black_box;

fn sample_page() -> String {
    let sections: String = (0..200)
        .map(|i| {
            format!(
                "<section><h2>Topic {i}</h2><p>Paragraph {i} explains one idea in detail.</p>\
                 <ul><li>first point</li><li>second point</li></ul></section>"
            )
        })
        .collect();
    format!(
        "<!DOCTYPE html><html lang=\"en\"><head><title>Bench page</title>\
         <script>var tracking = true;</script></head><body><nav>Home | Docs</nav>\
         <main>{sections}</main><footer>Copyright</footer></body></html>"
    )
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let page = sample_page();
    c.bench_function("extraction", |b| b.iter(|| extract_page(black_box(&page))));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
