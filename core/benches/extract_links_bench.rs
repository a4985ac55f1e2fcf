use criterion::{criterion_group, criterion_main, Criterion};
use minutes_core::links::extract_links;

fn bench_extract_links(c: &mut Criterion) {
    let mut html = String::from("<html><body><h1>会議録</h1><ul>");
    for i in 0..500 {
        html.push_str(&format!(
            "<li><a href=\"/gikai/r6/teirei{i}.pdf\"><span>令和6年 第{i}回</span> 定例会</a></li>"
        ));
    }
    html.push_str("</ul></body></html>");

    c.bench_function("extract_links_500_anchors", |b| b.iter(|| extract_links(&html)));
}

criterion_group!(benches, bench_extract_links);
criterion_main!(benches);
