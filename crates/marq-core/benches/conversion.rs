//! Benchmarks for end-to-end conversion.

#![allow(clippy::format_push_string)] // Benchmark setup code, performance not critical

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use marq_core::Converter;

/// Generate a document with headings, prose, lists and code.
fn generate_document(sections: usize, paragraphs_per_section: usize) -> String {
    let mut doc = String::with_capacity(sections * 80 + sections * paragraphs_per_section * 200);
    doc.push_str("# Document Title\n\n");

    for i in 0..sections {
        doc.push_str(&format!("## Section {i}\n\n"));
        for j in 0..paragraphs_per_section {
            doc.push_str(&format!(
                "Paragraph {j} of section {i} has **bold**, *italic*, `code` and a [link](/s/{i}).\n\n"
            ));
        }
        doc.push_str("* first item\n* second item\n    * nested item\n\n");
        doc.push_str("    let x = 1;\n    let y = x * 2;\n\n");
    }
    doc
}

fn bench_convert_simple(c: &mut Criterion) {
    let converter = Converter::new();

    c.bench_function("convert_simple", |b| {
        b.iter(|| converter.convert("# Hello\n\nSimple *content*."));
    });
}

fn bench_convert_varying_sizes(c: &mut Criterion) {
    let converter = Converter::new();
    let mut group = c.benchmark_group("convert_by_size");

    for (sections, paragraphs) in [(5, 2), (20, 3), (50, 5)] {
        let doc = generate_document(sections, paragraphs);
        group.throughput(Throughput::Bytes(doc.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("document", format!("{sections}s_{paragraphs}p")),
            &doc,
            |b, doc| b.iter(|| converter.convert(doc)),
        );
    }

    group.finish();
}

fn bench_convert_nested_quotes(c: &mut Criterion) {
    let converter = Converter::new();
    let doc = format!("{} deep", "> ".repeat(40));

    c.bench_function("convert_nested_quotes", |b| {
        b.iter(|| converter.convert(&doc));
    });
}

fn bench_convert_raw_html(c: &mut Criterion) {
    let converter = Converter::new();
    let mut doc = String::new();
    for i in 0..50 {
        doc.push_str(&format!(
            "<div class=\"box\">\n<p>raw {i}</p>\n</div>\n\nText with <span>inline</span> &amp; entities.\n\n"
        ));
    }

    c.bench_function("convert_raw_html", |b| {
        b.iter(|| converter.convert(&doc));
    });
}

criterion_group!(
    benches,
    bench_convert_simple,
    bench_convert_varying_sizes,
    bench_convert_nested_quotes,
    bench_convert_raw_html,
);
criterion_main!(benches);
