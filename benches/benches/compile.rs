//! Benchmark the stages of template compilation.

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

criterion_main! { benches }
criterion_group! { benches, bench_lex, bench_parse, bench_compile }

/// Benchmarks the time taken to tokenize a template.
fn bench_lex(c: &mut Criterion) {
    let mut g = c.benchmark_group("lex");
    let source = benches::rows(500);
    g.throughput(Throughput::Bytes(source.len() as u64));
    g.bench_function("rows", |b| {
        b.iter(|| {
            let mut lexer = blip::Lexer::new(&source);
            while lexer.next_token().kind != blip::TokenKind::Eof {}
        });
    });
}

/// Benchmarks the time taken to parse a template into a syntax tree.
fn bench_parse(c: &mut Criterion) {
    let mut g = c.benchmark_group("parse");
    let source = benches::rows(500);
    g.throughput(Throughput::Bytes(source.len() as u64));
    g.bench_function("rows", |b| {
        b.iter(|| blip::Parser::new(&source).parse());
    });
}

/// Benchmarks the time taken to compile a template into Rust source.
fn bench_compile(c: &mut Criterion) {
    let mut g = c.benchmark_group("compile");
    let compiler = blip::Compiler::new();

    let page = blip::Unit::from_file_name("page.blip.html", benches::PAGE);
    g.bench_function("page", |b| {
        b.iter(|| compiler.compile(&page).unwrap());
    });

    let rows = blip::Unit::from_file_name("rows.blip.html", benches::rows(500));
    g.throughput(Throughput::Bytes(rows.source().len() as u64));
    g.bench_function("rows", |b| {
        b.iter(|| compiler.compile(&rows).unwrap());
    });
}
