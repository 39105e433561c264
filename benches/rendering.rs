//! Benchmarks for incremental rendering and scroll mapping.

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use mdsync::document::BlockStore;
use mdsync::render::{HtmlRenderer, RenderOptions};
use mdsync::session::Session;
use mdsync::sync::SyncSettings;
use mdsync::viewport::Pane;

fn document() -> String {
    include_str!("../tests/fixtures/sample.md").repeat(20)
}

fn renderer() -> HtmlRenderer {
    HtmlRenderer::new(RenderOptions {
        highlight: false,
        ..RenderOptions::default()
    })
}

fn bench_full_render(c: &mut Criterion) {
    let md = document();

    c.bench_function("full_render", |b| {
        b.iter_batched(
            || BlockStore::new(renderer()),
            |mut store| store.update(black_box(&md)),
            BatchSize::SmallInput,
        )
    });
}

fn bench_incremental_render(c: &mut Criterion) {
    let md = document();
    let edited = md.replacen("Final paragraph.", "Final paragraph, edited.", 1);
    let mut store = BlockStore::new(renderer());
    store.update(&md);

    let mut flip = false;
    c.bench_function("incremental_render", |b| {
        b.iter(|| {
            flip = !flip;
            store.update(black_box(if flip { &edited } else { &md }))
        })
    });
}

fn bench_scroll_mapping(c: &mut Criterion) {
    let mut session = Session::headless(renderer(), 640.0, 800.0, 600.0, SyncSettings::default());
    session.load(document());
    let controller = session.controller();
    let from = controller.scroll_state(Pane::Source).map_or(0.0, |s| s.max_scroll());
    let to = controller.scroll_state(Pane::Preview).map_or(0.0, |s| s.max_scroll());

    c.bench_function("scroll_mapping", |b| {
        b.iter(|| {
            controller
                .table()
                .map(Pane::Source, black_box(from * 0.37), from, to)
        })
    });
}

criterion_group!(benches, bench_full_render, bench_incremental_render, bench_scroll_mapping);
criterion_main!(benches);
