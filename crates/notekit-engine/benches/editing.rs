use criterion::{Criterion, criterion_group, criterion_main};
use notekit_config::Config;
use notekit_engine::editing::{Cmd, Document, Editor, History, bullet};
use notekit_engine::range::Range;

fn generate_paragraphs(count: usize) -> String {
    (0..count)
        .map(|i| format!("<p>Paragraph {i} with <b>some</b> content.</p>"))
        .collect()
}

fn bench_list_toggling(c: &mut Criterion) {
    let mut group = c.benchmark_group("bullet");
    group.sample_size(10);

    let markup = generate_paragraphs(100);

    group.bench_function("toggle_unordered_list", |b| {
        b.iter(|| {
            let mut doc = Document::from_markup(std::hint::black_box(&markup));
            doc.select(Range::select_all(doc.tree()));
            bullet::insert_unordered_list(&mut doc);
            bullet::insert_unordered_list(&mut doc);
            std::hint::black_box(doc.markup());
        });
    });

    group.finish();
}

fn bench_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("history");
    group.sample_size(10);

    let doc = Document::from_markup(&generate_paragraphs(100));

    group.bench_function("record_undo", |b| {
        let mut history = History::new(200);
        b.iter(|| history.record_undo(std::hint::black_box(&doc)));
    });

    group.bench_function("bold_then_undo", |b| {
        let mut source = Document::from_markup(&generate_paragraphs(100));
        source.select(Range::select_all(source.tree()));
        let mut editor = Editor::new(source, Config::default());
        editor.initialize();
        b.iter(|| {
            editor.execute(Cmd::Bold);
            editor.execute(Cmd::Undo);
            std::hint::black_box(editor.take_events());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_list_toggling, bench_history);
criterion_main!(benches);
