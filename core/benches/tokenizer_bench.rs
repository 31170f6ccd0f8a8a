use criterion::{criterion_group, criterion_main, Criterion};
use lemmadex_core::nlp::{LexiconTagger, PosTagger};
use lemmadex_core::tokenizer::{stem_text, words};

const ARTICLE: &str = "Officials said on Tuesday that flooding across the region had displaced \
thousands of families, with rescue teams working through the night to reach villages cut off \
by the rising water. Forecasters expect more heavy rain later this week.";

fn bench_tokenize(c: &mut Criterion) {
    let text = ARTICLE.repeat(50);
    c.bench_function("stem_article", |b| b.iter(|| stem_text(&text)));
    let tokens = words(&text);
    c.bench_function("tag_article", |b| b.iter(|| LexiconTagger.tag(&tokens)));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
