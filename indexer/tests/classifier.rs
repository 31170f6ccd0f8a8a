use indexer::jobs::VectorizeJob;
use indexer::training::Trainer;
use indexer::vectorize::{VectorOutcome, Vectorizer};
use indexer::Classifier;
use lemmadex_core::queue::{JobQueues, QueueName};
use lemmadex_core::tfidf::IdfVariant;
use lemmadex_core::Store;
use std::fs;
use std::path::Path;

fn write(root: &Path, category: &str, name: &str, text: &str) {
    let dir = root.join(category);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), text).unwrap();
}

fn corpus() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "sport", "1.txt", "The striker scored a late goal and the stadium erupted");
    write(dir.path(), "sport", "2.txt", "Goalkeeper saves penalty as the league leaders win again");
    write(dir.path(), "politics", "1.txt", "Parliament voted on the budget after a long debate");
    write(dir.path(), "politics", "2.txt", "The minister resigned before the election campaign began");
    dir
}

/// Trains and runs every vectorization job inline.
fn trained(store: &Store, root: &Path) -> usize {
    let queues = JobQueues::open(store.db(), 3).unwrap();
    let training = queues.get(QueueName::Training);
    let report = Trainer::new(store.clone(), 8000).train(root, &training).unwrap();
    let vectorizer = Vectorizer::new(store.clone(), IdfVariant::Standard);
    while let Some(job) = training.claim().unwrap() {
        assert_eq!(vectorizer.vectorize(job.payload().unwrap()).unwrap(), VectorOutcome::Vectorized);
        training.complete(&job).unwrap();
    }
    report.documents
}

#[test]
fn nearest_document_decides_the_category() {
    let dir = corpus();
    let store = Store::temporary().unwrap();
    assert_eq!(trained(&store, dir.path()), 4);

    let classifier = Classifier::new(store.clone(), IdfVariant::Standard);
    let sport = classifier.classify("A stunning goal from the striker in the stadium").unwrap().unwrap();
    assert_eq!(sport.category, "sport");
    let politics = classifier.classify("The budget debate in parliament").unwrap().unwrap();
    assert_eq!(politics.category, "politics");
    assert!(politics.similarity > 0.0 && politics.similarity <= 1.0 + 1e-12);

    // deterministic
    let again = classifier.classify("The budget debate in parliament").unwrap().unwrap();
    assert_eq!(again, politics);
}

#[test]
fn feature_space_excludes_numbers_and_respects_the_cap() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a", "x.txt", "rain rain rain 2024 2024 2024 2024 wind");
    write(dir.path(), "b", "y.txt", "sun sun wind");
    let store = Store::temporary().unwrap();
    let queues = JobQueues::open(store.db(), 3).unwrap();
    let report = Trainer::new(store.clone(), 2).train(dir.path(), &queues.get(QueueName::Training)).unwrap();
    assert_eq!(report.stems, 2);
    assert_eq!(store.stems.names().unwrap(), vec!["rain", "sun"]);
    assert_eq!(queues.get(QueueName::Training).len(), 2);

    let docs: Vec<_> = store.documents.iter().map(|d| d.unwrap()).collect();
    assert_eq!(docs[0].category, "a");
    assert_eq!(docs[0].stems.iter().filter(|s| *s == "2024").count(), 4);
    assert!(docs.iter().all(|d| d.tfidf_vector.is_empty()));
}

#[test]
fn retraining_replaces_the_corpus_and_stales_old_jobs() {
    let dir = corpus();
    let store = Store::temporary().unwrap();
    let queues = JobQueues::open(store.db(), 3).unwrap();
    let training = queues.get(QueueName::Training);
    let trainer = Trainer::new(store.clone(), 8000);
    let first = trainer.train(dir.path(), &training).unwrap();
    let stale = training.claim().unwrap().unwrap();
    let second = trainer.train(dir.path(), &training).unwrap();
    assert_eq!(second.generation, first.generation + 1);
    assert_eq!(store.documents.count(), 4);

    let vectorizer = Vectorizer::new(store.clone(), IdfVariant::Standard);
    assert_eq!(vectorizer.vectorize(stale.payload().unwrap()).unwrap(), VectorOutcome::Stale);

    let id = store.documents.ids().unwrap()[0];
    let job = VectorizeJob { document_id: id, generation: second.generation };
    assert_eq!(vectorizer.vectorize(job).unwrap(), VectorOutcome::Vectorized);
    assert_eq!(vectorizer.vectorize(job).unwrap(), VectorOutcome::AlreadyVectorized);
    assert_eq!(store.documents.find(id).unwrap().unwrap().tfidf_vector.len(), store.stems.count());
    let missing = VectorizeJob { document_id: u64::MAX, generation: second.generation };
    assert_eq!(vectorizer.vectorize(missing).unwrap(), VectorOutcome::Missing);
}

#[test]
fn empty_root_is_an_error_and_untrained_classifies_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::temporary().unwrap();
    let queues = JobQueues::open(store.db(), 3).unwrap();
    assert!(Trainer::new(store.clone(), 10).train(dir.path(), &queues.get(QueueName::Training)).is_err());
    assert!(Classifier::new(store, IdfVariant::Standard).classify("anything").unwrap().is_none());
}

#[test]
fn non_utf8_documents_are_skipped() {
    let dir = corpus();
    fs::write(dir.path().join("sport").join("3.bin"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
    let store = Store::temporary().unwrap();
    let queues = JobQueues::open(store.db(), 3).unwrap();
    let report = Trainer::new(store.clone(), 8000).train(dir.path(), &queues.get(QueueName::Training)).unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.documents, 4);
}

#[test]
fn unreadable_corpus_keeps_the_previous_training() {
    let good = corpus();
    let store = Store::temporary().unwrap();
    assert_eq!(trained(&store, good.path()), 4);
    let generation = store.generation().unwrap();

    let bad = tempfile::tempdir().unwrap();
    fs::create_dir_all(bad.path().join("sport")).unwrap();
    fs::write(bad.path().join("sport").join("1.bin"), [0xff, 0xfe]).unwrap();
    let queues = JobQueues::open(store.db(), 3).unwrap();
    let training = queues.get(QueueName::Training);
    assert!(Trainer::new(store.clone(), 8000).train(bad.path(), &training).is_err());

    assert!(training.is_empty());
    assert_eq!(store.generation().unwrap(), generation);
    assert_eq!(store.documents.count(), 4);
    let still = Classifier::new(store, IdfVariant::Standard).classify("late goal from the striker").unwrap().unwrap();
    assert_eq!(still.category, "sport");
}

#[test]
fn identical_text_classifies_into_its_own_category() {
    let dir = tempfile::tempdir().unwrap();
    let alpha = "Volcanic eruption spews lava across glaciers near Reykjavik";
    write(dir.path(), "alpha", "a.txt", alpha);
    write(dir.path(), "beta", "b.txt", "Orchestra premieres symphony featuring violins and cellos");
    let store = Store::temporary().unwrap();
    assert_eq!(trained(&store, dir.path()), 2);

    let found = Classifier::new(store, IdfVariant::Standard).classify(alpha).unwrap().unwrap();
    assert_eq!(found.category, "alpha");
    assert_eq!(found.document, "a.txt");
    assert!((found.similarity - 1.0).abs() < 1e-9);
}
