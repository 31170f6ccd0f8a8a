use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use lemmadex_core::model::{NewArticle, NewDocument, PosTag};
use lemmadex_core::queue::{NewJob, QueueName};
use lemmadex_core::{Settings, Store};
use serde_json::Value;
use server::{build_app, AppState};
use tower::ServiceExt;

fn seeded_store() -> Store {
    let store = Store::temporary().unwrap();
    for (url, header, lemmas) in [
        ("https://www.bbc.com/news/a-1", "Floods close roads", vec!["flood", "road"]),
        ("https://www.bbc.com/news/b-2", "Flood warning issued", vec!["flood", "flood", "flood", "warning"]),
        ("https://www.bbc.com/news/c-3", "Markets rally", vec!["market", "rally"]),
    ] {
        let article = store.articles.create(NewArticle { url: url.into(), header: header.into(), body: String::new() }).unwrap().unwrap();
        let tags: Vec<PosTag> = lemmas.iter().map(|l| PosTag { token: l.to_string(), tag: "NN".into(), lemma: Some(l.to_string()) }).collect();
        store.articles.set_tags(article.id, &tags).unwrap();
        for lemma in &lemmas {
            let n = lemmas.iter().filter(|l| *l == lemma).count() as u32;
            store.lemmas.add_posting(lemma, article.id, n).unwrap();
        }
    }
    let weights = store.lemmas.find("flood").unwrap().unwrap().postings.keys().map(|id| (*id, *id as f64)).collect();
    store.lemmas.reconcile("flood", &weights).unwrap();
    store
}

fn app(store: Store, token: Option<&str>) -> (Router, AppState) {
    let state = AppState::new(store, &Settings::default(), token.map(str::to_string)).unwrap();
    (build_app(state.clone(), None), state)
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn query_returns_postings_by_weight() {
    let (app, _) = app(seeded_store(), None);
    let (status, json) = call(app, Request::get("/query?q=FLOOD&k=5").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    let lemmas = json["lemmas"].as_array().unwrap();
    assert_eq!(lemmas.len(), 1);
    assert_eq!(lemmas[0]["total_appearances"], 4);
    let hits = lemmas[0]["hits"].as_array().unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits[0]["weight"].as_f64().unwrap() >= hits[1]["weight"].as_f64().unwrap());
    assert_eq!(hits[0]["highlighted"], "<em>Flood</em> warning issued");
}

#[tokio::test]
async fn health_and_missing_article() {
    let (app, _) = app(seeded_store(), None);
    let resp = app.clone().oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let (status, _) = call(app, Request::get("/article/987654").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn classify_without_training_has_no_category() {
    let (app, _) = app(Store::temporary().unwrap(), None);
    let req = Request::post("/classify").header("content-type", "application/json").body(Body::from(r#"{"text":"goal"}"#)).unwrap();
    let (status, json) = call(app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["category"].is_null());
}

#[tokio::test]
async fn classify_picks_the_single_vectorized_document() {
    let store = Store::temporary().unwrap();
    let doc = store
        .documents
        .create(NewDocument { name: "1.txt".into(), category: "sport".into(), text: "goal".into(), stems: vec!["goal".into()] })
        .unwrap();
    store.stems.replace_all(&["goal".to_string()]).unwrap();
    store.documents.set_vector(doc.id, &[1.0]).unwrap();
    let (app, _) = app(store, None);
    let req = Request::post("/classify").header("content-type", "application/json").body(Body::from(r#"{"text":"late goal"}"#)).unwrap();
    let (status, json) = call(app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["category"], "sport");
}

#[tokio::test]
async fn drain_requires_the_admin_token() {
    let (app, state) = app(Store::temporary().unwrap(), Some("s3cret"));
    state.queues.get(QueueName::Lemmas).add(NewJob::new("1", &1).unwrap()).unwrap();

    let (status, _) = call(app.clone(), Request::post("/admin/drain").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::post("/admin/drain").header("X-ADMIN-TOKEN", "s3cret").body(Body::empty()).unwrap();
    let (status, json) = call(app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], 1);
    assert!(state.queues.get(QueueName::Lemmas).is_empty());
}
