use axum::{
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use enricher::{
    cli::Args,
    error::EnricherError,
    pipeline::{self, models::Category, output},
};
use serde_json::{json, Value};
use std::path::Path;
use tempfile::tempdir;

/// Answers like Ollama: phishing for anything mentioning an invoice, internal otherwise.
async fn fake_ollama() -> String {
    async fn generate(Json(body): Json<Value>) -> Json<Value> {
        let prompt = body["prompt"].as_str().unwrap_or_default();
        let message = prompt
            .rsplit("Message to analyze:\n")
            .next()
            .unwrap_or_default();

        let answer = if message.contains("invoice") {
            json!({
                "category": "Phishing",
                "description": "Urgent unpaid invoice demanding immediate payment through an unknown link",
                "emails": ["Billing@Pay-Now.io", "billing@pay-now.io", "bad@@mail.com"],
            })
        } else {
            json!({
                "category": "internal",
                "description": "word ".repeat(40),
                "emails": [],
            })
        };

        Json(json!({"model": body["model"], "response": answer.to_string(), "done": true}))
    }

    let router = Router::new()
        .route("/api/tags", get(|| async { Json(json!({"models": []})) }))
        .route("/api/generate", post(generate));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    format!("http://{addr}")
}

fn args(llm_url: &str, input: &Path, output: &Path) -> Args {
    Args::try_parse_from([
        "enricher",
        "--llm-url",
        llm_url,
        "--max-concurrency",
        "2",
        "--retries",
        "0",
        "--input-path",
        input.to_str().unwrap(),
        "--output-path",
        output.to_str().unwrap(),
        "run",
    ])
    .expect("arguments parse")
}

#[tokio::test]
async fn enriches_dataset_end_to_end() {
    let tmp = tempdir().unwrap();
    let input = tmp.path().join("messages.json");
    let output_path = tmp.path().join("output/results.json");
    std::fs::write(
        &input,
        json!([
            {"id": 2, "text": "Your invoice is overdue, pay at billing@pay-now.io"},
            {"id": 1, "text": "Standup moved to 10am"},
            {"id": 3, "message": "Quarterly planning notes"},
        ])
        .to_string(),
    )
    .unwrap();

    let url = fake_ollama().await;
    let args = args(&url, &input, &output_path);
    let summary = pipeline::run(&args.pipeline).await.expect("pipeline runs");

    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 3);

    let results = output::load_previous(&output_path).await;
    assert_eq!(results.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3]);

    let phishing = &results[1];
    assert_eq!(phishing.category, Some(Category::Phishing));
    assert_eq!(phishing.emails, Some(vec!["billing@pay-now.io".to_string()]));

    let internal = &results[0];
    assert_eq!(internal.category, Some(Category::Internal));
    assert_eq!(
        internal.description.as_deref().unwrap().split_whitespace().count(),
        25
    );

    // A second run has nothing left to do.
    let summary = pipeline::run(&args.pipeline).await.expect("pipeline reruns");
    assert_eq!(summary.total, 0);
    assert_eq!(summary.skipped, 3);
    assert_eq!(output::load_previous(&output_path).await.len(), 3);
}

#[tokio::test]
async fn unreachable_llm_aborts_before_processing() {
    let tmp = tempdir().unwrap();
    let input = tmp.path().join("messages.json");
    let output_path = tmp.path().join("results.json");
    std::fs::write(&input, r#"["hello"]"#).unwrap();

    let args = args("http://127.0.0.1:9", &input, &output_path);
    let err = pipeline::run(&args.pipeline).await.unwrap_err();

    assert!(matches!(err, EnricherError::LlmUnavailable(_)));
    assert!(!output_path.exists());
}

#[tokio::test]
async fn missing_dataset_is_an_error() {
    let tmp = tempdir().unwrap();
    let url = fake_ollama().await;
    let args = args(
        &url,
        &tmp.path().join("absent.json"),
        &tmp.path().join("results.json"),
    );

    let err = pipeline::run(&args.pipeline).await.unwrap_err();
    assert!(err.to_string().contains("dataset file not found"));
}
