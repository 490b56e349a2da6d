//! Tests for the Recorded metrics decorator.

use fcore::{
    CancellationToken, CompletionMeta, Host, Provider, StreamCallbacks, StreamChunk,
    StreamRequest, testing::ScriptedProvider,
};
use fleetbench_model::Recorded;
use metrics::Aggregator;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn aggregator(dir: &TempDir) -> Aggregator {
    Aggregator::open(dir.path().join("metrics.json"))
}

fn request(model: &str) -> StreamRequest {
    StreamRequest::new(Arc::new(Host::new("http://h", "ollama")), model)
}

fn meta(prompt: u64, output: u64) -> CompletionMeta {
    CompletionMeta {
        prompt_eval_count: prompt,
        eval_count: output,
        eval_duration: 1_000_000_000,
        ..Default::default()
    }
}

#[tokio::test]
async fn forwards_and_records_once() {
    let dir = TempDir::new().unwrap();
    let agg = aggregator(&dir);
    let inner = ScriptedProvider::new()
        .with_chunks(vec![StreamChunk::text("he"), StreamChunk::text("llo")])
        .with_meta(meta(300, 40));
    let provider = Recorded::new(inner, Some(agg.clone()));

    let events = Mutex::new(Vec::new());
    provider
        .stream(
            request("llama3"),
            StreamCallbacks::new()
                .on_chunk(|c| events.lock().unwrap().push(c.content.clone()))
                .on_complete(|m| events.lock().unwrap().push(format!("done:{}", m.eval_count))),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(events.into_inner().unwrap(), vec!["he", "llo", "done:40"]);
    let metrics = agg.model("llama3").unwrap();
    assert_eq!(metrics.overall.total_requests, 1);
    assert_eq!(metrics.overall.tokens_per_second.mean, 40.0);
    assert_eq!(metrics.overall.input_tokens.mean, 300.0);
}

#[tokio::test]
async fn ttft_measures_first_chunk() {
    let dir = TempDir::new().unwrap();
    let agg = aggregator(&dir);
    let inner = ScriptedProvider::new()
        .with_chunks(vec![StreamChunk::text("x")])
        .with_delay(Duration::from_millis(30));
    let provider = Recorded::new(inner, Some(agg.clone()));

    provider
        .stream(request("m"), StreamCallbacks::new(), &CancellationToken::new())
        .await
        .unwrap();

    let ttft = agg.model("m").unwrap().overall.ttft_ms;
    assert_eq!(ttft.count, 1);
    assert!(ttft.mean >= 30.0, "ttft was {}", ttft.mean);
}

#[tokio::test]
async fn no_chunks_records_zero_ttft() {
    let dir = TempDir::new().unwrap();
    let agg = aggregator(&dir);
    let provider = Recorded::new(
        ScriptedProvider::new().with_delay(Duration::from_millis(10)),
        Some(agg.clone()),
    );

    provider
        .stream(request("m"), StreamCallbacks::new(), &CancellationToken::new())
        .await
        .unwrap();

    let ttft = agg.model("m").unwrap().overall.ttft_ms;
    assert_eq!(ttft.count, 1);
    assert_eq!(ttft.mean, 0.0);
}

#[tokio::test]
async fn nested_wrappers_do_not_double_count() {
    let dir = TempDir::new().unwrap();
    let agg = aggregator(&dir);
    let inner = Recorded::new(ScriptedProvider::new(), Some(agg.clone()));
    let outer = Recorded::new(inner, Some(agg.clone()));

    outer
        .stream(request("m"), StreamCallbacks::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(agg.model("m").unwrap().overall.total_requests, 1);
}

#[tokio::test]
async fn without_aggregator_passes_through() {
    let provider = Recorded::new(
        ScriptedProvider::new().with_chunks(vec![StreamChunk::text("a")]),
        None,
    );
    let mut chunks = 0;
    let mut completed = false;

    provider
        .stream(
            request("m"),
            StreamCallbacks::new()
                .on_chunk(|_| chunks += 1)
                .on_complete(|_| completed = true),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(chunks, 1);
    assert!(completed);
    assert!(provider.aggregator().is_none());
}

#[tokio::test]
async fn inner_error_is_returned_after_recording() {
    let dir = TempDir::new().unwrap();
    let agg = aggregator(&dir);
    let provider = Recorded::new(
        ScriptedProvider::new()
            .with_chunks(vec![StreamChunk::text("partial")])
            .failing_midway("connection reset"),
        Some(agg.clone()),
    );

    let err = provider
        .stream(request("m"), StreamCallbacks::new(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "connection reset");
    assert_eq!(agg.model("m").unwrap().overall.total_requests, 1);
}

#[tokio::test]
async fn failure_before_start_records_nothing() {
    let dir = TempDir::new().unwrap();
    let agg = aggregator(&dir);
    let provider = Recorded::new(
        ScriptedProvider::new().failing_before_start("refused"),
        Some(agg.clone()),
    );

    let result = provider
        .stream(request("m"), StreamCallbacks::new(), &CancellationToken::new())
        .await;

    assert!(result.is_err());
    assert!(agg.snapshot().is_empty());
}

#[tokio::test]
async fn other_operations_pass_through() {
    let provider = Recorded::new(ScriptedProvider::new().with_loaded(&["a"]), None);
    let host = Host::new("http://h", "ollama");
    let cancel = CancellationToken::new();

    provider.ensure_model_ready(&host, "b", &cancel).await.unwrap();
    assert_eq!(provider.loaded_models(&host, &cancel).await.unwrap(), vec!["a", "b"]);
    provider.unload_model(&host, "a", &cancel).await.unwrap();
    assert_eq!(provider.inner.unloaded(), vec!["a"]);
    provider.close().unwrap();
    assert_eq!(provider.inner.close_count(), 1);
}
