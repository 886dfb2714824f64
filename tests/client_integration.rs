use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bulldozer_client::{
    ChatSession, Client, DecodedMessage, Error, StreamUpdate,
    config::ApiConfig,
    session::SessionEvent,
    types::{ChatOptions, MessageRole, ResearchRequest, RiskLevel},
};
use futures::StreamExt;
use serde_json::{Value, json};

const HELLO_WORLD: &str = "data: {\"content\":\"Hello \"}\n\
                           data: {\"content\":\"world\",\"researchId\":\"r1\"}\n\
                           data: [DONE]\n";

#[derive(Clone, Default)]
struct Backend {
    last_chat_body: Arc<Mutex<Option<Value>>>,
}

fn sse(body: impl Into<Body>) -> Response {
    ([(header::CONTENT_TYPE, "text/event-stream")], body.into()).into_response()
}

async fn chat_stream(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    let message = body["message"].as_str().unwrap_or_default().to_string();
    *backend.last_chat_body.lock().unwrap() = Some(body);

    match message.as_str() {
        "fail" => (StatusCode::INTERNAL_SERVER_ERROR, "agent crashed").into_response(),
        "chunked" => {
            let chunks = vec![
                ": keep-alive\n\ndata: {\"content\":\"Str",
                "eamed\"}\ndata: {\"content\":\" reply\",\"resear",
                "chId\":\"r42\"}\n\ndata: {oops}\ndata: [DO",
                "NE]\ndata: {\"content\":\" after\"}\n",
            ];
            let stream = futures::stream::iter(chunks.into_iter().map(Ok::<_, std::io::Error>));
            sse(Body::from_stream(stream))
        }
        "truncated" => sse("data: {\"content\":\"cut off\"}\n"),
        "slow" => {
            let frames = [
                "data: {\"content\":\"one \"}\n",
                "data: {\"content\":\"two \"}\n",
                "data: {\"content\":\"three\",\"researchId\":\"r9\"}\n",
                "data: [DONE]\n",
            ];
            let stream = futures::stream::iter(frames).then(|frame| async move {
                tokio::time::sleep(Duration::from_millis(600)).await;
                Ok::<_, std::io::Error>(frame)
            });
            sse(Body::from_stream(stream))
        }
        "reset" => {
            let chunks: Vec<Result<&'static str, std::io::Error>> = vec![
                Ok("data: {\"content\":\"partial\"}\n"),
                Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "backend died")),
            ];
            sse(Body::from_stream(futures::stream::iter(chunks)))
        }
        _ => sse(HELLO_WORLD),
    }
}

async fn get_research(Path(id): Path<String>) -> Response {
    if id != "r1" {
        return (StatusCode::NOT_FOUND, "no such research").into_response();
    }
    Json(json!({
        "id": "r1",
        "title": "Acme Corp background",
        "company": "Acme Corp",
        "summary": "Two open labor disputes.",
        "keyFindings": ["NLRB complaint filed in 2024"],
        "sources": [{
            "title": "NLRB docket",
            "type": "Legal",
            "url": "https://example.org/docket",
            "date": "2024-06-01T00:00:00Z",
            "relevance": 0.95
        }],
        "analysis": {
            "level": "High",
            "score": 78,
            "recommendations": ["Review contracts"],
            "concerns": ["Pending litigation"]
        },
        "createdAt": "2025-01-10T09:00:00Z",
        "updatedAt": "2025-01-10T09:30:00Z"
    }))
    .into_response()
}

async fn create_research(Json(body): Json<Value>) -> Response {
    Json(json!({
        "id": "r2",
        "title": body["query"],
        "company": body["company"],
        "summary": "",
        "keyFindings": body["focusAreas"],
        "sources": [],
        "analysis": { "level": "Low", "score": 5, "recommendations": [], "concerns": [] },
        "createdAt": "2025-01-11T00:00:00Z",
        "updatedAt": "2025-01-11T00:00:00Z"
    }))
    .into_response()
}

async fn get_config() -> Response {
    Json(json!({
        "models": { "basic": ["gpt-4o-mini"], "reasoning": ["o3"] },
        "features": {
            "deepThinking": true,
            "backgroundInvestigation": true,
            "reportStyles": ["bulldozer", "investigator"]
        }
    }))
    .into_response()
}

/// Start a fake backend on an ephemeral port and return its API root.
async fn spawn_backend() -> (String, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/api/chat/stream", post(chat_stream))
        .route("/api/research", post(create_research))
        .route("/api/research/{id}", get(get_research))
        .route("/api/config", get(get_config))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/api"), backend)
}

#[tokio::test]
async fn test_chat_send_decodes_reply() -> anyhow::Result<()> {
    let (base, backend) = spawn_backend().await;
    let client = Client::new(&base)?;

    let reply = client.chat().send("Who runs Acme?").await?;
    assert_eq!(
        reply,
        DecodedMessage {
            content: "Hello world".into(),
            correlation_id: Some("r1".into()),
            is_complete: true,
        }
    );

    let body = backend.last_chat_body.lock().unwrap().clone().unwrap();
    assert_eq!(
        body,
        json!({
            "message": "Who runs Acme?",
            "enableDeepThinking": false,
            "enableBackgroundInvestigation": true,
            "reportStyle": "COMPREHENSIVE"
        })
    );
    Ok(())
}

#[tokio::test]
async fn test_chat_send_with_options() -> anyhow::Result<()> {
    let (base, backend) = spawn_backend().await;
    let client = Client::new(format!("{base}/"))?;

    let options = ChatOptions {
        enable_deep_thinking: true,
        enable_background_investigation: false,
        report_style: "investigator".into(),
    };
    client.chat().send_with_options("hi", &options).await?;

    let body = backend.last_chat_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["enableDeepThinking"], true);
    assert_eq!(body["enableBackgroundInvestigation"], false);
    assert_eq!(body["reportStyle"], "investigator");
    Ok(())
}

#[tokio::test]
async fn test_chat_server_error_is_not_decoded() -> anyhow::Result<()> {
    let (base, _) = spawn_backend().await;
    let client = Client::new(&base)?;

    let err = client.chat().send("fail").await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    match err {
        Error::Server { message, .. } => assert_eq!(message, "agent crashed"),
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_chat_without_sentinel_is_incomplete() -> anyhow::Result<()> {
    let (base, _) = spawn_backend().await;
    let reply = Client::new(&base)?.chat().send("truncated").await?;
    assert_eq!(reply.content, "cut off");
    assert!(!reply.is_complete);
    Ok(())
}

#[tokio::test]
async fn test_chat_stream_yields_updates() -> anyhow::Result<()> {
    let (base, _) = spawn_backend().await;
    let client = Client::new(&base)?;

    let mut updates = client
        .chat()
        .stream("chunked", &ChatOptions::default())
        .await?;
    let mut seen = Vec::new();
    while let Some(update) = updates.next().await {
        seen.push(update?);
    }

    assert_eq!(
        seen,
        vec![
            StreamUpdate::Delta("Streamed".into()),
            StreamUpdate::Correlation("r42".into()),
            StreamUpdate::Delta(" reply".into()),
            StreamUpdate::Done,
        ]
    );

    // The batch path agrees with the incremental one.
    let batch = client.chat().send("chunked").await?;
    assert_eq!(batch.content, "Streamed reply");
    assert_eq!(batch.correlation_id.as_deref(), Some("r42"));
    assert!(batch.is_complete);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_backend_is_a_network_error() -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let client = Client::new(format!("http://{addr}/api"))?;
    let err = client.chat().send("hello").await.unwrap_err();
    assert!(matches!(err, Error::Network(_)), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn test_research_and_config_endpoints() -> anyhow::Result<()> {
    let (base, _) = spawn_backend().await;
    let client = Client::new(&base)?;

    let report = client.research().get("r1").await?;
    assert_eq!(report.company, "Acme Corp");
    assert_eq!(report.analysis.level, RiskLevel::High);
    assert_eq!(report.sources.len(), 1);

    let missing = client.research().get("nope").await.unwrap_err();
    assert_eq!(missing.status(), Some(404));

    let created = client
        .research()
        .create(&ResearchRequest {
            query: "Labor practices at Acme".into(),
            company: Some("Acme Corp".into()),
            focus_areas: vec!["unions".into(), "safety".into()],
        })
        .await?;
    assert_eq!(created.id, "r2");
    assert_eq!(created.title, "Labor practices at Acme");
    assert_eq!(created.key_findings, vec!["unions", "safety"]);

    let cfg = client.configuration().get().await?;
    assert_eq!(cfg.models.basic, vec!["gpt-4o-mini"]);
    assert!(cfg.features.deep_thinking);
    assert_eq!(cfg.features.report_styles.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_session_send_records_exchange() -> anyhow::Result<()> {
    let (base, _) = spawn_backend().await;
    let client = Client::new(&base)?;
    let session = ChatSession::new();
    let mut events = session.subscribe();

    let reply = session
        .send(&client, "Who runs Acme?", &ChatOptions::default())
        .await?
        .expect("non-empty input is sent");
    assert_eq!(reply.content, "Hello world");
    assert_eq!(reply.research_id.as_deref(), Some("r1"));

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[1], reply);
    assert!(!session.is_typing());
    assert_eq!(session.latest_research_id().as_deref(), Some("r1"));

    let mut seen = Vec::new();
    while let Ok(evt) = events.try_recv() {
        seen.push(evt);
    }
    assert!(matches!(seen[0], SessionEvent::MessageAdded(_)));
    assert_eq!(seen[1], SessionEvent::Typing(true));
    assert!(matches!(seen[2], SessionEvent::MessageAdded(_)));
    assert_eq!(seen[3], SessionEvent::Typing(false));
    Ok(())
}

#[tokio::test]
async fn test_session_send_failure_records_error() -> anyhow::Result<()> {
    let (base, _) = spawn_backend().await;
    let client = Client::new(&base)?;
    let session = ChatSession::new();

    let result = session.send(&client, "fail", &ChatOptions::default()).await;
    assert!(result.is_err());
    assert!(!session.is_typing());
    assert_eq!(session.message_count(), 1);
    assert!(session.error_message().unwrap().contains("500"));

    // A successful send clears the previous error.
    session
        .send(&client, "again", &ChatOptions::default())
        .await?;
    assert!(session.error_message().is_none());
    Ok(())
}

#[tokio::test]
async fn test_session_ignores_blank_input() -> anyhow::Result<()> {
    let (base, _) = spawn_backend().await;
    let client = Client::new(&base)?;
    let session = ChatSession::new();

    assert!(session.send(&client, "   ", &ChatOptions::default()).await?.is_none());
    assert_eq!(session.message_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_session_send_streaming() -> anyhow::Result<()> {
    let (base, _) = spawn_backend().await;
    let client = Client::new(&base)?;
    let session = ChatSession::new();
    let mut events = session.events();

    let mut printed = String::new();
    let reply = session
        .send_streaming(&client, "chunked", &ChatOptions::default(), |update| {
            if let StreamUpdate::Delta(text) = update {
                printed.push_str(text);
            }
        })
        .await?
        .unwrap();

    assert_eq!(printed, "Streamed reply");
    assert_eq!(reply.content, "Streamed reply");
    assert_eq!(reply.research_id.as_deref(), Some("r42"));

    let mut deltas = Vec::new();
    while let Some(Ok(evt)) = events.next().await {
        match evt {
            SessionEvent::AssistantDelta(text) => deltas.push(text),
            SessionEvent::Typing(false) => break,
            _ => {}
        }
    }
    assert_eq!(deltas, vec!["Streamed", " reply"]);
    Ok(())
}

#[tokio::test]
async fn test_slow_reply_outlives_timeout() -> anyhow::Result<()> {
    let (base, _) = spawn_backend().await;
    let client = Client::from_config(&ApiConfig {
        base_url: base,
        timeout_secs: 1,
    })?;

    // Four frames 600 ms apart: no gap exceeds the limit, the whole reply does.
    let reply = client.chat().send("slow").await?;
    assert_eq!(reply.content, "one two three");
    assert_eq!(reply.correlation_id.as_deref(), Some("r9"));
    assert!(reply.is_complete);

    let session = ChatSession::new();
    let reply = session
        .send_streaming(&client, "slow", &ChatOptions::default(), |_| {})
        .await?
        .unwrap();
    assert_eq!(reply.content, "one two three");
    assert!(session.error_message().is_none());
    Ok(())
}

#[tokio::test]
async fn test_session_stream_reset_records_error() -> anyhow::Result<()> {
    let (base, _) = spawn_backend().await;
    let client = Client::new(&base)?;
    let session = ChatSession::new();

    let result = session
        .send_streaming(&client, "reset", &ChatOptions::default(), |_| {})
        .await;

    assert!(matches!(result, Err(Error::Network(_))), "got {result:?}");
    // Only the user message is kept; the partial reply is dropped.
    assert_eq!(session.message_count(), 1);
    assert!(!session.is_typing());
    assert!(session.error_message().is_some());
    Ok(())
}

#[tokio::test]
async fn test_session_open_research() -> anyhow::Result<()> {
    let (base, _) = spawn_backend().await;
    let client = Client::new(&base)?;
    let session = ChatSession::new();
    let mut events = session.subscribe();

    let reply = session
        .send(&client, "Who runs Acme?", &ChatOptions::default())
        .await?
        .unwrap();
    let id = reply.research_id.expect("reply carries a research id");

    let report = session.open_research(&client, &id).await?;
    assert_eq!(report.company, "Acme Corp");
    assert_eq!(session.current_research(), Some(report));

    let mut opened = None;
    while let Ok(evt) = events.try_recv() {
        if let SessionEvent::ResearchChanged(id) = evt {
            opened = id;
        }
    }
    assert_eq!(opened.as_deref(), Some("r1"));
    Ok(())
}

#[tokio::test]
async fn test_session_open_missing_research() -> anyhow::Result<()> {
    let (base, _) = spawn_backend().await;
    let client = Client::new(&base)?;
    let session = ChatSession::new();
    session.open_research(&client, "r1").await?;

    let err = session.open_research(&client, "nope").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(session.error_message().unwrap().contains("404"));
    // The previously opened report stays in place.
    assert_eq!(session.current_research().map(|r| r.id).as_deref(), Some("r1"));

    // A successful open dismisses the error.
    session.open_research(&client, "r1").await?;
    assert!(session.error_message().is_none());
    Ok(())
}
