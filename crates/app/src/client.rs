use actuary_rag_core::conversation::REQUEST_FAILED;
use actuary_rag_core::{Conversation, DeliveryStatus, Message, Role};
use anyhow::bail;
use chrono::Local;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

pub enum Reply {
    Answer(Message),
    Refused(String),
}

/// Interactive terminal chat against a running server. `/quit` or EOF ends it.
pub async fn run_chat(server: &str) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let server = server.trim_end_matches('/');
    let mut conversation = Conversation::new();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    for message in conversation.messages() {
        stdout.write_all(render(message).as_bytes()).await?;
    }

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim() == "/quit" {
            break;
        }

        let Some(history) = conversation.begin_submit(&line) else {
            continue;
        };

        match send(&client, server, &history).await {
            Ok(Reply::Answer(reply)) => conversation.resolve_success(reply),
            Ok(Reply::Refused(error)) => conversation.resolve_failure(format!("오류: {error}")),
            Err(err) => {
                warn!(error = %err, "chat request failed");
                conversation.resolve_failure(REQUEST_FAILED);
            }
        }

        let messages = conversation.messages();
        for message in &messages[messages.len().saturating_sub(2)..] {
            stdout.write_all(render(message).as_bytes()).await?;
        }
    }

    Ok(())
}

pub async fn send(
    client: &reqwest::Client,
    server: &str,
    history: &[Message],
) -> anyhow::Result<Reply> {
    let response = client
        .post(format!("{server}/api/chat"))
        .json(&json!({ "messages": history }))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        bail!("chat endpoint returned {status}");
    }

    let body: Value = response.json().await?;
    if let Some(error) = body.get("error").and_then(Value::as_str) {
        return Ok(Reply::Refused(error.to_string()));
    }

    Ok(Reply::Answer(serde_json::from_value(body)?))
}

pub fn render(message: &Message) -> String {
    let speaker = match message.role {
        Role::User => "나",
        Role::Assistant => "AI",
    };
    let time = message
        .timestamp
        .map(|timestamp| timestamp.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_default();
    let status = match message.status {
        Some(DeliveryStatus::Sending) => " • 전송중...",
        Some(DeliveryStatus::Error) => " • 오류",
        _ => "",
    };

    format!("[{speaker}] {}\n    {time}{status}\n", message.content)
}
