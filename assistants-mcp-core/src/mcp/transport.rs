//! MCP Transport Implementations
//!
//! Transports move raw newline-delimited JSON in and serialized responses
//! out. Parsing and routing stay in the server so malformed input still gets
//! a proper JSON-RPC error.

use super::protocol::JsonRpcResponse;
use super::server::McpServer;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

/// Incoming side of a transport
#[async_trait]
pub trait MessageSource: Send {
    /// Next raw message, or `None` at end of input
    async fn next_message(&mut self) -> Result<Option<String>>;
}

/// Outgoing side of a transport
#[async_trait]
pub trait MessageSink: Send {
    async fn send(&mut self, response: &JsonRpcResponse) -> Result<()>;
}

/// Reads one message per line, skipping blank lines
pub struct LineSource<R> {
    reader: R,
}

impl<R: AsyncBufRead + Unpin + Send> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl LineSource<BufReader<Stdin>> {
    /// Messages from stdin
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> MessageSource for LineSource<R> {
    async fn next_message(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line).await? == 0 {
                return Ok(None); // EOF
            }
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }
    }
}

/// Writes one response per line and flushes after each
pub struct LineSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> LineSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl LineSink<Stdout> {
    /// Responses to stdout
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> MessageSink for LineSink<W> {
    async fn send(&mut self, response: &JsonRpcResponse) -> Result<()> {
        let mut json = serde_json::to_vec(response)?;
        json.push(b'\n');
        self.writer.write_all(&json).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// In-memory message source for testing
#[derive(Debug, Default)]
pub struct MemorySource {
    messages: VecDeque<String>,
}

impl MemorySource {
    pub fn new<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            messages: messages.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn next_message(&mut self) -> Result<Option<String>> {
        Ok(self.messages.pop_front())
    }
}

/// In-memory sink that collects responses for testing
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    responses: Arc<Mutex<Vec<JsonRpcResponse>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Responses sent so far
    pub async fn responses(&self) -> Vec<JsonRpcResponse> {
        self.responses.lock().await.clone()
    }
}

#[async_trait]
impl MessageSink for MemorySink {
    async fn send(&mut self, response: &JsonRpcResponse) -> Result<()> {
        self.responses.lock().await.push(response.clone());
        Ok(())
    }
}

impl McpServer {
    /// Serve messages until the source is exhausted
    ///
    /// Each message is handled on its own task so a slow tool call does not
    /// hold up `ping` or a cancellation. Responses may therefore be written
    /// out of request order; clients match them by id.
    pub async fn run<S, W>(self: Arc<Self>, mut source: S, mut sink: W) -> Result<()>
    where
        S: MessageSource,
        W: MessageSink + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<JsonRpcResponse>(64);
        let writer = tokio::spawn(async move {
            while let Some(response) = rx.recv().await {
                if let Err(e) = sink.send(&response).await {
                    tracing::error!(error = %e, "Failed to write response");
                    break;
                }
            }
        });

        tracing::info!(server = %self.config().name, "MCP server listening");

        let mut tasks = JoinSet::new();
        let outcome = loop {
            let message = match source.next_message().await {
                Ok(Some(message)) => message,
                Ok(None) => break Ok(()),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read message");
                    break Err(e);
                }
            };

            let server = self.clone();
            let tx = tx.clone();
            tasks.spawn(async move {
                if let Some(response) = server.handle_message(&message).await
                    && tx.send(response).await.is_err()
                {
                    tracing::warn!("Response dropped, writer has stopped");
                }
            });

            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Request task failed");
                }
            }
        };

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Request task failed");
            }
        }
        drop(tx);
        if let Err(e) = writer.await {
            tracing::error!(error = %e, "Response writer failed");
        }

        tracing::info!("MCP server stopped");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AssistantsMcpConfig, ProviderConfig};
    use crate::mcp::protocol::{INVALID_REQUEST, PARSE_ERROR, RequestId};
    use crate::mcp::server::McpServerBuilder;

    fn server() -> Arc<McpServer> {
        let config = AssistantsMcpConfig {
            providers: vec![ProviderConfig::new("memory")],
            ..Default::default()
        };
        Arc::new(McpServerBuilder::from_config(config).build().unwrap())
    }

    #[tokio::test]
    async fn test_line_source_skips_blank_lines() {
        let input: &[u8] = b"\n{\"a\":1}\n   \n{\"b\":2}\n";
        let mut source = LineSource::new(input);

        assert_eq!(source.next_message().await.unwrap().as_deref(), Some("{\"a\":1}"));
        assert_eq!(source.next_message().await.unwrap().as_deref(), Some("{\"b\":2}"));
        assert_eq!(source.next_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_line_sink_writes_one_line_per_response() {
        let mut sink = LineSink::new(Vec::new());
        sink.send(&JsonRpcResponse::success(RequestId::from(1i64), serde_json::json!({})))
            .await
            .unwrap();
        sink.send(&JsonRpcResponse::success(RequestId::from(2i64), serde_json::json!({})))
            .await
            .unwrap();

        let written = String::from_utf8(sink.writer).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"id\":1"));
    }

    #[tokio::test]
    async fn test_run_session() {
        let source = MemorySource::new([
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-06-18","clientInfo":{"name":"t","version":"1"}}}"#,
        ]);
        let sink = MemorySink::new();
        let server = server();
        server.clone().run(source, sink.clone()).await.unwrap();

        let source = MemorySource::new([
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#,
            "not json",
            r#"[{"jsonrpc":"2.0","id":3,"method":"ping"}]"#,
        ]);
        server.run(source, sink.clone()).await.unwrap();

        let mut responses = sink.responses().await;
        assert_eq!(responses.len(), 4);
        assert_eq!(responses[0].id, RequestId::from(1i64));
        assert!(responses[0].result.is_some());

        responses.remove(0);
        let codes: Vec<Option<i32>> = responses
            .iter()
            .map(|r| r.error.as_ref().map(|e| e.code))
            .collect();
        assert!(codes.contains(&None));
        assert!(codes.contains(&Some(PARSE_ERROR)));
        assert!(codes.contains(&Some(INVALID_REQUEST)));
    }
}
