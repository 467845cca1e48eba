//! Vision-model inference: prompt + PNG in, accumulated response text out.
//!
//! [`VisionModel`] is the seam between the runner and the model server. The
//! runner only ever needs the complete text of one generation, so the trait
//! hides streaming entirely; tests substitute a canned implementation.
//!
//! [`OllamaClient`] talks to Ollama's `POST /api/generate` with
//! `stream: true`. The server answers with newline-delimited JSON objects,
//! each carrying a `response` fragment; the final one has `done: true`.
//! Fragments are optionally echoed to stdout as they arrive.

use crate::config::AnnotatorConfig;
use crate::error::{AnnotatorError, FileError};
use crate::pipeline::encode::to_base64;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::Duration;
use tracing::debug;

/// A model that reads one image and answers a prompt.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Model identifier, for logs.
    fn name(&self) -> &str;

    /// Submit `prompt` with one PNG image and return the full response text.
    async fn generate(&self, prompt: &str, png: &[u8]) -> Result<String, FileError>;
}

/// Request body for `/api/generate`.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>,
    format: &'a str,
    stream: bool,
}

/// One line of the streamed response.
#[derive(Debug, Default, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Streaming client for a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    host: String,
    model: String,
    echo: bool,
}

impl OllamaClient {
    /// Client for `model` on the server at `host`, without echo or timeout.
    pub fn new(host: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            host: host.into(),
            model: model.into(),
            echo: false,
        }
    }

    /// Client built from the run configuration.
    pub fn from_config(config: &AnnotatorConfig) -> Result<Self, AnnotatorError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| AnnotatorError::Internal(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            host: config.ollama_host.clone(),
            model: config.model.clone(),
            echo: config.echo_stream,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.host.trim_end_matches('/'))
    }

    fn consume_line(&self, line: &[u8], text: &mut String) -> Result<bool, FileError> {
        if line.iter().all(u8::is_ascii_whitespace) {
            return Ok(false);
        }
        let chunk: GenerateChunk = serde_json::from_slice(line)
            .map_err(|e| FileError::InferenceStream(format!("undecodable chunk: {}", e)))?;

        if let Some(message) = chunk.error {
            return Err(FileError::ModelError {
                model: self.model.clone(),
                message,
            });
        }

        if self.echo && !chunk.response.is_empty() {
            let mut out = std::io::stdout().lock();
            let _ = out.write_all(chunk.response.as_bytes());
            let _ = out.flush();
        }
        text.push_str(&chunk.response);
        Ok(chunk.done)
    }
}

#[async_trait]
impl VisionModel for OllamaClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, png: &[u8]) -> Result<String, FileError> {
        let url = self.endpoint();
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            images: vec![to_base64(png)],
            format: "json",
            stream: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| FileError::InferenceRequest {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FileError::InferenceStatus {
                status: status.as_u16(),
                body,
            });
        }

        let mut stream = response.bytes_stream();
        let mut lines = LineBuffer::default();
        let mut text = String::new();
        let mut chunks = 0usize;
        let mut done = false;

        while let Some(bytes) = stream.next().await {
            let bytes = bytes.map_err(|e| FileError::InferenceStream(e.to_string()))?;
            for line in lines.push(&bytes) {
                chunks += 1;
                done |= self.consume_line(&line, &mut text)?;
            }
        }
        if let Some(line) = lines.finish() {
            chunks += 1;
            done |= self.consume_line(&line, &mut text)?;
        }

        debug!(
            "{}: {} chunks, {} chars, done={}",
            self.model,
            chunks,
            text.len(),
            done
        );
        Ok(text)
    }
}

/// Splits a byte stream into newline-terminated lines.
///
/// Network chunks do not respect line boundaries, so partial lines are held
/// until the rest arrives.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            lines.push(line);
        }
        lines
    }

    /// The trailing line, if the stream did not end with a newline.
    fn finish(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn line_buffer_joins_split_lines() {
        let mut buf = LineBuffer::default();
        assert!(buf.push(b"{\"response\":\"Hel").is_empty());
        let lines = buf.push(b"lo\"}\n{\"response\":\"!\"}\n{\"do");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], b"{\"response\":\"Hello\"}");
        assert_eq!(buf.finish().unwrap(), b"{\"do");
        assert!(buf.finish().is_none());
    }

    #[test]
    fn request_body_shape() {
        let body = GenerateRequest {
            model: "llava:13b-v1.6",
            prompt: "p",
            images: vec!["aGk=".into()],
            format: "json",
            stream: true,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "model": "llava:13b-v1.6",
                "prompt": "p",
                "images": ["aGk="],
                "format": "json",
                "stream": true
            })
        );
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/", "llava");
        assert_eq!(client.endpoint(), "http://localhost:11434/api/generate");
    }

    /// Serve exactly one HTTP request with a canned response and hand back
    /// the request body.
    async fn serve_once(status: &'static str, body: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            let body_start = loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let headers = String::from_utf8_lossy(&raw[..body_start]).to_lowercase();
            let content_length: usize = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .map(|v| v.trim().parse().unwrap())
                .unwrap_or(0);
            while raw.len() < body_start + content_length {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
            }

            let reply = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/x-ndjson\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();

            String::from_utf8_lossy(&raw[body_start..]).into_owned()
        });

        (format!("http://{addr}"), handle)
    }

    #[tokio::test]
    async fn generate_concatenates_stream() {
        let body = concat!(
            "{\"model\":\"llava\",\"response\":\"{\\\"currency_type\\\":\",\"done\":false}\n",
            "{\"model\":\"llava\",\"response\":\"\\\"EUR\\\"}\",\"done\":false}\n",
            "{\"model\":\"llava\",\"response\":\"\",\"done\":true}\n",
        )
        .to_string();
        let (host, server) = serve_once("200 OK", body).await;

        let client = OllamaClient::new(host, "llava");
        let text = client.generate("describe", b"png-bytes").await.unwrap();
        assert_eq!(text, "{\"currency_type\":\"EUR\"}");

        let request: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(request["model"], "llava");
        assert_eq!(request["format"], "json");
        assert_eq!(request["stream"], true);
        assert_eq!(request["images"][0], to_base64(b"png-bytes"));
    }

    #[tokio::test]
    async fn http_error_status_fails() {
        let (host, _server) =
            serve_once("404 Not Found", "{\"error\":\"model not found\"}".to_string()).await;
        let client = OllamaClient::new(host, "missing");
        let err = client.generate("p", b"x").await.unwrap_err();
        assert!(
            matches!(err, FileError::InferenceStatus { status: 404, .. }),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn in_stream_error_fails() {
        let body = "{\"response\":\"{\"}\n{\"error\":\"out of memory\"}\n".to_string();
        let (host, _server) = serve_once("200 OK", body).await;
        let client = OllamaClient::new(host, "llava");
        let err = client.generate("p", b"x").await.unwrap_err();
        assert!(matches!(err, FileError::ModelError { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn unreachable_server_is_request_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = OllamaClient::new(format!("http://{addr}"), "llava");
        let err = client.generate("p", b"x").await.unwrap_err();
        assert!(matches!(err, FileError::InferenceRequest { .. }), "got {err:?}");
    }
}
