pub mod deepseek;

use async_trait::async_trait;
use futures::Stream;
use futures_util::StreamExt;
use log::{ debug, error };
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::ChatSettings;
use crate::error::{ summarize, upstream_message, ChatError, ChatResult };
use crate::models::chat::ChatMessage;
use self::deepseek::DeepSeekChatClient;

/// Text fragments as the model produces them.
pub type TokenStream = Pin<Box<dyn Stream<Item = ChatResult<String>> + Send>>;

const STREAM_CHANNEL_CAPACITY: usize = 32;

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Starts a streamed completion over an already composed message list.
    ///
    /// Resolves once the provider has answered with a success status, so a
    /// rejected request surfaces here rather than inside the stream.
    async fn stream_chat(&self, messages: &[ChatMessage]) -> ChatResult<TokenStream>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> String;
}

pub fn new_client(settings: &ChatSettings) -> ChatResult<Arc<dyn ChatClient>> {
    let client = DeepSeekChatClient::from_settings(settings)?;
    Ok(Arc::new(client))
}

/// What a provider specific parser made of one line of a streamed body.
#[derive(Debug, PartialEq, Eq)]
pub enum StreamLine {
    Token(String),
    Done,
}

/// Reassembles newline delimited lines from arbitrary network chunks.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Appends `chunk` and returns every line it completed, without the
    /// trailing `\n` or `\r\n`.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Whatever is left once the body ends without a final newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Sends `request` and relays the parsed body as a [`TokenStream`].
///
/// A non-success status is read in full and returned as
/// [`ChatError::UpstreamCompletion`]. After that the body is forwarded by a
/// background task through a bounded channel; the task stops as soon as the
/// receiving side is dropped.
pub async fn http_stream_generate(
    request: reqwest::RequestBuilder,
    line_parser: fn(&str) -> Option<StreamLine>,
    fallback_error: &'static str
) -> ChatResult<TokenStream> {
    let resp = request.send().await?;
    let url = resp.url().to_string();
    let status = resp.status();

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        error!("Completion API error from {} ({}): {}", url, status, summarize(&body));
        return Err(ChatError::UpstreamCompletion {
            status: status.as_u16(),
            message: upstream_message(&body, fallback_error),
        });
    }

    let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut bytes = resp.bytes_stream();
        let mut lines = LineBuffer::default();
        let mut forwarded = 0usize;

        loop {
            let chunk = tokio::select! {
                _ = tx.closed() => {
                    debug!("Caller disconnected from {} after {} fragment(s)", url, forwarded);
                    return;
                }
                next = bytes.next() => next,
            };

            let buf = match chunk {
                Some(Ok(buf)) => buf,
                Some(Err(e)) => {
                    error!("Stream from {} failed after {} fragment(s): {}", url, forwarded, e);
                    let _ = tx.send(Err(ChatError::Transport(e))).await;
                    return;
                }
                None => {
                    break;
                }
            };

            for line in lines.push(&buf) {
                match line_parser(&line) {
                    Some(StreamLine::Token(tok)) => {
                        if tx.send(Ok(tok)).await.is_err() {
                            debug!("Caller disconnected from {} after {} fragment(s)", url, forwarded);
                            return;
                        }
                        forwarded += 1;
                    }
                    Some(StreamLine::Done) => {
                        debug!("Stream from {} completed with {} fragment(s)", url, forwarded);
                        return;
                    }
                    None => {}
                }
            }
        }

        if let Some(line) = lines.finish() {
            if let Some(StreamLine::Token(tok)) = line_parser(&line) {
                let _ = tx.send(Ok(tok)).await;
                forwarded += 1;
            }
        }
        debug!("Stream from {} ended with {} fragment(s)", url, forwarded);
    });

    Ok(Box::pin(ReceiverStream::new(rx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::deepseek::parse_sse_line;
    use std::time::Duration;
    use tokio::io::{ AsyncReadExt, AsyncWriteExt };
    use tokio::net::{ TcpListener, TcpStream };
    use tokio::sync::oneshot;

    const FIRST_LINE: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n";

    /// Consumes one HTTP request (head plus `content-length` body).
    async fn read_request(socket: &mut TcpStream) {
        let mut raw = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            raw.extend_from_slice(&buf[..n]);
            if let Some(end) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&raw[..end]).to_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if raw.len() >= end + 4 + len {
                    return;
                }
            }
        }
    }

    fn completion_request(addr: std::net::SocketAddr) -> reqwest::RequestBuilder {
        reqwest::Client::new()
            .post(format!("http://{}/v1/chat/completions", addr))
            .json(&serde_json::json!({ "stream": true }))
    }

    #[test]
    fn splits_lines_across_chunks() {
        let mut buf = LineBuffer::default();
        assert!(buf.push(b"data: {\"a\"").is_empty());
        assert_eq!(buf.push(b":1}\n\ndata: [DO"), vec!["data: {\"a\":1}".to_string(), String::new()]);
        assert_eq!(buf.push(b"NE]\r\n"), vec!["data: [DONE]".to_string()]);
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn keeps_multibyte_characters_split_between_chunks() {
        let text = "data: héllo\n".as_bytes();
        let (a, b) = text.split_at(8);
        let mut buf = LineBuffer::default();
        assert!(buf.push(a).is_empty());
        assert_eq!(buf.push(b), vec!["data: héllo".to_string()]);
    }

    #[test]
    fn finish_returns_unterminated_tail() {
        let mut buf = LineBuffer::default();
        buf.push(b"data: tail");
        assert_eq!(buf.finish().as_deref(), Some("data: tail"));
        assert_eq!(buf.finish(), None);
    }

    #[tokio::test]
    async fn broken_body_yields_one_error_then_ends() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncontent-length: 4096\r\n\r\n";
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(FIRST_LINE.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
        });

        let mut stream = http_stream_generate(completion_request(addr), parse_sse_line, "fallback").await.unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap(), "Hel");
        assert!(matches!(stream.next().await, Some(Err(ChatError::Transport(_)))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn dropping_the_stream_releases_the_upstream_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (closed_tx, closed_rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n";
            socket.write_all(head.as_bytes()).await.unwrap();
            let chunk = format!("{:x}\r\n{}\r\n", FIRST_LINE.len(), FIRST_LINE);
            socket.write_all(chunk.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();

            // Never finish the body; wait for the client to hang up.
            let mut buf = [0u8; 256];
            loop {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            let _ = closed_tx.send(());
        });

        let mut stream = http_stream_generate(completion_request(addr), parse_sse_line, "fallback").await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "Hel");
        drop(stream);

        tokio::time::timeout(Duration::from_secs(5), closed_rx)
            .await
            .expect("upstream connection was not closed after the caller left")
            .unwrap();
    }
}
