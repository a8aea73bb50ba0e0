// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP request-line parsing.
//
// The dispatcher only ever looks at the first line of a request:
// `METHOD SP PATH SP VERSION`.  Headers and bodies are never consumed.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use printhtml_core::error::{PrintHtmlError, Result};

use crate::query::{self, QueryParams};

/// A parsed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Path component before the first `?`.
    pub endpoint: String,
    /// Raw query string after the first `?` (empty when absent).
    pub query: String,
    /// Percent-decoded query parameters.
    pub params: QueryParams,
    pub version: Option<String>,
}

impl Request {
    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Parse `GET /print?url=x HTTP/1.1` into a [`Request`].
///
/// Fails when the line has no path. The method is not validated here.
pub fn parse_request_line(line: &str) -> Result<Request> {
    let mut parts = line.trim().split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| PrintHtmlError::Protocol("empty request line".into()))?;
    let path = parts
        .next()
        .ok_or_else(|| PrintHtmlError::Protocol(format!("request line has no path: {line:?}")))?;
    let version = parts.next().map(str::to_string);

    let (endpoint, query) = match path.split_once('?') {
        Some((endpoint, query)) => (endpoint, query),
        None => (path, ""),
    };

    Ok(Request {
        method: method.to_string(),
        endpoint: endpoint.to_string(),
        query: query.to_string(),
        params: query::decode(query),
        version,
    })
}

/// Result of waiting for a request line.
#[derive(Debug, PartialEq, Eq)]
pub enum LineRead {
    /// A complete line, without its CRLF / LF terminator.
    Line(String),
    /// The peer closed before a full line arrived.
    Closed,
    /// More than the allowed number of bytes arrived without a newline.
    TooLong,
}

/// Read bytes until the first LF, allowing at most `limit` bytes.
pub async fn read_request_line<R>(reader: &mut R, limit: usize) -> Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::with_capacity(256);
    let mut limited = reader.take(limit as u64 + 1);
    limited.read_until(b'\n', &mut buf).await?;

    if buf.last() != Some(&b'\n') {
        return Ok(if buf.len() > limit {
            LineRead::TooLong
        } else {
            LineRead::Closed
        });
    }

    let line = String::from_utf8_lossy(&buf);
    Ok(LineRead::Line(line.trim_end_matches(['\r', '\n']).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, BufReader};

    #[test]
    fn parses_get_with_query() {
        let req = parse_request_line("GET /print?url=http%3A%2F%2Fx&p=Laser HTTP/1.1").unwrap();
        assert!(req.is_get());
        assert_eq!(req.endpoint, "/print");
        assert_eq!(req.query, "url=http%3A%2F%2Fx&p=Laser");
        assert_eq!(req.param("url"), Some("http://x"));
        assert_eq!(req.param("p"), Some("Laser"));
        assert_eq!(req.version.as_deref(), Some("HTTP/1.1"));
    }

    #[test]
    fn path_without_query_has_empty_params() {
        let req = parse_request_line("GET /scan HTTP/1.0").unwrap();
        assert_eq!(req.endpoint, "/scan");
        assert!(req.query.is_empty());
        assert!(req.params.is_empty());
    }

    #[test]
    fn splits_on_first_question_mark() {
        let req = parse_request_line("GET /print?url=http://x/?a=b HTTP/1.1").unwrap();
        assert_eq!(req.endpoint, "/print");
        assert_eq!(req.param("url"), Some("http://x/?a=b"));
    }

    #[test]
    fn keeps_non_get_methods_for_the_caller() {
        let req = parse_request_line("POST /print HTTP/1.1").unwrap();
        assert!(!req.is_get());
    }

    #[test]
    fn rejects_line_without_path() {
        assert!(parse_request_line("GET").is_err());
        assert!(parse_request_line("   ").is_err());
    }

    #[tokio::test]
    async fn reads_crlf_terminated_line() {
        let mut reader = BufReader::new(&b"GET / HTTP/1.1\r\nHost: x\r\n\r\n"[..]);
        let line = read_request_line(&mut reader, 1024).await.unwrap();
        assert_eq!(line, LineRead::Line("GET / HTTP/1.1".into()));
    }

    #[tokio::test]
    async fn reads_bare_lf_line() {
        let mut reader = BufReader::new(&b"GET /scan\nrest"[..]);
        let line = read_request_line(&mut reader, 1024).await.unwrap();
        assert_eq!(line, LineRead::Line("GET /scan".into()));
    }

    #[tokio::test]
    async fn waits_for_line_split_across_writes() {
        let (mut client, server) = tokio::io::duplex(64);
        let reader_task = tokio::spawn(async move {
            let mut reader = BufReader::new(server);
            read_request_line(&mut reader, 1024).await
        });
        client.write_all(b"GET /pr").await.unwrap();
        tokio::task::yield_now().await;
        client.write_all(b"int HTTP/1.1\r\n").await.unwrap();
        let line = reader_task.await.unwrap().unwrap();
        assert_eq!(line, LineRead::Line("GET /print HTTP/1.1".into()));
    }

    #[tokio::test]
    async fn reports_closed_on_partial_line() {
        let mut reader = BufReader::new(&b"GET /pri"[..]);
        let line = read_request_line(&mut reader, 1024).await.unwrap();
        assert_eq!(line, LineRead::Closed);
    }

    #[tokio::test]
    async fn reports_too_long_line() {
        let data = vec![b'a'; 64];
        let mut reader = BufReader::new(&data[..]);
        let line = read_request_line(&mut reader, 16).await.unwrap();
        assert_eq!(line, LineRead::TooLong);
    }
}
