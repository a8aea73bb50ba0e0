// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Minimal HTTP/1.1 responses.
//
// Every response carries `Content-Length` and `Connection: close`; the
// connection is shut down once the body is flushed.

use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use printhtml_core::error::{PrintHtmlError, Result};

/// Writable half of a client connection.
pub type ResponseSink = Box<dyn AsyncWrite + Unpin + Send>;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// The status codes the dispatcher produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Accepted,
    BadRequest,
    NotFound,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Accepted => 202,
            Self::BadRequest => 400,
            Self::NotFound => 404,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Accepted => "Accepted",
            Self::BadRequest => "Bad Request",
            Self::NotFound => "Not Found",
        }
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: Status,
    pub content_type: Option<&'static str>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// A response with no body.
    pub fn empty(status: Status) -> Self {
        Self {
            status,
            content_type: None,
            body: Vec::new(),
        }
    }

    /// A JSON response serialized from `value`.
    pub fn json<T: Serialize + ?Sized>(status: Status, value: &T) -> Result<Self> {
        Ok(Self {
            status,
            content_type: Some("application/json"),
            body: serde_json::to_vec(value)?,
        })
    }

    /// Serialize status line, headers and body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\n",
            self.status.code(),
            self.status.reason()
        );
        if let Some(content_type) = self.content_type {
            head.push_str(&format!("Content-Type: {content_type}\r\n"));
        }
        head.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n",
            self.body.len()
        ));

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

/// Write `bytes` to `sink`, flush, and close the write side.
pub async fn send_response<W>(sink: &mut W, bytes: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    sink.write_all(bytes)
        .await
        .map_err(|e| PrintHtmlError::Server(format!("write response: {e}")))?;
    sink.flush()
        .await
        .map_err(|e| PrintHtmlError::Server(format!("flush: {e}")))?;
    sink.shutdown()
        .await
        .map_err(|e| PrintHtmlError::Server(format!("shutdown: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn empty_response_has_zero_length() {
        let bytes = HttpResponse::empty(Status::NotFound).to_bytes();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        );
    }

    #[test]
    fn json_response_sets_type_and_length() {
        let response = HttpResponse::json(Status::Accepted, &serde_json::json!({"a": 1})).unwrap();
        let text = String::from_utf8(response.to_bytes()).unwrap();
        assert!(text.starts_with("HTTP/1.1 202 Accepted\r\n"));
        assert!(text.contains("Content-Type: application/json\r\n"));
        assert!(text.contains("Content-Length: 7\r\n"));
        assert!(text.ends_with("\r\n\r\n{\"a\":1}"));
    }

    #[test]
    fn status_codes_match_reasons() {
        assert_eq!((Status::Ok.code(), Status::Ok.reason()), (200, "OK"));
        assert_eq!(
            (Status::BadRequest.code(), Status::BadRequest.reason()),
            (400, "Bad Request")
        );
    }

    #[tokio::test]
    async fn send_response_closes_stream() {
        let (client, server) = tokio::io::duplex(1024);
        let mut sink: ResponseSink = Box::new(server);
        send_response(&mut sink, b"HTTP/1.1 200 OK\r\n\r\n").await.unwrap();
        drop(sink);

        let mut received = Vec::new();
        let mut client = client;
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"HTTP/1.1 200 OK\r\n\r\n");
    }
}
