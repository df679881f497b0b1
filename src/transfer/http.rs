use super::error::TransferError;
use crate::supplier::Supplier;
use crate::upload::PendingFile;
use bytes::Bytes;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde_json::Value;
use tracing::{debug, info};

const UNKNOWN_ERROR: &str = "Unknown error occurred during file upload";

/// A downloaded body plus the name the server suggested for it.
#[derive(Debug, Clone)]
pub struct NamedBlob {
    pub suggested_name: Option<String>,
    pub content: Bytes,
}

/// Network operations used by the orchestrator and the download negotiator.
///
/// Implementations must not touch shared state and must not retry.
#[allow(async_fn_in_trait)]
pub trait TransferClient {
    /// Sends one supplier file to the ingestion endpoint.
    async fn upload(&self, supplier: Supplier, file: &PendingFile) -> Result<(), TransferError>;

    /// Fetches a processed artifact in full.
    async fn download(&self, resource_path: &str) -> Result<NamedBlob, TransferError>;
}

/// `TransferClient` backed by reqwest.
#[derive(Clone, Debug)]
pub struct HttpTransferClient {
    client: reqwest::Client,
    base_url: String,
    upload_endpoint: String,
}

impl HttpTransferClient {
    pub fn new(base_url: &str, upload_endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            upload_endpoint: upload_endpoint.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn check_status(url: &str, response: Response) -> Result<Response, TransferError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();
        Err(TransferError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            message: error_message(content_type.as_deref(), &body),
        })
    }
}

impl TransferClient for HttpTransferClient {
    async fn upload(&self, supplier: Supplier, file: &PendingFile) -> Result<(), TransferError> {
        let url = self.url(&self.upload_endpoint);
        debug!(supplier = %supplier, file = %file.name, url = %url, "Sending upload");

        let part = Part::stream_with_length(file.content.clone(), file.size())
            .file_name(file.name.clone());
        let form = Form::new()
            .text("supplier", supplier.as_str())
            .part("file", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|source| TransferError::Network {
                url: url.clone(),
                source,
            })?;

        let response = Self::check_status(&url, response).await?;
        response
            .bytes()
            .await
            .map_err(|e| TransferError::MalformedResponse {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        info!(supplier = %supplier, file = %file.name, "Upload accepted");
        Ok(())
    }

    async fn download(&self, resource_path: &str) -> Result<NamedBlob, TransferError> {
        let url = self.url(resource_path);
        debug!(url = %url, "Sending download");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| TransferError::Network {
                url: url.clone(),
                source,
            })?;
        let response = Self::check_status(&url, response).await?;

        let suggested_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(suggested_filename);

        let content = response
            .bytes()
            .await
            .map_err(|e| TransferError::MalformedResponse {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        info!(url = %url, size = content.len(), name = ?suggested_name, "Download received");
        Ok(NamedBlob {
            suggested_name,
            content,
        })
    }
}

/// Extracts the name following `filename=` in a `Content-Disposition` value.
///
/// Quotes and any directory components are stripped so the result is always a
/// bare file name.
pub fn suggested_filename(disposition: &str) -> Option<String> {
    let start = disposition.find("filename=")? + "filename=".len();
    let rest = disposition[start..].trim_start();
    let value = match rest.strip_prefix('"') {
        Some(quoted) => quoted.split('"').next().unwrap_or_default(),
        None => rest.split(';').next().unwrap_or_default(),
    };
    let value = value.trim().trim_matches('\'').trim();
    let name = value.rsplit(['/', '\\']).next().unwrap_or_default().trim();

    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

fn error_message(content_type: Option<&str>, body: &str) -> String {
    let body = body.trim();
    if content_type.is_some_and(|ct| ct.contains("application/json")) {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::String(message)) if !message.is_empty() => return message,
            Ok(Value::Object(map)) => {
                for key in ["message", "error", "title", "detail"] {
                    if let Some(Value::String(message)) = map.get(key) {
                        return message.clone();
                    }
                }
            }
            _ => {}
        }
    }

    if body.is_empty() {
        UNKNOWN_ERROR.to_string()
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Accepts one connection, records the raw request and answers with
    /// `response`.
    async fn serve_once(response: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            request
        });
        (format!("http://{}/api", addr), handle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok());
            let done = match length {
                Some(length) => buf.len() >= end + 4 + length,
                None if head.starts_with("get") => true,
                None => buf.ends_with(b"0\r\n\r\n"),
            };
            if done {
                break;
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn http_response(status: &str, headers: &[&str], body: &str) -> String {
        let mut response = format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n",
            status,
            body.len()
        );
        for header in headers {
            response.push_str(header);
            response.push_str("\r\n");
        }
        response.push_str("\r\n");
        response.push_str(body);
        response
    }

    #[tokio::test]
    async fn test_upload_sends_supplier_and_file_fields() {
        let (base, server) = serve_once(http_response("200 OK", &[], "ok")).await;
        let client = HttpTransferClient::new(&base, "/file-upload");
        let file = PendingFile::new("apex.xlsx", b"sheet-bytes".to_vec());

        client.upload(Supplier::Apex, &file).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/file-upload "));
        assert!(request.contains("name=\"supplier\""));
        assert!(request.contains("\r\n\r\nApex\r\n"));
        assert!(request.contains("name=\"file\"; filename=\"apex.xlsx\""));
        assert!(request.contains("sheet-bytes"));
    }

    #[tokio::test]
    async fn test_upload_surfaces_json_error_message() {
        let response = http_response(
            "500 Internal Server Error",
            &["Content-Type: application/json"],
            r#"{"message":"Unreadable sheet"}"#,
        );
        let (base, _server) = serve_once(response).await;
        let client = HttpTransferClient::new(&base, "/file-upload");
        let file = PendingFile::new("s.csv", b"x".to_vec());

        let err = client.upload(Supplier::Solarpop, &file).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        match err {
            TransferError::Status { message, .. } => assert_eq!(message, "Unreadable sheet"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_upload_network_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpTransferClient::new(&format!("http://{}", addr), "/file-upload");
        let file = PendingFile::new("s.csv", b"x".to_vec());
        let err = client.upload(Supplier::Rectron, &file).await.unwrap_err();
        assert!(matches!(err, TransferError::Network { .. }));
    }

    #[tokio::test]
    async fn test_download_uses_content_disposition() {
        let response = http_response(
            "200 OK",
            &["Content-Disposition: attachment; filename=stock_2024.txt"],
            "ITEM|QTY",
        );
        let (base, server) = serve_once(response).await;
        let client = HttpTransferClient::new(&base, "/file-upload");

        let blob = client.download("/file-upload/booksite").await.unwrap();
        assert_eq!(blob.suggested_name.as_deref(), Some("stock_2024.txt"));
        assert_eq!(&blob.content[..], b"ITEM|QTY");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/file-upload/booksite "));
    }

    #[tokio::test]
    async fn test_download_without_header_has_no_name() {
        let (base, _server) = serve_once(http_response("200 OK", &[], "data")).await;
        let client = HttpTransferClient::new(&base, "/file-upload");

        let blob = client.download("/file-upload/booksite").await.unwrap();
        assert!(blob.suggested_name.is_none());
    }

    #[tokio::test]
    async fn test_download_error_status() {
        let (base, _server) = serve_once(http_response("404 Not Found", &[], "")).await;
        let client = HttpTransferClient::new(&base, "/file-upload");

        let err = client.download("/file-upload/booksite").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_suggested_filename_variants() {
        assert_eq!(
            suggested_filename("attachment; filename=stock_2024.txt").as_deref(),
            Some("stock_2024.txt")
        );
        assert_eq!(
            suggested_filename("attachment; filename=\"item mast.txt\"; size=10").as_deref(),
            Some("item mast.txt")
        );
        assert_eq!(
            suggested_filename("attachment; filename=../../etc/passwd").as_deref(),
            Some("passwd")
        );
        assert_eq!(
            suggested_filename("attachment; filename=\"a;b.txt\"; size=4").as_deref(),
            Some("a;b.txt")
        );
        assert_eq!(
            suggested_filename("attachment; filename=\"unterminated.txt").as_deref(),
            Some("unterminated.txt")
        );
        assert_eq!(suggested_filename("attachment"), None);
        assert_eq!(suggested_filename("attachment; filename=\"\""), None);
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(
            error_message(Some("application/json"), "\"Bad supplier\""),
            "Bad supplier"
        );
        assert_eq!(
            error_message(Some("application/json; charset=utf-8"), r#"{"error":"nope"}"#),
            "nope"
        );
        assert_eq!(error_message(Some("text/plain"), "plain failure"), "plain failure");
        assert_eq!(error_message(None, "  "), UNKNOWN_ERROR);
    }
}
