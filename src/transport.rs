use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;

use crate::error::FetchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status_code: u16,
    pub body: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, user_agent: &str) -> Result<HttpResponse, FetchError>;
}

/// reqwest-backed transport. Certificates are never validated.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, user_agent: &str) -> Result<HttpResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .send()
            .await
            .map_err(classify_error)?;
        let status_code = response.status().as_u16();
        let body = response.text().await.map_err(classify_error)?;
        Ok(HttpResponse { status_code, body })
    }
}

fn classify_error(err: reqwest::Error) -> FetchError {
    let err = err.without_url();
    let reason = error_chain(&err);
    if !err.is_timeout() && is_tls_failure(&err) {
        FetchError::Tls(reason)
    } else {
        FetchError::Transport(reason)
    }
}

/// True when a `rustls::Error` sits anywhere in the chain. tokio-rustls hands
/// it up wrapped in an `io::Error`, whose `source()` skips the wrapped value.
fn is_tls_failure(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(cause) = current {
        if cause.is::<rustls::Error>() {
            return true;
        }
        if let Some(inner) = cause
            .downcast_ref::<std::io::Error>()
            .and_then(|io| io.get_ref())
        {
            if is_tls_failure(inner) {
                return true;
            }
        }
        current = cause.source();
    }
    false
}

// reqwest hides the useful part (refused, dns, cert) in the source chain
fn error_chain(err: &dyn StdError) -> String {
    let mut reason = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !reason.contains(&text) {
            reason.push_str(": ");
            reason.push_str(&text);
        }
        source = cause.source();
    }
    reason
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> HttpTransport {
        HttpTransport::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn returns_status_and_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(header("user-agent", "scanner-agent"))
            .respond_with(ResponseTemplate::new(404).set_body_string("NoSuchBucket"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let response = transport()
            .get(&format!("{}/", mock_server.uri()), "scanner-agent")
            .await
            .unwrap();

        assert_eq!(response.status_code, 404);
        assert_eq!(response.body, "NoSuchBucket");
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = transport()
            .get(&format!("http://{}", addr), "scanner-agent")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Transport(_)), "{:?}", err);
    }

    #[test]
    fn tls_is_recognised_by_type_not_wording() {
        let wrapped = std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            rustls::Error::General("peer misbehaved".into()),
        );
        assert!(is_tls_failure(&wrapped));
        assert!(is_tls_failure(&rustls::Error::HandshakeNotComplete));

        let lookalike = std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "ssl.example.com: tls handshake certificate refused",
        );
        assert!(!is_tls_failure(&lookalike));
    }

    #[tokio::test]
    async fn https_against_plain_http_is_a_tls_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            use tokio::io::{AsyncReadExt, AsyncWriteExt};
            if let Ok((mut socket, _)) = listener.accept().await {
                let _ = socket.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await;
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        });

        let err = transport()
            .get(&format!("https://{}", addr), "scanner-agent")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Tls(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn tls_named_host_is_still_a_transport_error() {
        let err = transport()
            .get("http://tls-ssl-certificate.invalid", "scanner-agent")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn malformed_url_is_a_transport_error() {
        let err = transport().get("http://bad host name", "scanner-agent").await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }

    #[tokio::test]
    async fn slow_responder_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&mock_server)
            .await;

        let transport = HttpTransport::new(Duration::from_millis(200)).unwrap();
        let err = transport.get(&mock_server.uri(), "scanner-agent").await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }
}
