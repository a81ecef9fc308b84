//! System browser with a loopback redirect listener.
//!
//! The authorization URL opens in the default browser. The provider redirects
//! to `http://127.0.0.1:{port}/{path}`, where a one-shot listener picks up
//! the callback, answers with a small page, and stops.

use crate::error::{ConfigError, Result, SessionError};
use crate::providers::{AuthSessionBrowser, BrowserOutcome};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

const DONE_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Streckenheld</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 4rem;">
    <h1>You're all set</h1>
    <p>You can close this tab and return to Streckenheld.</p>
</body>
</html>"#;

/// [`AuthSessionBrowser`] for desktop and CLI use.
#[derive(Debug, Clone)]
pub struct LoopbackBrowser {
    timeout: Duration,
    launch: bool,
}

impl LoopbackBrowser {
    /// Wait up to `timeout` for the redirect.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            launch: true,
        }
    }

    /// Do not launch a browser; only log the URL and listen.
    #[must_use]
    pub const fn headless(mut self) -> Self {
        self.launch = false;
        self
    }

    fn listen_address(redirect_uri: &str) -> Result<(Url, String)> {
        let redirect = Url::parse(redirect_uri).map_err(|e| ConfigError::Invalid {
            field: "redirect_uri",
            reason: e.to_string(),
        })?;
        let host = redirect.host_str().unwrap_or_default();
        let (true, Some(port)) = (
            redirect.scheme() == "http" && matches!(host, "127.0.0.1" | "localhost"),
            redirect.port(),
        ) else {
            return Err(ConfigError::Invalid {
                field: "redirect_uri",
                reason: format!("{redirect_uri} is not a loopback address with a port"),
            }
            .into());
        };
        Ok((redirect, format!("127.0.0.1:{port}")))
    }

    /// Read one request and return its request target, answering it.
    async fn serve_one(stream: &mut TcpStream, expected_path: &str) -> Option<String> {
        let mut buf = [0u8; 4096];
        let n = stream.read(&mut buf).await.ok()?;
        let request = String::from_utf8_lossy(&buf[..n]);
        let target = request.lines().next()?.split_whitespace().nth(1)?.to_string();

        let path = target.split_once('?').map_or(target.as_str(), |(path, _)| path);
        let matched = path == expected_path;

        let response = if matched {
            format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{DONE_HTML}",
                DONE_HTML.len()
            )
        } else {
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
        };
        if let Err(error) = stream.write_all(response.as_bytes()).await {
            tracing::debug!(%error, "Failed to answer callback request");
        }
        let _ = stream.flush().await;

        matched.then_some(target)
    }

    async fn wait_for_redirect(listener: &TcpListener, redirect: &Url) -> Result<String> {
        loop {
            let (mut stream, peer) = listener
                .accept()
                .await
                .map_err(|e| SessionError::Network(format!("callback listener failed: {e}")))?;
            tracing::debug!(%peer, "Callback connection accepted");

            if let Some(target) = Self::serve_one(&mut stream, redirect.path()).await {
                return Ok(format!("{}{target}", redirect.origin().ascii_serialization()));
            }
        }
    }
}

impl Default for LoopbackBrowser {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_OPERATION_TIMEOUT)
    }
}

impl AuthSessionBrowser for LoopbackBrowser {
    async fn open_auth_session(&self, url: &str, redirect_uri: &str) -> Result<BrowserOutcome> {
        let (redirect, addr) = Self::listen_address(redirect_uri)?;
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| SessionError::Network(format!("cannot listen on {addr}: {e}")))?;
        tracing::debug!(%addr, "Waiting for provider redirect");

        if self.launch {
            if let Err(error) = open::that(url) {
                tracing::warn!(%error, "Could not launch a browser");
            }
        }
        tracing::info!(%url, "Continue in your browser");

        match tokio::time::timeout(self.timeout, Self::wait_for_redirect(&listener, &redirect)).await
        {
            Ok(callback_url) => Ok(BrowserOutcome::Success {
                callback_url: callback_url?,
            }),
            Err(_) => {
                tracing::info!(timeout = ?self.timeout, "Browser session timed out");
                Ok(BrowserOutcome::Dismissed)
            },
        }
    }
}
