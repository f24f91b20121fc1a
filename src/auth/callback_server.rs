//! OAuth2 callback server
//!
//! A temporary local HTTP server that receives the provider redirect on
//! `/auth/callback/{google,github}` and hands the full redirect URL back.
//!
//! Browsers never send the URL fragment to a server, so a fragment-mode
//! callback is answered with a relay page whose script re-requests
//! `<callback>/relay?<fragment>`; the server rebuilds `<callback>#<fragment>`
//! from that second request.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;
use crate::Result;
use crate::error::Error;
use super::provider::{Provider, ResponseMode};

const RELAY_SUFFIX: &str = "/relay";

/// Shown once the redirect has been captured
const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Taskboard | Authorization Received</title>
    <style>
        body { background: #F4F5F7; color: #172B4D; font-family: -apple-system, system-ui, sans-serif;
               display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; text-align: center; }
        .card { background: #fff; border-radius: 8px; box-shadow: 0 4px 12px rgba(0,0,0,.1); padding: 32px; max-width: 400px; }
        h1 { font-size: 22px; margin: 0 0 12px; color: #0052CC; }
        p { color: #5E6C84; line-height: 1.6; }
    </style>
</head>
<body>
    <div class="card">
        <h1>Authorization Received</h1>
        <p>Taskboard is finishing your sign-in.<br>You can close this window and return to your terminal.</p>
    </div>
</body>
</html>"#;

/// Shown for requests that carry nothing usable
const NOT_FOUND_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>Taskboard | Not Found</title></head>
<body><p>Nothing to see here.</p></body>
</html>"#;

/// Re-requests the page with the fragment moved into the query string
const RELAY_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Taskboard | Authenticating...</title>
</head>
<body>
    <p>Authenticating, please wait...</p>
    <script>
        var fragment = window.location.hash.substring(1);
        window.location.replace(window.location.pathname + "__RELAY__?" + fragment);
    </script>
</body>
</html>"#;

/// What to do with one incoming request
#[derive(Debug, PartialEq, Eq)]
enum Route {
    /// Redirect URL ready for the resolver
    Captured(String),
    /// Serve the fragment relay page and keep waiting
    Relay,
    NotFound,
}

/// Listen on `origin` until the provider's redirect arrives and return the
/// redirect URL as the browser saw it (fragment included).
pub async fn wait_for_callback(origin: &str, provider: Provider) -> Result<String> {
    let origin_url = Url::parse(origin)?;
    let host = origin_url.host_str().unwrap_or("127.0.0.1");
    let port = origin_url.port_or_known_default().unwrap_or(80);
    let addr = format!("{}:{}", host, port);

    let listener = TcpListener::bind(&addr).await
        .map_err(|e| Error::Other(format!("Failed to start callback server on {}: {}", addr, e)))?;

    tracing::info!("Callback server listening on http://{}{}", addr, provider.callback_path());

    loop {
        let (mut socket, _) = listener.accept().await
            .map_err(|e| Error::Other(format!("Failed to accept connection: {}", e)))?;

        let target = match read_request_target(&mut socket).await {
            Ok(target) => target,
            Err(e) => {
                tracing::debug!("Ignoring unreadable request: {}", e);
                continue;
            }
        };

        match route(origin, provider, &target) {
            Route::Captured(url) => {
                respond(&mut socket, "200 OK", SUCCESS_HTML).await;
                return Ok(url);
            }
            Route::Relay => {
                let page = RELAY_HTML.replace("__RELAY__", RELAY_SUFFIX);
                respond(&mut socket, "200 OK", &page).await;
            }
            Route::NotFound => {
                tracing::debug!("No callback at {}", target);
                respond(&mut socket, "404 Not Found", NOT_FOUND_HTML).await;
            }
        }
    }
}

async fn read_request_target(socket: &mut TcpStream) -> Result<String> {
    let mut buffer = vec![0u8; 8192];
    let n = socket.read(&mut buffer).await?;
    let request = String::from_utf8_lossy(&buffer[..n]);
    request_target(&request)
}

/// Extract the request target from `GET /path?query HTTP/1.1`
fn request_target(request: &str) -> Result<String> {
    let first_line = request.lines().next()
        .ok_or_else(|| Error::Other("Empty request".to_string()))?;

    let parts: Vec<&str> = first_line.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(Error::Other("Invalid request format".to_string()));
    }

    Ok(parts[1].to_string())
}

fn route(origin: &str, provider: Provider, target: &str) -> Route {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let callback = provider.callback_path();
    let base = origin.trim_end_matches('/');

    match provider.response_mode() {
        ResponseMode::Code if path == callback => {
            Route::Captured(format!("{}{}", base, target))
        }
        ResponseMode::Token if path == callback => Route::Relay,
        ResponseMode::Token if path == format!("{}{}", callback, RELAY_SUFFIX) => {
            Route::Captured(format!("{}{}#{}", base, callback, query))
        }
        _ => Route::NotFound,
    }
}

async fn respond(socket: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );

    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::callback::{resolve_callback, Credential};

    const ORIGIN: &str = "http://127.0.0.1:8085";

    #[test]
    fn test_request_target() {
        let request = "GET /auth/callback/github?code=abc123 HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert_eq!(request_target(request).unwrap(), "/auth/callback/github?code=abc123");
        assert!(request_target("").is_err());
        assert!(request_target("GARBAGE\r\n").is_err());
    }

    #[test]
    fn test_github_callback_is_captured() {
        let route = route(ORIGIN, Provider::GitHub, "/auth/callback/github?code=abc123&state=s");
        assert_eq!(route, Route::Captured(format!("{ORIGIN}/auth/callback/github?code=abc123&state=s")));
    }

    #[test]
    fn test_google_callback_goes_through_relay() {
        assert_eq!(route(ORIGIN, Provider::Google, "/auth/callback/google"), Route::Relay);

        let Route::Captured(url) = route(
            ORIGIN,
            Provider::Google,
            "/auth/callback/google/relay?access_token=ABC&token_type=Bearer",
        ) else {
            panic!("relay request was not captured");
        };
        assert_eq!(url, format!("{ORIGIN}/auth/callback/google#access_token=ABC&token_type=Bearer"));

        let artifact = resolve_callback(Provider::Google, &url).unwrap();
        assert_eq!(artifact.credential, Credential::AccessToken("ABC".to_string()));
    }

    #[test]
    fn test_other_paths_are_not_found() {
        assert_eq!(route(ORIGIN, Provider::GitHub, "/favicon.ico"), Route::NotFound);
        assert_eq!(route(ORIGIN, Provider::GitHub, "/auth/callback/google"), Route::NotFound);
        assert_eq!(route(ORIGIN, Provider::Google, "/auth/callback/github?code=x"), Route::NotFound);
    }

    #[tokio::test]
    async fn test_server_captures_github_redirect() {
        // Reserve a free port, then hand it to the server
        let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let origin = format!("http://127.0.0.1:{port}");
        let server = tokio::spawn({
            let origin = origin.clone();
            async move { wait_for_callback(&origin, Provider::GitHub).await }
        });

        // Retry until the listener is up
        let mut stream = loop {
            match TcpStream::connect(("127.0.0.1", port)).await {
                Ok(s) => break s,
                Err(_) => tokio::time::sleep(std::time::Duration::from_millis(20)).await,
            }
        };
        stream
            .write_all(b"GET /auth/callback/github?code=XYZ HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));

        let captured = server.await.unwrap().unwrap();
        assert_eq!(captured, format!("{origin}/auth/callback/github?code=XYZ"));
    }
}
