//! Loopback redirect listener
//!
//! One login attempt binds one listener on `127.0.0.1`. The listener moves
//! through [`LoginState`] and is closed when the attempt reaches a terminal
//! state, whichever way it gets there.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use http_body_util::Full;
use hyper::Request;
use hyper::Response;
use hyper::StatusCode;
use hyper::body::Bytes;
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::header::HeaderValue;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::AuthenticationResult;
use super::AzureAuthService;
use crate::error::AuthError;

const CALLBACK_PATH: &str = "/callback";

const SUCCESS_PAGE: &str = "<!DOCTYPE html><html><head><title>Authentication</title></head>\
     <body><h1>Authentication successful! You can close this window.</h1>\
     <script>window.close()</script></body></html>";

// =============================================================================
// Login State
// =============================================================================

/// Where a login attempt is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    /// Listening, no terminal callback yet.
    AwaitingRedirect,
    /// A code arrived and is being exchanged.
    Exchanging,
    /// Tokens are in the store.
    Done,
    /// Provider error, exchange failure, timeout or cancellation.
    Failed,
}

impl LoginState {
    /// Returns `true` for `Done` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Shared view of a login attempt's state.
#[derive(Debug, Clone)]
pub struct LoginProgress {
    state: Arc<Mutex<LoginState>>,
}

impl LoginProgress {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(LoginState::AwaitingRedirect)),
        }
    }

    /// The current state.
    pub fn get(&self) -> LoginState {
        *self.lock()
    }

    fn set(&self, next: LoginState) {
        *self.lock() = next;
    }

    /// Moves out of `AwaitingRedirect`. Returns `false` if another callback
    /// already did.
    fn claim(&self, next: LoginState) -> bool {
        let mut state = self.lock();
        if *state != LoginState::AwaitingRedirect {
            return false;
        }
        *state = next;
        true
    }

    /// Marks the attempt failed unless it already finished.
    fn fail(&self) {
        let mut state = self.lock();
        if !state.is_terminal() {
            *state = LoginState::Failed;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LoginState> {
        // A poisoned lock still holds a valid state value.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// =============================================================================
// PendingLogin
// =============================================================================

/// A login attempt waiting for the browser.
///
/// Open `auth_url` in a browser (or call [`open_browser`](Self::open_browser)),
/// then call [`wait`](Self::wait). Dropping it closes the listener.
pub struct PendingLogin {
    /// URL to open in the browser
    pub auth_url: String,
    /// Local redirect URI (e.g., "http://localhost:12345/callback")
    pub redirect_uri: String,
    listener: TcpListener,
    local_addr: SocketAddr,
    state: String,
    service: AzureAuthService,
    timeout: Duration,
    progress: LoginProgress,
}

impl PendingLogin {
    pub(crate) fn new(
        auth_url: String,
        redirect_uri: String,
        listener: TcpListener,
        local_addr: SocketAddr,
        state: String,
        service: AzureAuthService,
        timeout: Duration,
    ) -> Self {
        Self {
            auth_url,
            redirect_uri,
            listener,
            local_addr,
            state,
            service,
            timeout,
            progress: LoginProgress::new(),
        }
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Current state of the attempt.
    pub fn state(&self) -> LoginState {
        self.progress.get()
    }

    /// Handle for observing the attempt's state, also after `wait` consumed it.
    pub fn progress(&self) -> LoginProgress {
        self.progress.clone()
    }

    /// Opens the authorization URL in the system browser.
    pub fn open_browser(&self) -> Result<(), AuthError> {
        open::that(&self.auth_url).map_err(|e| AuthError::BrowserLaunch(e.to_string()))
    }

    /// Waits for the redirect and exchanges the code.
    ///
    /// Fails with [`AuthError::LoginTimedOut`] after the configured timeout.
    pub async fn wait(self) -> Result<AuthenticationResult, AuthError> {
        self.wait_with_cancel(CancellationToken::new()).await
    }

    /// Waits for the redirect with cancellation support.
    pub async fn wait_with_cancel(
        self,
        cancel: CancellationToken,
    ) -> Result<AuthenticationResult, AuthError> {
        let (tx, mut rx) = oneshot::channel();
        let ctx = Arc::new(CallbackContext {
            expected_state: self.state.clone(),
            redirect_uri: self.redirect_uri.clone(),
            service: self.service.clone(),
            progress: self.progress.clone(),
            outcome: Mutex::new(Some(tx)),
        });

        let mut connections = JoinSet::new();
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let result = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break Err(AuthError::LoginCancelled);
                }
                _ = &mut deadline => {
                    break Err(AuthError::LoginTimedOut(self.timeout));
                }
                outcome = &mut rx => {
                    break outcome.unwrap_or_else(|_| {
                        Err(AuthError::CallbackServerFailed("callback handler dropped".to_string()))
                    });
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            log::debug!("Redirect listener accepted connection from {}", peer);
                            serve(&mut connections, stream, ctx.clone());
                        }
                        Err(e) => {
                            break Err(AuthError::CallbackServerFailed(format!("Accept failed: {}", e)));
                        }
                    }
                }
            }
        };

        // Close the port before reporting the outcome.
        drop(self.listener);

        match &result {
            Ok(_) => {
                // Let the browser receive the page that was just rendered.
                connections.detach_all();
                log::info!("Azure sign-in completed");
            }
            Err(e @ (AuthError::LoginCancelled | AuthError::LoginTimedOut(_))) => {
                connections.abort_all();
                self.progress.fail();
                log::warn!("Azure sign-in abandoned: {}", e);
            }
            Err(e) => {
                connections.detach_all();
                self.progress.fail();
                log::error!("Azure sign-in failed: {}", e);
            }
        }

        result
    }
}

impl std::fmt::Debug for PendingLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingLogin")
            .field("auth_url", &self.auth_url)
            .field("redirect_uri", &self.redirect_uri)
            .field("state", &self.progress.get())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Connection Handling
// =============================================================================

type CallbackOutcome = Result<AuthenticationResult, AuthError>;

struct CallbackContext {
    expected_state: String,
    redirect_uri: String,
    service: AzureAuthService,
    progress: LoginProgress,
    outcome: Mutex<Option<oneshot::Sender<CallbackOutcome>>>,
}

impl CallbackContext {
    fn finish(&self, outcome: CallbackOutcome) {
        let sender = self
            .outcome
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(sender) = sender {
            let _ = sender.send(outcome);
        }
    }
}

fn serve(
    connections: &mut JoinSet<()>,
    stream: tokio::net::TcpStream,
    ctx: Arc<CallbackContext>,
) {
    let io = TokioIo::new(stream);
    let service = service_fn(move |req: Request<Incoming>| {
        let ctx = ctx.clone();
        async move { Ok::<_, Infallible>(handle_request(&ctx, req).await) }
    });

    connections.spawn(async move {
        // Browsers often drop the connection early; not worth surfacing.
        if let Err(e) = http1::Builder::new()
            .keep_alive(false)
            .serve_connection(io, service)
            .await
        {
            log::debug!("Redirect connection closed with error: {}", e);
        }
    });
}

async fn handle_request(ctx: &CallbackContext, req: Request<Incoming>) -> Response<Full<Bytes>> {
    if req.uri().path() != CALLBACK_PATH {
        return text_response(StatusCode::NOT_FOUND, "Not found");
    }

    match Callback::parse(req.uri().query(), &ctx.expected_state) {
        Callback::Incomplete => {
            log::warn!("Ignoring redirect without code or error");
            text_response(StatusCode::BAD_REQUEST, "Missing code parameter")
        }
        Callback::Error { error, description } => {
            if !ctx.progress.claim(LoginState::Failed) {
                return already_handled();
            }
            let body = format!("Authentication failed: {}", description);
            ctx.finish(Err(AuthError::Provider { error, description }));
            text_response(StatusCode::BAD_REQUEST, &body)
        }
        Callback::StateMismatch => {
            if !ctx.progress.claim(LoginState::Failed) {
                return already_handled();
            }
            ctx.finish(Err(AuthError::StateMismatch));
            text_response(StatusCode::BAD_REQUEST, "Authentication failed: state mismatch")
        }
        Callback::Code(code) => {
            if !ctx.progress.claim(LoginState::Exchanging) {
                return already_handled();
            }
            match ctx.service.handle_auth_code(&code, &ctx.redirect_uri).await {
                Ok(result) => {
                    ctx.progress.set(LoginState::Done);
                    ctx.finish(Ok(result));
                    html_response(StatusCode::OK, SUCCESS_PAGE)
                }
                Err(e) => {
                    ctx.progress.set(LoginState::Failed);
                    ctx.finish(Err(e));
                    text_response(StatusCode::INTERNAL_SERVER_ERROR, "Error during authentication")
                }
            }
        }
    }
}

fn already_handled() -> Response<Full<Bytes>> {
    text_response(StatusCode::CONFLICT, "This login attempt has already completed.")
}

fn html_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    response
}

fn text_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

// =============================================================================
// Callback Parsing
// =============================================================================

/// What a `/callback` request carries.
#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Code(String),
    Error { error: String, description: String },
    StateMismatch,
    Incomplete,
}

impl Callback {
    fn parse(query: Option<&str>, expected_state: &str) -> Self {
        let params: HashMap<String, String> =
            url::form_urlencoded::parse(query.unwrap_or("").as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();

        if let Some(error) = params.get("error") {
            let description = params
                .get("error_description")
                .cloned()
                .unwrap_or_else(|| error.clone());
            return Self::Error {
                error: error.clone(),
                description,
            };
        }

        let Some(code) = params.get("code") else {
            return Self::Incomplete;
        };

        if params.get("state").map(String::as_str) != Some(expected_state) {
            return Self::StateMismatch;
        }

        Self::Code(code.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_code_with_matching_state() {
        assert_eq!(
            Callback::parse(Some("code=abc&state=s1"), "s1"),
            Callback::Code("abc".into())
        );
    }

    #[test]
    fn error_wins_over_code() {
        let parsed = Callback::parse(
            Some("code=abc&error=access_denied&error_description=User%20cancelled"),
            "s1",
        );
        assert_eq!(
            parsed,
            Callback::Error {
                error: "access_denied".into(),
                description: "User cancelled".into(),
            }
        );
    }

    #[test]
    fn error_without_description_reuses_error() {
        assert_eq!(
            Callback::parse(Some("error=server_error"), "s1"),
            Callback::Error {
                error: "server_error".into(),
                description: "server_error".into(),
            }
        );
    }

    #[test]
    fn rejects_missing_or_wrong_state() {
        assert_eq!(
            Callback::parse(Some("code=abc"), "s1"),
            Callback::StateMismatch
        );
        assert_eq!(
            Callback::parse(Some("code=abc&state=other"), "s1"),
            Callback::StateMismatch
        );
    }

    #[test]
    fn nothing_useful_is_incomplete() {
        assert_eq!(Callback::parse(None, "s1"), Callback::Incomplete);
        assert_eq!(Callback::parse(Some("foo=bar"), "s1"), Callback::Incomplete);
    }

    #[test]
    fn claim_is_first_wins() {
        let progress = LoginProgress::new();
        assert!(progress.claim(LoginState::Exchanging));
        assert!(!progress.claim(LoginState::Failed));
        assert_eq!(progress.get(), LoginState::Exchanging);

        progress.fail();
        assert_eq!(progress.get(), LoginState::Failed);
    }

    #[test]
    fn fail_keeps_done() {
        let progress = LoginProgress::new();
        progress.set(LoginState::Done);
        progress.fail();
        assert_eq!(progress.get(), LoginState::Done);
    }
}
