//! One-shot warp server that catches the OAuth redirect on 127.0.0.1.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{Mutex, oneshot};
use warp::Filter;
use warp::http::StatusCode;

use crate::sync::google_auth::AuthError;

const SUCCESS_PAGE: &str = "<html><body><h1>Authorization complete</h1>\
<p>You can close this window and return to the terminal.</p></body></html>";
const FAILURE_PAGE: &str = "<html><body><h1>Authorization failed</h1>\
<p>Check the terminal for details.</p></body></html>";

#[derive(Debug, Clone, PartialEq)]
pub enum Callback {
    Code(String),
    Denied(String),
    StateMismatch,
    /// Hit on `/` without `code` or `error`.
    Unrelated,
}

impl Callback {
    pub fn from_query(params: &HashMap<String, String>, expected_state: &str) -> Self {
        if let Some(reason) = params.get("error") {
            return Callback::Denied(reason.clone());
        }

        let Some(code) = params.get("code") else {
            return Callback::Unrelated;
        };

        if params.get("state").map(String::as_str) != Some(expected_state) {
            return Callback::StateMismatch;
        }

        Callback::Code(code.clone())
    }

    fn page(&self) -> (&'static str, StatusCode) {
        match self {
            Callback::Code(_) => (SUCCESS_PAGE, StatusCode::OK),
            Callback::Denied(_) | Callback::StateMismatch => (FAILURE_PAGE, StatusCode::BAD_REQUEST),
            Callback::Unrelated => ("", StatusCode::NOT_FOUND),
        }
    }
}

type CallbackSlot = Arc<Mutex<Option<oneshot::Sender<Callback>>>>;

pub struct LoopbackReceiver {
    addr: SocketAddr,
    callback: oneshot::Receiver<Callback>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl LoopbackReceiver {
    /// Starts the redirect server on an OS-chosen port.
    pub fn bind(expected_state: &str) -> Result<Self, AuthError> {
        let (tx, callback) = oneshot::channel();
        let slot: CallbackSlot = Arc::new(Mutex::new(Some(tx)));
        let expected: Arc<str> = Arc::from(expected_state);

        let routes = warp::get()
            .and(warp::path::end())
            .and(warp::query::<HashMap<String, String>>())
            .and(warp::any().map(move || (slot.clone(), expected.clone())))
            .and_then(
                |params: HashMap<String, String>, (slot, expected): (CallbackSlot, Arc<str>)| async move {
                    let callback = Callback::from_query(&params, &expected);
                    let (page, status) = callback.page();

                    if callback != Callback::Unrelated
                        && let Some(sender) = slot.lock().await.take()
                    {
                        let _ = sender.send(callback);
                    }

                    Ok::<_, warp::Rejection>(warp::reply::with_status(warp::reply::html(page), status))
                },
            );

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (addr, server) = warp::serve(routes).try_bind_with_graceful_shutdown(
            ([127, 0, 0, 1], 0),
            async move {
                shutdown_rx.await.ok();
            },
        )?;
        tokio::spawn(server);
        tracing::debug!("OAuth redirect listener on {}", addr);

        Ok(Self {
            addr,
            callback,
            shutdown: Some(shutdown_tx),
        })
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Waits for the browser redirect and returns the authorization code.
    pub async fn wait_for_code(mut self) -> Result<String, AuthError> {
        let callback = (&mut self.callback)
            .await
            .map_err(|_| AuthError::OAuthError("redirect listener stopped".to_string()))?;

        match callback {
            Callback::Code(code) => Ok(code),
            Callback::Denied(reason) => Err(AuthError::AuthorizationDenied(reason)),
            Callback::StateMismatch => Err(AuthError::StateMismatch),
            Callback::Unrelated => Err(AuthError::OAuthError("redirect carried no code".to_string())),
        }
    }
}

impl Drop for LoopbackReceiver {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn matching_state_yields_code() {
        let callback = Callback::from_query(&query(&[("code", "4/0Ad"), ("state", "abc")]), "abc");

        assert_eq!(callback, Callback::Code("4/0Ad".to_string()));
    }

    #[test]
    fn error_parameter_means_denied() {
        let callback = Callback::from_query(&query(&[("error", "access_denied"), ("state", "abc")]), "abc");

        assert_eq!(callback, Callback::Denied("access_denied".to_string()));
    }

    #[test]
    fn missing_or_wrong_state_is_a_mismatch() {
        assert_eq!(
            Callback::from_query(&query(&[("code", "c")]), "abc"),
            Callback::StateMismatch
        );
        assert_eq!(
            Callback::from_query(&query(&[("code", "c"), ("state", "forged")]), "abc"),
            Callback::StateMismatch
        );
    }

    #[test]
    fn bare_root_is_unrelated() {
        assert_eq!(Callback::from_query(&query(&[]), "abc"), Callback::Unrelated);
    }

    #[tokio::test]
    async fn receives_code_from_browser_redirect() {
        let receiver = LoopbackReceiver::bind("s1").unwrap();
        let favicon = format!("{}favicon.ico", receiver.redirect_uri());
        let redirect = format!("{}?code=the-code&state=s1", receiver.redirect_uri());

        let browser = tokio::spawn(async move {
            let client = reqwest::Client::new();
            let missing = client.get(&favicon).send().await.unwrap();
            assert_eq!(missing.status(), 404);
            client.get(&redirect).send().await.unwrap().text().await.unwrap()
        });

        let code = receiver.wait_for_code().await.unwrap();
        let page = browser.await.unwrap();

        assert_eq!(code, "the-code");
        assert!(page.contains("Authorization complete"));
    }

    #[tokio::test]
    async fn idle_preconnected_socket_does_not_block_redirect() {
        let receiver = LoopbackReceiver::bind("s1").unwrap();
        let addr = receiver.redirect_uri()
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string();
        let _idle = tokio::net::TcpStream::connect(&addr).await.unwrap();
        let redirect = format!("{}?code=c&state=s1", receiver.redirect_uri());

        let browser = tokio::spawn(async move {
            reqwest::get(&redirect).await.unwrap();
        });

        let code = tokio::time::timeout(Duration::from_secs(5), receiver.wait_for_code())
            .await
            .expect("redirect was not served")
            .unwrap();
        browser.await.unwrap();

        assert_eq!(code, "c");
    }

    #[tokio::test]
    async fn mismatched_state_gets_failure_page() {
        let receiver = LoopbackReceiver::bind("expected").unwrap();
        let redirect = format!("{}?code=the-code&state=forged", receiver.redirect_uri());

        let browser = tokio::spawn(async move {
            let response = reqwest::get(&redirect).await.unwrap();
            (response.status(), response.text().await.unwrap())
        });

        let result = receiver.wait_for_code().await;
        let (status, page) = browser.await.unwrap();

        assert!(matches!(result, Err(AuthError::StateMismatch)));
        assert_eq!(status, 400);
        assert!(page.contains("Authorization failed"));
    }
}
