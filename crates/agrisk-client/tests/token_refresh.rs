use agrisk_client::{ApiClient, ApiError, ClientConfig, RiskApi, SessionListener, TokenStore};
use agrisk_model::{LoginRequest, LoginResponse, TokenPair};
use mockall::mock;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use warp::http::StatusCode;
use warp::{Filter, Reply};

mock! {
    Listener {}
    impl SessionListener for Listener {
        fn session_expired(&self);
    }
}

#[derive(Debug, Default)]
struct ServerState {
    valid_token: String,
    refresh_ok: bool,
    reject_everything: bool,
    refresh_calls: usize,
    list_calls: usize,
}

type Shared = Arc<Mutex<ServerState>>;

fn spawn_server(state: Shared) -> SocketAddr {
    let list_state = state.clone();
    let assessments = warp::path!("api" / "assessments")
        .and(warp::get())
        .and(warp::header::optional::<String>("authorization"))
        .map(move |auth: Option<String>| {
            let mut s = list_state.lock().unwrap();
            s.list_calls += 1;
            let expected = format!("Bearer {}", s.valid_token);
            if s.reject_everything || auth.as_deref() != Some(expected.as_str()) {
                return StatusCode::UNAUTHORIZED.into_response();
            }
            warp::reply::json(&json!([])).into_response()
        });

    let stats = warp::path!("api" / "assessments" / "stats")
        .and(warp::get())
        .map(|| warp::reply::with_status("boom", StatusCode::INTERNAL_SERVER_ERROR).into_response());

    let refresh_state = state.clone();
    let refresh = warp::path!("api" / "auth" / "refresh-token")
        .and(warp::post())
        .and(warp::body::json())
        .map(move |body: serde_json::Value| {
            let mut s = refresh_state.lock().unwrap();
            s.refresh_calls += 1;
            if !s.refresh_ok || body["refreshToken"] != "r1" {
                return StatusCode::UNAUTHORIZED.into_response();
            }
            s.valid_token = format!("fresh-{}", s.refresh_calls);
            warp::reply::json(&json!({ "accessToken": s.valid_token })).into_response()
        });

    let login = warp::path!("api" / "auth" / "login")
        .and(warp::post())
        .and(warp::body::json())
        .map(|body: serde_json::Value| {
            if body["password"] == "temporary1" {
                return warp::reply::json(&json!({
                    "status": "new_password_required",
                    "session": "challenge-1"
                }))
                .into_response();
            }
            warp::reply::json(&json!({
                "status": "authenticated",
                "accessToken": "a1",
                "refreshToken": "r1"
            }))
            .into_response()
        });

    let routes = assessments.or(stats).or(refresh).or(login);
    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

fn client(addr: SocketAddr, listener: MockListener) -> ApiClient {
    let config = ClientConfig::default().with_base_url(format!("http://{addr}"));
    let tokens = TokenStore::in_memory();
    tokens
        .store(
            &TokenPair {
                access_token: "stale".to_string(),
                refresh_token: "r1".to_string(),
            },
            false,
        )
        .unwrap();
    ApiClient::new(&config, tokens)
        .unwrap()
        .with_session_listener(Arc::new(listener))
}

fn server(valid_token: &str, refresh_ok: bool) -> (Shared, SocketAddr) {
    let state = Arc::new(Mutex::new(ServerState {
        valid_token: valid_token.to_string(),
        refresh_ok,
        ..ServerState::default()
    }));
    let addr = spawn_server(state.clone());
    (state, addr)
}

#[tokio::test]
async fn expired_token_is_refreshed_and_request_retried_once() {
    let (state, addr) = server("current", true);
    let mut listener = MockListener::new();
    listener.expect_session_expired().times(0);
    let client = client(addr, listener);

    let assessments = client.list_assessments().await.unwrap();

    assert!(assessments.is_empty());
    let s = state.lock().unwrap();
    assert_eq!(s.refresh_calls, 1);
    assert_eq!(s.list_calls, 2);
    assert_eq!(client.tokens().access_token().unwrap().as_deref(), Some("fresh-1"));
    // refresh token was not rotated
    assert_eq!(client.tokens().refresh_token().unwrap().as_deref(), Some("r1"));
}

#[tokio::test]
async fn second_rejection_is_terminal() {
    let (state, addr) = server("current", true);
    state.lock().unwrap().reject_everything = true;
    let mut listener = MockListener::new();
    listener.expect_session_expired().times(1).return_const(());
    let client = client(addr, listener);

    let err = client.list_assessments().await.unwrap_err();

    assert!(matches!(err, ApiError::SessionExpired));
    assert_eq!(state.lock().unwrap().list_calls, 2);
    assert_eq!(client.tokens().access_token().unwrap(), None);
    assert_eq!(client.tokens().refresh_token().unwrap(), None);
}

#[tokio::test]
async fn refresh_failure_clears_session() {
    let (state, addr) = server("current", false);
    let mut listener = MockListener::new();
    listener.expect_session_expired().times(1).return_const(());
    let client = client(addr, listener);

    let err = client.list_assessments().await.unwrap_err();

    assert!(err.is_auth());
    assert_eq!(state.lock().unwrap().list_calls, 1);
    assert_eq!(client.tokens().access_token().unwrap(), None);
}

#[tokio::test]
async fn concurrent_rejections_share_one_refresh() {
    let (state, addr) = server("current", true);
    let mut listener = MockListener::new();
    listener.expect_session_expired().times(0);
    let client = client(addr, listener);

    let (a, b) = tokio::join!(client.list_assessments(), client.list_assessments());

    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(state.lock().unwrap().refresh_calls, 1);
}

#[tokio::test]
async fn concurrent_refresh_failure_ends_the_session_once() {
    let (state, addr) = server("current", false);
    let mut listener = MockListener::new();
    listener.expect_session_expired().times(1).return_const(());
    let client = client(addr, listener);

    let (a, b, c) = tokio::join!(
        client.list_assessments(),
        client.list_assessments(),
        client.list_assessments()
    );

    for result in [a, b, c] {
        assert!(matches!(result, Err(ApiError::SessionExpired)));
    }
    let s = state.lock().unwrap();
    assert_eq!(s.refresh_calls, 1);
    assert_eq!(s.list_calls, 3);
    assert_eq!(client.tokens().access_token().unwrap(), None);
}

#[tokio::test]
async fn concurrent_rejections_after_refresh_end_the_session_once() {
    let (state, addr) = server("current", true);
    state.lock().unwrap().reject_everything = true;
    let mut listener = MockListener::new();
    listener.expect_session_expired().times(1).return_const(());
    let client = client(addr, listener);

    let (a, b, c) = tokio::join!(
        client.list_assessments(),
        client.list_assessments(),
        client.list_assessments()
    );

    for result in [a, b, c] {
        assert!(matches!(result, Err(ApiError::SessionExpired)));
    }
    assert_eq!(state.lock().unwrap().refresh_calls, 1);
    assert_eq!(client.tokens().refresh_token().unwrap(), None);
}

#[tokio::test]
async fn server_errors_carry_status_and_body() {
    let (_state, addr) = server("stale", true);
    let mut listener = MockListener::new();
    listener.expect_session_expired().times(0);
    let client = client(addr, listener);

    let err = client.assessment_stats().await.unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert!(err.is_retryable());
    assert!(matches!(err, ApiError::Http { ref body, .. } if body == "boom"));
}

#[tokio::test]
async fn login_honours_remember_me() {
    let (_state, addr) = server("a1", true);
    let config = ClientConfig::default().with_base_url(format!("http://{addr}"));
    let client = ApiClient::new(&config, TokenStore::in_memory()).unwrap();
    let request = LoginRequest {
        email: "grower@example.com".to_string(),
        password: "correct-horse".to_string(),
    };

    let outcome = client.login(&request, true).await.unwrap();

    assert!(matches!(outcome, LoginResponse::Authenticated(_)));
    assert!(client.tokens().is_remembered().unwrap());
    assert_eq!(client.tokens().access_token().unwrap().as_deref(), Some("a1"));

    client.logout().unwrap();
    assert_eq!(client.tokens().access_token().unwrap(), None);
}

#[tokio::test]
async fn password_challenge_stores_nothing() {
    let (_state, addr) = server("a1", true);
    let config = ClientConfig::default().with_base_url(format!("http://{addr}"));
    let client = ApiClient::new(&config, TokenStore::in_memory()).unwrap();
    let request = LoginRequest {
        email: "grower@example.com".to_string(),
        password: "temporary1".to_string(),
    };

    let outcome = client.login(&request, false).await.unwrap();

    assert_eq!(
        outcome,
        LoginResponse::NewPasswordRequired {
            session: "challenge-1".to_string()
        }
    );
    assert_eq!(client.tokens().access_token().unwrap(), None);
}
