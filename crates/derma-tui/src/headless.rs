//! One-shot upload for `derma --upload <path>`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use derma_core::{BearerToken, ServerAck, Session, SessionManager, UploadClient};

/// Sign in, upload the file at `path` once, and sign out.
///
/// A stored session is tried first. If the server refuses its token, the
/// stored copy is cleared and a fresh login is made once. `credentials` is
/// only called when a fresh login is needed. The session is signed out
/// whether or not the upload succeeded.
pub async fn upload_once<F>(
    sessions: &SessionManager,
    uploads: &UploadClient,
    path: PathBuf,
    mut credentials: F,
) -> Result<ServerAck>
where
    F: FnMut() -> Result<(String, String)>,
{
    let (mut session, restored) = match sessions.restore() {
        Some(session) => {
            info!(username = %session.username, "Using stored session");
            (session, true)
        }
        None => (sign_in(sessions, &mut credentials).await?, false),
    };

    eprintln!("Uploading {}...", path.display());
    let mut outcome = uploads.upload_file(path.clone(), &token_of(&session)?).await;

    if restored && matches!(outcome, Err(ref e) if e.is_unauthorized()) {
        warn!("Stored session was refused");
        sessions.logout(session);
        session = sign_in(sessions, &mut credentials).await?;
        outcome = uploads.upload_file(path, &token_of(&session)?).await;
    }

    sessions.logout(session);
    Ok(outcome?)
}

async fn sign_in<F>(sessions: &SessionManager, credentials: &mut F) -> Result<Session>
where
    F: FnMut() -> Result<(String, String)>,
{
    let (username, password) = credentials()?;
    eprintln!("Authenticating...");
    let session = sessions.login(&username, &password).await?;
    Ok(session)
}

fn token_of(session: &Session) -> Result<BearerToken> {
    session.token().cloned().context("Session has no token")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::Arc;

    use axum::extract::Multipart;
    use axum::http::{header, HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use axum::{Json, Router};
    use derma_core::{ApiClient, Config, MemoryStore, SessionStore, UploadError};
    use image::{DynamicImage, RgbImage};
    use serde_json::{json, Value};

    async fn login(Json(body): Json<Value>) -> Response {
        match (body["username"].as_str(), body["password"].as_str()) {
            (Some("alice"), Some("correct-pw")) => Json(json!({"username": "alice", "token": "fresh"})).into_response(),
            _ => (StatusCode::UNAUTHORIZED, "bad credentials").into_response(),
        }
    }

    async fn upload_image(headers: HeaderMap, mut multipart: Multipart) -> Response {
        while let Ok(Some(field)) = multipart.next_field().await {
            let _ = field.bytes().await;
        }
        match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
            Some("Bearer fresh") => (StatusCode::OK, "stored").into_response(),
            _ => (StatusCode::UNAUTHORIZED, "invalid token").into_response(),
        }
    }

    async fn spawn_backend() -> SocketAddr {
        let app = Router::new()
            .route("/public/login", post(login))
            .route("/uploadImage", post(upload_image));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test backend");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("test backend");
        });
        addr
    }

    struct Fixture {
        sessions: SessionManager,
        uploads: UploadClient,
        store: Arc<MemoryStore>,
        photo: PathBuf,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let addr = spawn_backend().await;
        let config = Config {
            base_url: format!("http://{}", addr),
            request_timeout_secs: 5,
            ..Config::default()
        };
        let api = ApiClient::new(&config).expect("client should build");
        let store = Arc::new(MemoryStore::new());

        let dir = tempfile::tempdir().expect("tempdir");
        let photo = dir.path().join("photo.png");
        DynamicImage::ImageRgb8(RgbImage::new(8, 8)).save(&photo).expect("save png");

        Fixture {
            sessions: SessionManager::new(api.clone(), store.clone()),
            uploads: UploadClient::new(api, config.jpeg_quality),
            store,
            photo,
            _dir: dir,
        }
    }

    fn store_token(store: &MemoryStore, token: &str) {
        let session = Session::logged_in("alice", BearerToken::new(token).expect("non-empty token"));
        store.save(&session.to_data().expect("logged in")).expect("save");
    }

    #[tokio::test]
    async fn test_signs_in_uploads_and_signs_out() {
        let f = fixture().await;
        let mut asked = 0;

        let ack = upload_once(&f.sessions, &f.uploads, f.photo.clone(), || {
            asked += 1;
            Ok(("alice".to_string(), "correct-pw".to_string()))
        })
        .await
        .expect("upload");

        assert_eq!(ack.body, "stored");
        assert_eq!(asked, 1);
        assert!(f.store.load().expect("load").is_none());
    }

    #[tokio::test]
    async fn test_stored_session_is_used_then_cleared() {
        let f = fixture().await;
        store_token(&f.store, "fresh");

        let ack = upload_once(&f.sessions, &f.uploads, f.photo.clone(), || {
            panic!("no credentials needed with a valid stored session")
        })
        .await
        .expect("upload");

        assert_eq!(ack.status, 200);
        assert!(f.store.load().expect("load").is_none());
    }

    #[tokio::test]
    async fn test_refused_stored_session_signs_in_again() {
        let f = fixture().await;
        store_token(&f.store, "stale");
        let mut asked = 0;

        let ack = upload_once(&f.sessions, &f.uploads, f.photo.clone(), || {
            asked += 1;
            Ok(("alice".to_string(), "correct-pw".to_string()))
        })
        .await
        .expect("upload after signing in again");

        assert_eq!(ack.body, "stored");
        assert_eq!(asked, 1);
        assert!(f.store.load().expect("load").is_none());
    }

    #[tokio::test]
    async fn test_failed_upload_still_signs_out() {
        let f = fixture().await;
        store_token(&f.store, "fresh");
        let missing = f.photo.with_file_name("missing.png");

        let err = upload_once(&f.sessions, &f.uploads, missing, || {
            panic!("encode failures do not trigger a new login")
        })
        .await
        .unwrap_err();

        assert!(matches!(err.downcast_ref::<UploadError>(), Some(UploadError::Encode(_))));
        assert!(f.store.load().expect("load").is_none());
    }

    #[tokio::test]
    async fn test_wrong_password_fails_without_upload() {
        let f = fixture().await;

        let err = upload_once(&f.sessions, &f.uploads, f.photo.clone(), || {
            Ok(("alice".to_string(), "wrong-pw".to_string()))
        })
        .await
        .unwrap_err();

        assert!(err.to_string().starts_with("Login rejected"));
        assert!(f.store.load().expect("load").is_none());
    }
}
