//! Application state management for derma.
//!
//! The `App` struct owns the session state machine, the login form, the
//! home screen's photo selection, and the channel that background login
//! and upload tasks report back through. The UI renders from `App` and
//! never mutates it outside of input handling and `check_background_tasks`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use derma_core::{
    build_store, ApiClient, Config, JpegImage, LoginError, ServerAck, Session,
    SessionMachine, SessionManager, SessionState, UploadClient, UploadError,
};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
/// At most one login and one upload are in flight, so this never fills.
const CHANNEL_BUFFER_SIZE: usize = 8;

/// Maximum length for username input.
const MAX_USERNAME_LENGTH: usize = 64;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum length for the photo path input.
const MAX_PATH_LENGTH: usize = 1024;

/// Environment variables used to prefill the login form
const USERNAME_ENV: &str = "DERMA_USERNAME";
const PASSWORD_ENV: &str = "DERMA_PASSWORD";

// ============================================================================
// UI State
// ============================================================================

/// Which screen is showing. Derived from the session state, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Home,
}

/// Overlay state on top of the current screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ConfirmingLogout,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginFocus {
    Username,
    Password,
    Button,
}

/// Home screen focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HomeFocus {
    PhotoPath,
    UploadButton,
}

/// A photo picked from disk, already encoded for upload
#[derive(Debug, Clone)]
pub struct SelectedPhoto {
    pub path: PathBuf,
    pub jpeg: JpegImage,
}

/// Outcome of the most recent upload, shown under the upload button
#[derive(Debug, Clone, PartialEq)]
pub enum UploadStatus {
    Idle,
    Uploading,
    Done(ServerAck),
    Failed(String),
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Results sent from spawned background tasks back to the main loop.
///
/// Photo and upload results carry the generation they were started under;
/// a result whose generation is no longer current is dropped.
pub enum TaskResult {
    Login(Result<Session, LoginError>),
    PhotoLoaded {
        generation: u64,
        result: Result<SelectedPhoto, UploadError>,
    },
    Upload {
        generation: u64,
        result: Result<ServerAck, UploadError>,
    },
}

// ============================================================================
// Main Application Struct
// ============================================================================

/// Build the session manager and upload client described by `config`
pub fn build_services(config: &Config) -> Result<(SessionManager, UploadClient)> {
    let api = ApiClient::new(config)?;
    let store = build_store(config)?;
    let sessions = SessionManager::new(api.clone(), store).with_max_age(config.session_max_age_minutes);
    let uploads = UploadClient::new(api, config.jpeg_quality);
    Ok((sessions, uploads))
}

pub struct App {
    // Core services
    pub config: Config,
    config_path: Option<PathBuf>,
    sessions: SessionManager,
    uploads: UploadClient,
    pub session: SessionMachine,

    // UI State
    pub state: AppState,
    pub status_message: Option<String>,

    // Login form state
    pub login_username: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    form_error: Option<String>,

    // Home screen state
    pub photo_path: String,
    pub home_focus: HomeFocus,
    pub selected_photo: Option<SelectedPhoto>,
    pub photo_loading: bool,
    pub upload_status: UploadStatus,
    photo_generation: u64,
    upload_generation: u64,

    // Background task channel
    task_rx: mpsc::Receiver<TaskResult>,
    task_tx: mpsc::Sender<TaskResult>,
}

impl App {
    /// Create a new application instance.
    ///
    /// `config_path` is where `last_username` is saved after a login;
    /// `None` keeps the config in memory.
    pub fn new(config: Config, config_path: Option<PathBuf>) -> Result<Self> {
        let (sessions, uploads) = build_services(&config)?;

        let session = match sessions.restore() {
            Some(restored) => {
                info!(username = %restored.username, "Resuming stored session");
                SessionMachine::restored(restored)
            }
            None => SessionMachine::new(),
        };

        let login_username = std::env::var(USERNAME_ENV)
            .ok()
            .or_else(|| config.last_username.clone())
            .unwrap_or_default();
        let login_password = std::env::var(PASSWORD_ENV).unwrap_or_default();

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let login_focus = if login_username.is_empty() {
            LoginFocus::Username
        } else {
            LoginFocus::Password
        };

        Ok(Self {
            config,
            config_path,
            sessions,
            uploads,
            session,

            state: AppState::Normal,
            status_message: None,

            login_username,
            login_password,
            login_focus,
            form_error: None,

            photo_path: String::new(),
            home_focus: HomeFocus::PhotoPath,
            selected_photo: None,
            photo_loading: false,
            upload_status: UploadStatus::Idle,
            photo_generation: 0,
            upload_generation: 0,

            task_rx: rx,
            task_tx: tx,
        })
    }

    pub fn screen(&self) -> Screen {
        match self.session.state() {
            SessionState::LoggedIn => Screen::Home,
            SessionState::LoggedOut | SessionState::LoggingIn => Screen::Login,
        }
    }

    /// Error line for the login form: local validation first, then the last failed login
    pub fn login_error(&self) -> Option<&str> {
        self.form_error.as_deref().or_else(|| self.session.last_error())
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Submit the login form. Returns true if a login request was started.
    pub fn submit_login(&mut self) -> bool {
        let username = self.login_username.trim().to_string();
        let password = self.login_password.clone();

        if username.is_empty() || password.is_empty() {
            self.form_error = Some("Username and password required".to_string());
            return false;
        }

        if let Err(e) = self.session.begin_login() {
            debug!(error = %e, "Ignoring login submit");
            return false;
        }
        self.form_error = None;

        let sessions = self.sessions.clone();
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = sessions.login(&username, &password).await;
            Self::send_result(&tx, TaskResult::Login(result)).await;
        });

        info!("Login started");
        true
    }

    /// Invalidate the session and return to the login screen
    pub fn logout(&mut self) {
        let logged_out = self.sessions.logout(self.session.session().clone());
        self.session.logged_out(logged_out);

        self.state = AppState::Normal;
        self.login_password.clear();
        self.login_focus = LoginFocus::Password;
        self.form_error = None;

        self.photo_path.clear();
        self.home_focus = HomeFocus::PhotoPath;
        self.selected_photo = None;
        self.photo_loading = false;
        self.upload_status = UploadStatus::Idle;
        self.status_message = Some("Logged out".to_string());

        // Anything still in flight belongs to the old session
        self.photo_generation += 1;
        self.upload_generation += 1;
    }

    // =========================================================================
    // Photo Selection and Upload
    // =========================================================================

    /// Load and encode the photo at `photo_path` in the background.
    /// Returns true if loading was started.
    ///
    /// Picking again while a photo is loading supersedes the earlier pick.
    pub fn select_photo(&mut self) -> bool {
        let raw = self.photo_path.trim();
        if raw.is_empty() {
            self.status_message = Some("Enter the path of a photo".to_string());
            return false;
        }

        let path = expand_home(raw);
        self.photo_generation += 1;
        let generation = self.photo_generation;

        let uploads = self.uploads.clone();
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = uploads
                .prepare(path.clone())
                .await
                .map(|jpeg| SelectedPhoto { path, jpeg });
            Self::send_result(&tx, TaskResult::PhotoLoaded { generation, result }).await;
        });

        self.photo_loading = true;
        self.status_message = Some("Loading photo...".to_string());
        true
    }

    /// Upload the selected photo. Returns true if an upload was started.
    ///
    /// Nothing reaches the network without a logged in session.
    pub fn start_upload(&mut self) -> bool {
        let token = match self.session.token() {
            Some(token) => token.clone(),
            None => {
                warn!("Upload attempted without a session");
                self.status_message = Some("Log in before uploading".to_string());
                return false;
            }
        };

        let jpeg = match self.selected_photo {
            Some(ref photo) => photo.jpeg.clone(),
            None => {
                self.status_message = Some("Select a photo first".to_string());
                return false;
            }
        };

        if self.upload_status == UploadStatus::Uploading {
            self.status_message = Some("Upload already in progress".to_string());
            return false;
        }

        self.upload_generation += 1;
        let generation = self.upload_generation;

        let uploads = self.uploads.clone();
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = uploads.upload(&jpeg, &token).await;
            Self::send_result(&tx, TaskResult::Upload { generation, result }).await;
        });

        self.upload_status = UploadStatus::Uploading;
        self.status_message = None;
        true
    }

    // =========================================================================
    // Background Tasks
    // =========================================================================

    /// Helper to send task results, logging any channel errors
    async fn send_result(tx: &mpsc::Sender<TaskResult>, result: TaskResult) {
        if let Err(e) = tx.send(result).await {
            error!(error = %e, "Failed to send task result - channel closed");
        }
    }

    /// Apply every result that arrived since the last frame
    pub fn check_background_tasks(&mut self) {
        let mut results = Vec::new();
        while let Ok(result) = self.task_rx.try_recv() {
            results.push(result);
        }

        for result in results {
            self.process_task_result(result);
        }
    }

    fn process_task_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::Login(result) => {
                let succeeded = result.is_ok();
                if let Err(ref e) = result {
                    error!(error = %e, "Login failed");
                }
                if self.session.finish_login(result).is_err() {
                    return;
                }
                if succeeded && self.session.state() == SessionState::LoggedIn {
                    self.on_login_success();
                }
            }
            TaskResult::PhotoLoaded { generation, result } => {
                if generation != self.photo_generation {
                    debug!(generation, "Dropping superseded photo");
                    return;
                }
                self.photo_loading = false;
                match result {
                    Ok(photo) => {
                        info!(path = %photo.path.display(), bytes = photo.jpeg.len(), "Photo selected");
                        self.status_message = None;
                        self.selected_photo = Some(photo);
                        if self.upload_status != UploadStatus::Uploading {
                            self.upload_status = UploadStatus::Idle;
                        }
                        self.home_focus = HomeFocus::UploadButton;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to load photo");
                        self.status_message = Some(e.to_string());
                    }
                }
            }
            TaskResult::Upload { generation, result } => {
                if generation != self.upload_generation {
                    debug!(generation, "Dropping stale upload result");
                    return;
                }
                self.upload_status = match result {
                    Ok(ack) => {
                        self.status_message = Some("Upload complete".to_string());
                        UploadStatus::Done(ack)
                    }
                    Err(e) => {
                        self.status_message = None;
                        UploadStatus::Failed(e.to_string())
                    }
                };
            }
        }
    }

    fn on_login_success(&mut self) {
        let username = self.session.username().to_string();
        self.login_password.clear();
        self.login_username = username.clone();
        self.status_message = None;
        self.sessions.persist(self.session.session());

        self.config.last_username = Some(username);
        if let Some(ref path) = self.config_path {
            if let Err(e) = self.config.save_to(path) {
                warn!(error = %e, "Failed to save config");
            }
        }
    }
}

/// Expand a leading `~/` to the home directory
fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    Path::new(raw).to_path_buf()
}

// ============================================================================
// Input validation helpers (exported for use in input.rs)
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if a username character should be accepted
pub fn can_add_username_char(current_len: usize, c: char) -> bool {
    current_len < MAX_USERNAME_LENGTH && is_valid_input_char(c)
}

/// Check if a password character should be accepted
pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

/// Check if a path character should be accepted
pub fn can_add_path_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PATH_LENGTH && is_valid_input_char(c)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use derma_core::{encode_jpeg, BearerToken};
    use image::{DynamicImage, RgbImage};

    fn test_app() -> App {
        let config = Config {
            base_url: "http://127.0.0.1:9".to_string(),
            ..Config::default()
        };
        App::new(config, None).expect("app should build")
    }

    fn alice() -> Session {
        Session::logged_in("alice", BearerToken::new("abc123").expect("non-empty token"))
    }

    fn logged_in_app() -> App {
        let mut app = test_app();
        app.session.begin_login().expect("login can start");
        app.process_task_result(TaskResult::Login(Ok(alice())));
        app
    }

    /// Wait for the next background task and apply its result
    async fn apply_next_result(app: &mut App) {
        let result = app.task_rx.recv().await.expect("task result");
        app.process_task_result(result);
    }

    fn ack() -> ServerAck {
        ServerAck {
            status: 200,
            body: "ok".to_string(),
        }
    }

    fn photo() -> SelectedPhoto {
        let image = DynamicImage::ImageRgb8(RgbImage::new(8, 8));
        SelectedPhoto {
            path: PathBuf::from("photo.png"),
            jpeg: encode_jpeg(&image, 80).expect("encode"),
        }
    }

    // -------------------------------------------------------------------------
    // Login Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_starts_on_login_screen() {
        let app = test_app();
        assert_eq!(app.screen(), Screen::Login);
        assert_eq!(app.session.state(), SessionState::LoggedOut);
    }

    #[test]
    fn test_submit_requires_both_fields() {
        let mut app = test_app();
        app.login_username = "alice".to_string();
        app.login_password.clear();

        assert!(!app.submit_login());
        assert_eq!(app.login_error(), Some("Username and password required"));
        assert_eq!(app.session.state(), SessionState::LoggedOut);
    }

    #[tokio::test]
    async fn test_submit_moves_to_logging_in_once() {
        let mut app = test_app();
        app.login_username = "alice".to_string();
        app.login_password = "correct-pw".to_string();

        assert!(app.submit_login());
        assert_eq!(app.session.state(), SessionState::LoggingIn);
        assert_eq!(app.screen(), Screen::Login);

        // A second submit while the first is in flight is ignored
        assert!(!app.submit_login());
    }

    #[test]
    fn test_login_success_shows_home() {
        let app = logged_in_app();
        assert_eq!(app.screen(), Screen::Home);
        assert_eq!(app.session.username(), "alice");
        assert_eq!(app.config.last_username.as_deref(), Some("alice"));
        assert!(app.login_password.is_empty());
        assert!(app.sessions.restore().is_some());
    }

    #[test]
    fn test_login_failure_surfaces_error() {
        let mut app = test_app();
        app.session.begin_login().expect("login can start");
        app.process_task_result(TaskResult::Login(Err(LoginError::Rejected(
            "Status 401 Unauthorized".to_string(),
        ))));

        assert_eq!(app.screen(), Screen::Login);
        assert_eq!(app.login_error(), Some("Invalid username or password"));
    }

    // -------------------------------------------------------------------------
    // Upload Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_upload_blocked_when_logged_out() {
        let mut app = test_app();
        app.selected_photo = Some(photo());

        assert!(!app.start_upload());
        assert_eq!(app.upload_status, UploadStatus::Idle);
        assert_eq!(app.status_message.as_deref(), Some("Log in before uploading"));
    }

    #[test]
    fn test_upload_requires_photo() {
        let mut app = logged_in_app();
        assert!(!app.start_upload());
        assert_eq!(app.status_message.as_deref(), Some("Select a photo first"));
    }

    #[tokio::test]
    async fn test_only_one_upload_in_flight() {
        let mut app = logged_in_app();
        app.selected_photo = Some(photo());

        assert!(app.start_upload());
        assert_eq!(app.upload_status, UploadStatus::Uploading);
        assert!(!app.start_upload());
    }

    #[test]
    fn test_upload_results_update_status() {
        let mut app = logged_in_app();
        let generation = app.upload_generation;
        app.process_task_result(TaskResult::Upload {
            generation,
            result: Ok(ack()),
        });
        assert_eq!(app.upload_status, UploadStatus::Done(ack()));

        app.process_task_result(TaskResult::Upload {
            generation,
            result: Err(UploadError::Network("refused".to_string())),
        });
        assert_eq!(app.upload_status, UploadStatus::Failed("Network error: refused".to_string()));
    }

    #[tokio::test]
    async fn test_upload_from_previous_session_is_ignored() {
        let mut app = logged_in_app();
        app.selected_photo = Some(photo());
        assert!(app.start_upload());
        let stale = app.upload_generation;

        app.logout();
        app.session.begin_login().expect("login can start");
        app.process_task_result(TaskResult::Login(Ok(alice())));
        assert_eq!(app.screen(), Screen::Home);

        app.process_task_result(TaskResult::Upload {
            generation: stale,
            result: Ok(ack()),
        });
        assert_eq!(app.upload_status, UploadStatus::Idle);
        assert!(app.status_message.is_none());
    }

    #[tokio::test]
    async fn test_select_photo_missing_file() {
        let mut app = logged_in_app();
        app.photo_path = "/nonexistent/photo.png".to_string();
        assert!(app.select_photo());
        assert!(app.photo_loading);

        apply_next_result(&mut app).await;
        assert!(!app.photo_loading);
        assert!(app.selected_photo.is_none());
        assert!(app.status_message.is_some());
    }

    #[test]
    fn test_select_photo_requires_path() {
        let mut app = logged_in_app();
        assert!(!app.select_photo());
        assert!(!app.photo_loading);
        assert_eq!(app.status_message.as_deref(), Some("Enter the path of a photo"));
    }

    #[tokio::test]
    async fn test_select_photo_encodes_in_background() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("photo.png");
        DynamicImage::ImageRgb8(RgbImage::new(16, 12)).save(&path).expect("save png");

        let mut app = logged_in_app();
        app.photo_path = path.display().to_string();
        assert!(app.select_photo());

        // Returns before the image is decoded
        assert!(app.selected_photo.is_none());

        apply_next_result(&mut app).await;
        let selected = app.selected_photo.as_ref().expect("photo selected");
        assert_eq!((selected.jpeg.width, selected.jpeg.height), (16, 12));
        assert_eq!(app.home_focus, HomeFocus::UploadButton);
        assert!(!app.photo_loading);
    }

    #[test]
    fn test_superseded_photo_is_ignored() {
        let mut app = logged_in_app();
        app.photo_generation = 2;
        app.photo_loading = true;

        app.process_task_result(TaskResult::PhotoLoaded {
            generation: 1,
            result: Ok(photo()),
        });
        assert!(app.selected_photo.is_none());
        assert!(app.photo_loading);

        app.process_task_result(TaskResult::PhotoLoaded {
            generation: 2,
            result: Ok(photo()),
        });
        assert!(app.selected_photo.is_some());
        assert!(!app.photo_loading);
    }

    // -------------------------------------------------------------------------
    // Logout Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_logout_returns_to_login_and_blocks_upload() {
        let mut app = logged_in_app();
        app.selected_photo = Some(photo());
        app.logout();

        assert_eq!(app.screen(), Screen::Login);
        assert!(app.session.token().is_none());
        assert!(app.selected_photo.is_none());

        app.selected_photo = Some(photo());
        assert!(!app.start_upload());
    }

    #[test]
    fn test_logout_twice() {
        let mut app = logged_in_app();
        app.logout();
        let once = app.session.session().clone();
        app.logout();
        assert_eq!(app.session.session(), &once);
        assert_eq!(app.session.state(), SessionState::LoggedOut);
    }

    #[test]
    fn test_results_after_logout_are_dropped() {
        let mut app = test_app();
        app.session.begin_login().expect("login can start");
        let generation = app.upload_generation;
        app.logout();

        app.process_task_result(TaskResult::Login(Ok(alice())));
        assert_eq!(app.screen(), Screen::Login);

        app.process_task_result(TaskResult::Upload {
            generation,
            result: Ok(ack()),
        });
        assert_eq!(app.upload_status, UploadStatus::Idle);
    }

    #[test]
    fn test_login_completing_after_logout_is_not_stored() {
        let mut app = test_app();
        app.login_username = "alice".to_string();
        app.session.begin_login().expect("login can start");
        app.logout();

        app.process_task_result(TaskResult::Login(Ok(alice())));

        assert_eq!(app.session.state(), SessionState::LoggedOut);
        assert!(app.sessions.restore().is_none());
        assert!(app.config.last_username.is_none());
    }

    // -------------------------------------------------------------------------
    // Input Validation Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_can_add_username_char() {
        assert!(can_add_username_char(0, 'a'));
        assert!(can_add_username_char(63, 'z'));
        assert!(!can_add_username_char(64, 'a'));
        assert!(!can_add_username_char(0, '\x00'));
        assert!(!can_add_username_char(0, '\n'));
    }

    #[test]
    fn test_can_add_password_char() {
        assert!(can_add_password_char(127, '!'));
        assert!(!can_add_password_char(128, 'a'));
        assert!(!can_add_password_char(0, '\r'));
    }

    #[test]
    fn test_can_add_path_char() {
        assert!(can_add_path_char(0, '/'));
        assert!(can_add_path_char(0, ' '));
        assert!(!can_add_path_char(1024, 'a'));
        assert!(!can_add_path_char(0, '\t'));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/tmp/photo.png"), PathBuf::from("/tmp/photo.png"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/photo.png"), home.join("photo.png"));
        }
    }
}
