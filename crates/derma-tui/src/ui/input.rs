//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use crossterm::event::{KeyCode, KeyEvent};

use derma_core::SessionState;

use crate::app::{
    can_add_password_char, can_add_path_char, can_add_username_char, App, AppState, HomeFocus,
    LoginFocus, Screen,
};

/// Handle one key press. Returns true when the app should exit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> bool {
    // Handle logout confirmation
    if matches!(app.state, AppState::ConfirmingLogout) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => app.logout(),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
            }
            _ => {}
        }
        return false;
    }

    match app.screen() {
        Screen::Login => handle_login_input(app, key),
        Screen::Home => {
            handle_home_input(app, key);
            false
        }
    }
}

fn handle_login_input(app: &mut App, key: KeyEvent) -> bool {
    if key.code == KeyCode::Esc {
        // Quit if on login screen
        app.state = AppState::Quitting;
        return true;
    }

    // Form is frozen while a login is in flight
    if app.session.state() == SessionState::LoggingIn {
        return false;
    }

    match key.code {
        KeyCode::Down | KeyCode::Tab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Username => LoginFocus::Password,
                LoginFocus::Password => LoginFocus::Button,
                LoginFocus::Button => LoginFocus::Username,
            };
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Username => LoginFocus::Button,
                LoginFocus::Password => LoginFocus::Username,
                LoginFocus::Button => LoginFocus::Password,
            };
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Username => app.login_focus = LoginFocus::Password,
            LoginFocus::Password | LoginFocus::Button => {
                app.submit_login();
            }
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Username => {
                app.login_username.pop();
            }
            LoginFocus::Password => {
                app.login_password.pop();
            }
            LoginFocus::Button => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Username => {
                if can_add_username_char(app.login_username.chars().count(), c) {
                    app.login_username.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(app.login_password.chars().count(), c) {
                    app.login_password.push(c);
                }
            }
            LoginFocus::Button => {}
        },
        _ => {}
    }
    false
}

fn handle_home_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.state = AppState::ConfirmingLogout,
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Down | KeyCode::Up => {
            app.home_focus = match app.home_focus {
                HomeFocus::PhotoPath => HomeFocus::UploadButton,
                HomeFocus::UploadButton => HomeFocus::PhotoPath,
            };
        }
        KeyCode::Enter => match app.home_focus {
            HomeFocus::PhotoPath => {
                app.select_photo();
            }
            HomeFocus::UploadButton => {
                app.start_upload();
            }
        },
        KeyCode::Backspace => {
            if app.home_focus == HomeFocus::PhotoPath {
                app.photo_path.pop();
            }
        }
        KeyCode::Char(c) => {
            if app.home_focus == HomeFocus::PhotoPath && can_add_path_char(app.photo_path.chars().count(), c) {
                app.photo_path.push(c);
            }
        }
        _ => {}
    }
}
