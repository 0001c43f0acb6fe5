use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use derma_core::SessionState;

use crate::app::{App, AppState, HomeFocus, LoginFocus, Screen, UploadStatus};
use crate::utils::{format_bytes, truncate_left};

use super::styles;

/// Width of the login and home dialogs
const DIALOG_WIDTH: u16 = 56;

/// Visible characters of a text field
const FIELD_WIDTH: usize = 24;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);

    match app.screen() {
        Screen::Login => render_login(frame, app, chunks[1]),
        Screen::Home => render_home(frame, app, chunks[1]),
    }

    render_status_bar(frame, app, chunks[2]);

    if matches!(app.state, AppState::ConfirmingLogout) {
        render_logout_overlay(frame);
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  Derma";
    let right = match app.screen() {
        Screen::Home => format!("Signed in as {}", app.session.username()),
        Screen::Login => String::new(),
    };

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(
            area.width
                .saturating_sub(title.len() as u16 + right.chars().count() as u16 + 4)
                as usize,
        )),
        Span::styled(right, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(title_line).block(block);
    frame.render_widget(paragraph, area);
}

/// A `Label: [value▌]` form line
fn field_line<'a>(label: &'a str, value: String, focused: bool) -> Line<'a> {
    let display = format!("{:<width$}", truncate_left(&value, FIELD_WIDTH), width = FIELD_WIDTH);
    let cursor = if focused { "▌" } else { " " };
    Line::from(vec![
        Span::raw("   "),
        Span::styled(format!("{:>9}: [", label), styles::muted_style()),
        Span::styled(format!("{}{}", display, cursor), styles::field_style(focused)),
        Span::styled("]", styles::muted_style()),
    ])
}

/// A centered `[ label ]` button line
fn button_line(label: &str, focused: bool) -> Line<'static> {
    let text = if focused {
        format!(" ▶ {} ◀ ", label)
    } else {
        format!("   {}   ", label)
    };
    let pad = (DIALOG_WIDTH as usize).saturating_sub(text.chars().count() + 4) / 2;
    Line::from(vec![
        Span::raw(format!("{}[", " ".repeat(pad))),
        Span::styled(text, styles::field_style(focused)),
        Span::raw("]"),
    ])
}

fn render_login(frame: &mut Frame, app: &App, area: Rect) {
    let error = app.login_error();
    let height = if error.is_some() { 12 } else { 10 };
    let area = centered_rect_fixed(DIALOG_WIDTH, height, area);

    frame.render_widget(Clear, area);

    let logging_in = app.session.state() == SessionState::LoggingIn;

    let mut lines = vec![
        Line::from(Span::styled("   Welcome Back!", styles::title_style())),
        Line::from(""),
        field_line(
            "Username",
            app.login_username.clone(),
            !logging_in && app.login_focus == LoginFocus::Username,
        ),
        field_line(
            "Password",
            "*".repeat(app.login_password.chars().count()),
            !logging_in && app.login_focus == LoginFocus::Password,
        ),
        Line::from(""),
    ];

    if logging_in {
        lines.push(Line::from(Span::styled(
            "                   Signing in...",
            styles::highlight_style(),
        )));
    } else {
        lines.push(button_line("Login", app.login_focus == LoginFocus::Button));
    }

    if let Some(error) = error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("   {}", error),
            styles::error_style(),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_home(frame: &mut Frame, app: &App, area: Rect) {
    let area = centered_rect_fixed(DIALOG_WIDTH, 13, area);
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(Span::styled(
            format!("   Welcome, {}!", app.session.username()),
            styles::title_style(),
        )),
        Line::from(""),
        field_line(
            "Photo",
            app.photo_path.clone(),
            app.home_focus == HomeFocus::PhotoPath,
        ),
    ];

    match app.selected_photo {
        _ if app.photo_loading => {
            lines.push(Line::from(Span::styled(
                "              Loading photo...",
                styles::muted_style(),
            )));
        }
        Some(ref photo) => {
            let name = photo
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            lines.push(Line::from(vec![
                Span::raw("              "),
                Span::styled(
                    format!(
                        "{}  {}x{}  {} JPEG",
                        truncate_left(&name, 20),
                        photo.jpeg.width,
                        photo.jpeg.height,
                        format_bytes(photo.jpeg.len())
                    ),
                    styles::list_item_style(),
                ),
            ]));
        }
        None => {
            lines.push(Line::from(Span::styled(
                "              No photo selected",
                styles::muted_style(),
            )));
        }
    }

    lines.push(Line::from(""));
    lines.push(button_line(
        "Upload Image",
        app.home_focus == HomeFocus::UploadButton,
    ));
    lines.push(Line::from(""));

    let status = match app.upload_status {
        UploadStatus::Idle => Span::raw(""),
        UploadStatus::Uploading => Span::styled("   Uploading...", styles::highlight_style()),
        UploadStatus::Done(ref ack) => Span::styled(
            format!("   Uploaded (status {})", ack.status),
            styles::success_style(),
        ),
        UploadStatus::Failed(ref error) => {
            Span::styled(format!("   {}", error), styles::error_style())
        }
    };
    lines.push(Line::from(status));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = match app.screen() {
        Screen::Login => "[Tab] next field | [Enter] login | [Esc] quit",
        Screen::Home => "[Tab] switch | [Enter] select/upload | [Esc] logout | [Ctrl+C] quit",
    };

    let left_text = match app.status_message {
        Some(ref msg) => format!(" {} ", msg),
        None => format!(" {} ", app.session.state().label()),
    };
    let right_text = format!(" {} ", shortcuts);

    let padding_len = (area.width as usize)
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.chars().count());
    let status_line = Line::from(vec![
        Span::styled(left_text, styles::muted_style()),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);

    let paragraph = Paragraph::new(status_line).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_logout_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 7, frame.area());

    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(Span::styled("   Logout", styles::title_style())),
        Line::from(""),
        Line::from(Span::styled(
            "   Are you sure you want to log out?",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to log out, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
