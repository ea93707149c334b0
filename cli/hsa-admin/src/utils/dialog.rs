use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crossterm::tty::IsTty;
use hsa_sdk::models::resolver::ResolverEvent;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::error::{InquireError, InquireResult};
use inquire::ui::{Attributes, Color, RenderConfig, StyleSheet, Styled};
use inquire::PasswordDisplayMode;

use super::TERMINAL_STDERR;

/// Free text input
#[derive(Debug, Clone)]
pub struct Text {
    pub default: Option<String>,
}

/// Masked input, asked once
#[derive(Debug, Clone)]
pub struct Password;

/// Spinner following the loading state of a resolver
#[derive(Clone, Default)]
pub struct Spinner {
    bar: Rc<RefCell<Option<ProgressBar>>>,
}

#[derive(Debug, Clone)]
pub struct Dialog<'a, Type> {
    pub message: &'a str,
    pub help_message: Option<&'a str>,
    pub typed: Type,
}

impl Dialog<'_, Text> {
    pub async fn prompt(self) -> InquireResult<String> {
        let message = self.message.to_owned();
        let help_message = self.help_message.map(ToOwned::to_owned);
        let default = self.typed.default;

        tokio::task::spawn_blocking(move || {
            let _stderr_lock = TERMINAL_STDERR.lock();

            let mut dialog = inquire::Text::new(&message).with_render_config(hsa_theme());

            if let Some(ref default) = default {
                dialog = dialog.with_default(default);
            }

            if let Some(ref help_message) = help_message {
                dialog = dialog.with_help_message(help_message);
            }

            dialog.prompt()
        })
        .await
        .map_err(|e| InquireError::Custom(Box::new(e)))?
    }
}

impl Dialog<'_, Password> {
    pub async fn prompt(self) -> InquireResult<String> {
        let message = self.message.to_owned();
        let help_message = self.help_message.map(ToOwned::to_owned);

        tokio::task::spawn_blocking(move || {
            let _stderr_lock = TERMINAL_STDERR.lock();

            let mut dialog = inquire::Password::new(&message)
                .without_confirmation()
                .with_display_mode(PasswordDisplayMode::Masked)
                .with_render_config(hsa_theme());

            if let Some(ref help_message) = help_message {
                dialog = dialog.with_help_message(help_message);
            }

            dialog.prompt()
        })
        .await
        .map_err(|e| InquireError::Custom(Box::new(e)))?
    }
}

impl Dialog<'_, Spinner> {
    /// Callback for a resolver subscription.
    ///
    /// The spinner starts on [ResolverEvent::Loading] and is cleared once the
    /// fetch resolves one way or the other.
    pub fn follow(self) -> impl Fn(&ResolverEvent) + 'static {
        let message = self.message.to_string();
        let help_message = self.help_message.map(ToOwned::to_owned);
        let spinner = self.typed;

        move |event| match event {
            ResolverEvent::Loading => spinner.start(&message, help_message.as_deref()),
            ResolverEvent::Loaded { .. }
            | ResolverEvent::Failed
            | ResolverEvent::StaleDiscarded { .. } => spinner.stop(),
            ResolverEvent::QueryChanged => {},
        }
    }
}

impl Spinner {
    fn start(&self, message: &str, help_message: Option<&str>) {
        let mut bar = self.bar.borrow_mut();
        if bar.is_some() {
            return;
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {wide_msg} {prefix:>}") {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        if let Some(help_message) = help_message {
            spinner.set_prefix(help_message.to_string());
        }
        spinner.enable_steady_tick(Duration::from_millis(100));
        *bar = Some(spinner);
    }

    fn stop(&self) {
        if let Some(spinner) = self.bar.borrow_mut().take() {
            spinner.finish_and_clear();
        }
    }

    pub fn is_spinning(&self) -> bool {
        self.bar.borrow().is_some()
    }
}

impl Dialog<'_, ()> {
    /// True if stderr and stdin are ttys
    pub fn can_prompt() -> bool {
        if std::env::var("_HSA_NO_PROMPT").is_ok_and(|v| v == "1") {
            return false;
        }
        std::io::stderr().is_tty() && std::io::stdin().is_tty()
    }
}

pub fn hsa_theme() -> RenderConfig<'static> {
    let mut render_config = RenderConfig::default_colored();

    render_config.answered_prompt_prefix = Styled::new(">").with_fg(Color::DarkCyan);
    render_config.prompt_prefix = Styled::new("?").with_fg(Color::DarkCyan);
    render_config.prompt = StyleSheet::new().with_attr(Attributes::BOLD);
    render_config.help_message = StyleSheet::new().with_fg(Color::Grey);
    render_config.answer = StyleSheet::new().with_fg(Color::DarkCyan);

    render_config
}
