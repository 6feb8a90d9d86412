//! Reminder messages for players with unfinished or cancelled games.

use std::collections::HashMap;

use async_trait::async_trait;
use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_new::new;
use tictactoe_core::UserId;
use tracing::{info, instrument, warn};

use crate::db::{StoredGame, User};
use crate::{GameService, ServiceError};

const SUBJECT: &str = "This is a reminder!";

/// A message addressed to one player.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct Reminder {
    to: String,
    subject: String,
    body: String,
}

/// Delivery failure.
#[derive(Debug, Clone, Display, Error)]
#[display("Notify error: {} at {}:{}", message, file, line)]
pub struct NotifyError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl NotifyError {
    /// Creates a new delivery error with caller location tracking.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Outbound delivery of reminders.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one reminder from `sender`.
    async fn send(&self, sender: &str, reminder: &Reminder) -> Result<(), NotifyError>;
}

/// Notifier that writes reminders to the log instead of a mail transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    #[instrument(skip(self, reminder), fields(to = %reminder.to()))]
    async fn send(&self, sender: &str, reminder: &Reminder) -> Result<(), NotifyError> {
        info!(
            subject = %reminder.subject(),
            body = %reminder.body(),
            "Reminder sent"
        );
        Ok(())
    }
}

/// Builds the reminders owed for one game.
///
/// Active games remind both players to finish; cancelled games invite them
/// back. Players without an email address are skipped.
pub(crate) fn reminders_for(game: &StoredGame, users: &HashMap<UserId, User>) -> Vec<Reminder> {
    let state = game.game();
    let seats = [
        (state.player_x(), state.player_o()),
        (state.player_o(), state.player_x()),
    ];

    seats
        .into_iter()
        .filter_map(|(player, opponent)| {
            let user = users.get(&player)?;
            let email = user.email().as_ref()?;
            let opponent = users
                .get(&opponent)
                .map(|u| u.name().as_str())
                .unwrap_or("your opponent");
            let body = if state.is_cancelled() {
                format!(
                    "Hello {}, your game against {} was cancelled. Come back and start a new one!",
                    user.name(),
                    opponent
                )
            } else {
                format!(
                    "Hello {}, your game #{} against {} is waiting for you. Finish the game!",
                    user.name(),
                    game.id().get(),
                    opponent
                )
            };
            Some(Reminder::new(email.clone(), SUBJECT.to_string(), body))
        })
        .collect()
}

/// Collects pending reminders and hands them to `notifier`.
///
/// Delivery failures are logged and skipped. Returns how many were sent.
///
/// # Errors
///
/// Returns [`ServiceError`] if the reminders could not be collected.
#[instrument(skip(service, notifier))]
pub async fn send_reminders(
    service: &GameService,
    notifier: &dyn Notifier,
    sender: &str,
) -> Result<usize, ServiceError> {
    let svc = service.clone();
    let reminders = tokio::task::spawn_blocking(move || svc.reminders()).await??;

    let mut sent = 0;
    for reminder in &reminders {
        match notifier.send(sender, reminder).await {
            Ok(()) => sent += 1,
            Err(e) => warn!(error = %e, to = %reminder.to(), "Reminder delivery failed"),
        }
    }
    info!(sent, total = reminders.len(), "Reminder run finished");
    Ok(sent)
}
