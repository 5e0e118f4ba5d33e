use crate::domain::account::AccountId;
use crate::domain::ports::Notifier;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{info, warn};

/// Writes every notification to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, account: &AccountId, title: &str, body: &str) {
        info!(%account, title, body, "notification");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub account: AccountId,
    pub title: String,
    pub body: String,
}

/// Hands notifications to a delivery task over an unbounded channel.
///
/// Sending never blocks. If the receiving side is gone the notification is
/// dropped and logged.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, UnboundedReceiver<Notification>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, account: &AccountId, title: &str, body: &str) {
        let notification = Notification {
            account: account.clone(),
            title: title.to_string(),
            body: body.to_string(),
        };
        if let Err(err) = self.tx.send(notification) {
            warn!(account = %err.0.account, "notification dropped: no receiver");
        }
    }
}
