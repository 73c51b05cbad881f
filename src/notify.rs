use std::{
    collections::VecDeque,
    time::{
        Duration,
        Instant,
    },
};

const MAX_NOTIFICATIONS: usize = 20;

pub const LOADING_DURATION: Duration = Duration::from_millis(4000);
pub const SUCCESS_DURATION: Duration = Duration::from_millis(2000);
pub const ERROR_DURATION: Duration = Duration::from_millis(3000);
pub const INFO_DURATION: Duration = Duration::from_millis(2000);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NotificationKind {
    Loading,
    Success,
    Error,
    Info,
}

#[derive(Clone, Debug)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub raised_at: Instant,
    pub duration: Duration,
}

impl Notification {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.raised_at) >= self.duration
    }
}

/// Transient toasts. A success or error replaces any outstanding loading toast.
#[derive(Debug, Default)]
pub struct Notifications {
    items: VecDeque<Notification>,
}

impl Notifications {
    pub fn push(
        &mut self,
        kind: NotificationKind,
        message: impl Into<String>,
        duration: Duration,
    ) {
        if matches!(kind, NotificationKind::Success | NotificationKind::Error) {
            self.items.retain(|n| n.kind != NotificationKind::Loading);
        }
        self.items.push_back(Notification {
            kind,
            message: message.into(),
            raised_at: Instant::now(),
            duration,
        });
        while self.items.len() > MAX_NOTIFICATIONS {
            self.items.pop_front();
        }
    }

    pub fn loading(&mut self, message: impl Into<String>) {
        self.push(NotificationKind::Loading, message, LOADING_DURATION);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(NotificationKind::Success, message, SUCCESS_DURATION);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(NotificationKind::Error, message, ERROR_DURATION);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(NotificationKind::Info, message, INFO_DURATION);
    }

    pub fn prune(&mut self, now: Instant) {
        self.items.retain(|n| !n.is_expired(now));
    }

    pub fn active(&self, now: Instant) -> impl Iterator<Item = &Notification> {
        self.items.iter().filter(move |n| !n.is_expired(now))
    }

    pub fn latest(&self) -> Option<&Notification> {
        self.items.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }

    pub fn messages(&self, kind: NotificationKind) -> Vec<&str> {
        self.items
            .iter()
            .filter(|n| n.kind == kind)
            .map(|n| n.message.as_str())
            .collect()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn push__result_replaces_loading_toast() {
        let mut notes = Notifications::default();
        notes.loading("Feeding...");
        notes.info("unrelated");

        notes.success("Fed");

        let kinds: Vec<NotificationKind> = notes.iter().map(|n| n.kind).collect();
        assert_eq!(kinds, vec![NotificationKind::Info, NotificationKind::Success]);
    }

    #[test]
    fn prune__drops_expired_toasts() {
        let mut notes = Notifications::default();
        notes.push(NotificationKind::Info, "gone", Duration::ZERO);
        notes.push(NotificationKind::Info, "stays", Duration::from_secs(60));

        notes.prune(Instant::now());

        assert_eq!(notes.messages(NotificationKind::Info), vec!["stays"]);
    }

    #[test]
    fn push__keeps_a_bounded_history() {
        let mut notes = Notifications::default();
        for i in 0..50 {
            notes.info(format!("note {i}"));
        }
        assert_eq!(notes.iter().count(), MAX_NOTIFICATIONS);
        assert_eq!(notes.latest().unwrap().message, "note 49");
    }
}
