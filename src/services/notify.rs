use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Info,
    Warning,
}

impl NotificationKind {
    /// How long a notification of this kind stays up.
    pub fn default_duration(&self) -> Duration {
        match self {
            NotificationKind::Success | NotificationKind::Info => Duration::from_secs(5),
            NotificationKind::Warning => Duration::from_secs(6),
            NotificationKind::Error => Duration::from_secs(8),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: u64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(skip)]
    pub duration: Duration,
    #[serde(skip)]
    pub created_at: Instant,
}

impl Notification {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.duration
    }
}

/// Queue of transient user messages, oldest first.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    next_id: u64,
    items: Vec<Notification>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> u64 {
        self.push_at(kind, title, message, kind.default_duration(), Instant::now())
    }

    pub fn push_at(
        &mut self,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        duration: Duration,
        created_at: Instant,
    ) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.items.push(Notification {
            id,
            kind,
            title: title.into(),
            message: message.into(),
            duration,
            created_at,
        });
        id
    }

    pub fn success(&mut self, title: impl Into<String>, message: impl Into<String>) -> u64 {
        self.push(NotificationKind::Success, title, message)
    }

    pub fn error(&mut self, title: impl Into<String>, message: impl Into<String>) -> u64 {
        self.push(NotificationKind::Error, title, message)
    }

    pub fn info(&mut self, title: impl Into<String>, message: impl Into<String>) -> u64 {
        self.push(NotificationKind::Info, title, message)
    }

    pub fn warning(&mut self, title: impl Into<String>, message: impl Into<String>) -> u64 {
        self.push(NotificationKind::Warning, title, message)
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.id != id);
        self.items.len() != before
    }

    /// Drops every notification whose display time has run out.
    pub fn expire(&mut self, now: Instant) {
        self.items.retain(|n| !n.is_expired(now));
    }

    pub fn active(&self) -> &[Notification] {
        &self.items
    }

    pub fn latest(&self) -> Option<&Notification> {
        self.items.last()
    }
}
