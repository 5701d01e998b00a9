//! User-facing notifications and navigation requests

use log::{error, info, warn};

/// Visual weight of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    #[default]
    Default,
    Success,
    Warning,
    Destructive,
}

/// A non-blocking message for the user (a toast in the dashboard)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: Variant,
}

impl Notification {
    pub fn new(title: &str, description: &str, variant: Variant) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            variant,
        }
    }

    pub fn success(title: &str, description: &str) -> Self {
        Self::new(title, description, Variant::Success)
    }

    pub fn warning(title: &str, description: &str) -> Self {
        Self::new(title, description, Variant::Warning)
    }

    pub fn destructive(title: &str, description: &str) -> Self {
        Self::new(title, description, Variant::Destructive)
    }
}

/// Receives notifications. Implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, n: Notification) {
        match n.variant {
            Variant::Destructive => error!("{}: {}", n.title, n.description),
            Variant::Warning => warn!("{}: {}", n.title, n.description),
            Variant::Default | Variant::Success => info!("{}: {}", n.title, n.description),
        }
    }
}

/// Performs a full navigation away from the current page
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &str);
}

/// Logs navigation requests instead of following them
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, url: &str) {
        info!("Navigation requested to {}", url);
    }
}
