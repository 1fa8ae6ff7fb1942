pub mod dry_run;
pub mod error;
pub mod notifier;
pub mod provider;

pub use dry_run::{LogNotifier, LogProvider};
pub use error::{ConferencingError, NotifyError};
pub use notifier::{Notification, NotificationKind, Notifier};
pub use provider::ConferencingProvider;
