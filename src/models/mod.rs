mod appearance;
mod character;
mod issue;
mod source;
mod synclog;

pub use self::appearance::{AppearanceType, CharacterIssue};
pub use self::character::{Character, Publisher};
pub use self::issue::{Format, Issue};
pub use self::source::{CharacterSource, VendorType};
pub use self::synclog::{SyncLog, SyncStatus, SyncType};
