mod appointments;
mod message_templates;
mod messaging_configs;
mod notification_records;

pub use appointments::*;
pub use message_templates::*;
pub use messaging_configs::*;
pub use notification_records::*;
