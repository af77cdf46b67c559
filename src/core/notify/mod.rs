pub mod notifier_service;

pub use notifier_service::{
    parse_recipients, Invitation, MailSender, NotifierService, NotifyReport,
};
