pub mod appointments;
pub mod availability;
pub mod init;
pub mod notifications;
pub mod reminders;
pub mod retry;
