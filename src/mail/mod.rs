pub mod sendmail;
pub mod mails;
