pub mod config;
pub mod error;
pub mod inactivity;
pub mod key;
pub mod mailer;
pub mod metrics;
pub mod observer;
pub mod s3;
pub mod series;
pub mod staging;
pub mod watcher;
