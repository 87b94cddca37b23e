pub mod api;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod realtime;
