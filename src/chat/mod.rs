pub mod convo;
pub mod service;

pub use service::ChatService;
