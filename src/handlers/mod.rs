pub mod admin;
pub mod broadcast;
pub mod callback;
pub mod command;
pub mod join_request;
pub mod ui;

pub use admin::owner_command_handler;
pub use callback::callback_handler;
pub use command::command_handler;
pub use join_request::join_request_handler;

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
