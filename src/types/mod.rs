//! Request payloads and typed views of pushed events.

pub mod request;
pub mod response;

pub use request::Transaction;
pub use response::PylonEvent;
