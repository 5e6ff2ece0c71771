pub mod bot;
pub mod digest;
pub mod http;
pub mod reader;
pub mod worker;
