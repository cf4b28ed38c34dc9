pub mod connection;
pub mod frame;
pub mod scram;

pub use connection::Connection;
