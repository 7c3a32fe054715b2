mod connection;

pub use connection::{TcpConnection, TcpConnector};
