//! Transport implementations

pub mod metered;
pub mod replay;
pub mod tcp;

pub use metered::MeteredConnection;
pub use replay::ReplayTransport;
pub use tcp::TcpTransport;
