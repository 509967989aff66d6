mod handlers;
mod server;
mod session;
#[cfg(test)]
mod tests;

pub use server::{StreamServer, StreamServerBuilder};
pub use session::ClientSession;
