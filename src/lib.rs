pub mod config;
pub mod error;
pub mod net;
pub mod scenario;
pub mod sim;
pub mod topo;

#[cfg(test)]
mod test;
