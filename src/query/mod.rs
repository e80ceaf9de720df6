pub mod client;
pub mod response;

pub use client::{load_clients, GraphQlClient, QueryApi};
pub use response::{Node, QueryResponse};
