pub mod temporal;
pub mod retriever;
