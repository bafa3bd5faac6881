pub mod collective;
pub mod local;
pub mod coordinator;
