pub mod chores;
pub mod server;
pub mod settlement;
pub mod storage;
