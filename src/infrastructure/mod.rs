pub mod connectivity;
pub mod database;
pub mod jobs;
pub mod offline;
pub mod remote;
