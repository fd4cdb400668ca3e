pub mod config;
pub mod history;
pub mod pair;
pub mod status;
pub mod sync;
