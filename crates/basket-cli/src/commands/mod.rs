pub mod add;
pub mod bought;
pub mod common;
pub mod delete;
pub mod list;
pub mod remote;
pub mod rename;
pub mod status;
pub mod sync;
