pub mod collab;
pub mod health;
pub mod sessions;
pub mod settle;
