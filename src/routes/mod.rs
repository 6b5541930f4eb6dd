pub mod api;
pub mod auth;
pub mod collections;
pub mod friends;
pub mod profile;
pub mod recipes;
