pub mod albums;
pub mod auth;
pub mod category;
pub mod classification;
pub mod config;
pub mod contact;
pub mod db;
pub mod environment;
pub mod errors;
pub mod host;
pub mod media;
pub mod normalization;
pub mod routes;
pub mod showcase;
pub mod times;
pub mod user;
