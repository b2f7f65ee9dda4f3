pub mod auth;
pub mod card;
pub mod gateway;
pub mod health;
pub mod patients;
pub mod reader;
