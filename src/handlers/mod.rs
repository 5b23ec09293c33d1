pub mod admin;
pub mod auth;
pub mod bookings;
pub mod business;
pub mod health;
pub mod users;
