pub mod admin;
pub mod bookings;
pub mod email;
pub mod negotiation;
pub mod otp;
pub mod templates;
pub mod tokens;
pub mod users;
pub mod validation;
