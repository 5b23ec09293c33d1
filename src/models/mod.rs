pub mod booking;
pub mod booking_request;
pub mod business;
pub mod otp;
pub mod user;

pub use booking::{Booking, BookingStatus, TimePreference};
pub use booking_request::{BookingRequest, BookingRequestStatus};
pub use business::Business;
pub use otp::{OtpPurpose, OtpRecord};
pub use user::User;
