pub mod movie;
pub mod payment;
pub mod rental;
pub mod user;

pub use movie::Movie;
pub use payment::{Payment, PaymentStatus};
pub use rental::{Rental, RentalKind, RentalStatus};
pub use user::User;
