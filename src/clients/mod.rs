pub mod messaging;

pub use messaging::{Delivery, MessagingClient, MessagingError};
