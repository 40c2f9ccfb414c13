mod affiliates;
mod chains;
mod loyalty;
mod notifications;
mod reservations;
mod roulette;
mod surveys;
mod team;
mod users;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use affiliates::*;
pub use chains::*;
pub use loyalty::*;
pub use notifications::*;
pub use reservations::*;
pub use roulette::*;
pub use surveys::*;
pub use team::*;
pub use users::*;

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}
