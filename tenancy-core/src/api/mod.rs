//! REST API handlers and shared response types

pub mod access;
pub mod health;
pub mod metrics;
pub mod quote;
pub mod records;

use serde::{Deserialize, Serialize};

/// Success response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}
