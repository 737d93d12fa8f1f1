//! External service integrations.

pub mod crm_client {
    pub use crate::crm_client::*;
}

pub mod portal_models {
    pub use crate::portal_models::*;
}
