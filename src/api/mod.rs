// Thin namespace wrapper for API-layer components
pub mod handlers {
    pub use crate::handlers::*;
}

pub mod portal_handler {
    pub use crate::portal_handler::*;
}

pub mod server {
    pub use crate::server::*;
}
