// Domain-layer modules and shared errors
pub mod dispatch {
    pub use crate::dispatch::*;
}

pub mod normalizer {
    pub use crate::normalizer::*;
}

pub mod errors {
    pub use crate::errors::*;
}
