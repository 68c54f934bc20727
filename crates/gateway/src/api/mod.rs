pub mod router;
pub mod sessions;

pub use router::build_router;
