pub mod registry;
pub mod services;
pub mod utils;

pub use registry::AccountRegistry;
