pub mod analysis;
pub mod export;
pub mod feature_collection;
pub mod loader;
