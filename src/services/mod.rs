pub mod cache_store;
pub mod listing_service;
pub mod lock;
pub mod object_store;
