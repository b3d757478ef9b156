pub mod analytics_service;
pub mod assembler;
pub mod background;
pub mod cache_service;
pub mod normalizer;
pub mod pipelines;
pub mod store;
