// Application layer - Use cases over the domain and its data sources
pub mod crisis;
pub mod data_service;
pub mod data_source;
pub mod navigation;
pub mod overview;
pub mod playback;
pub mod ports;
pub mod request_cache;
pub mod session;
