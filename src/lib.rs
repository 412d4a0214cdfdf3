// Biosignal dashboard core: data access, signal analysis and session state
pub mod analysis;
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
