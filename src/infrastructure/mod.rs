// Infrastructure layer - External dependencies and adapters
pub mod chunked_json;
pub mod config;
pub mod csv_parser;
pub mod http_response;
pub mod parse_worker;
pub mod row_mapper;
pub mod static_files;
pub mod vitaldb_repository;
