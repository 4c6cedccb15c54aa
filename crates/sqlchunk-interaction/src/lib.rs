//! Clients for the remote conversion service.

pub mod http_conversion_service;

pub use http_conversion_service::HttpConversionService;
