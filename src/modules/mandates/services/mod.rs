pub mod mandate_service;

pub use mandate_service::MandateService;
