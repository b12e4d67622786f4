// Core services
pub mod contracts;
pub mod injections;
pub mod orders;
pub mod periods;

// Reporting and downloads
pub mod dashboard;
pub mod exports;
pub mod statistics;
