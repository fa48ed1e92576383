/// Application layer - Use cases, DTOs and view maintenance
///
/// This layer contains the application logic that orchestrates
/// domain services and coordinates with infrastructure through ports.
pub mod dto;
pub mod read_models;
pub mod use_cases;
pub mod view_maintenance;
