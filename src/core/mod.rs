//! Core business logic, independent of the HTTP layer.

/// Password hashing, session tokens and login
pub mod auth;
/// Printable proforma documents
pub mod document;
/// PI Hantaran and PI Shipment proformas
pub mod invoice;
/// Sidebar menus and role-scoped navigation
pub mod menu;
/// Order, sample and proforma numbering
pub mod numbering;
/// RS1/RS2 order intake and maintenance
pub mod order;
/// Roles and their menu grants
pub mod role;
/// Sample tracking through the laboratory steps
pub mod tracking;
/// User accounts
pub mod user;
