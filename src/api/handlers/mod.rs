//! Route handlers, one module per resource.

pub mod auth;
pub mod dashboard;
pub mod invoices;
pub mod menus;
pub mod orders;
pub mod roles;
pub mod tracking;
pub mod users;
