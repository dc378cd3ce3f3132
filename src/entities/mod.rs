//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod menu;
pub mod order;
pub mod pi_hantaran;
pub mod pi_shipment;
pub mod role;
pub mod role_menu;
pub mod sample;
pub mod tracking_sample;
pub mod user;

// Re-export specific types to avoid conflicts
pub use menu::{Column as MenuColumn, Entity as Menu, Model as MenuModel};
pub use order::{Column as OrderColumn, Entity as Order, Model as OrderModel};
pub use pi_hantaran::{
    Column as PiHantaranColumn, Entity as PiHantaran, Model as PiHantaranModel,
};
pub use pi_shipment::{
    Column as PiShipmentColumn, Entity as PiShipment, Model as PiShipmentModel,
};
pub use role::{Column as RoleColumn, Entity as Role, Model as RoleModel};
pub use role_menu::{Column as RoleMenuColumn, Entity as RoleMenu, Model as RoleMenuModel};
pub use sample::{Column as SampleColumn, Entity as Sample, Model as SampleModel};
pub use tracking_sample::{
    Column as TrackingSampleColumn, Entity as TrackingSample, Model as TrackingSampleModel,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
