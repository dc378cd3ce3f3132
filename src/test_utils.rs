//! Shared test utilities for the sample ledger.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{
        menu::{self, MenuInput},
        order::{self, FormType, OrderInput, OrderWithSamples, SampleInput},
        role::{self, RoleInput},
        user::{self, NewUser},
    },
    entities::{self, TrackingSample, tracking_sample},
    errors::Result,
};
use chrono::Utc;
use sea_orm::{DatabaseConnection, Set, prelude::*};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a role with no description.
pub async fn create_test_role(db: &DatabaseConnection, name: &str) -> Result<entities::role::Model> {
    role::create_role(
        db,
        RoleInput {
            name: name.to_string(),
            description: None,
        },
    )
    .await
}

/// Creates an active user named "Test User".
pub async fn create_test_user(
    db: &DatabaseConnection,
    email: &str,
    password: &str,
    role_id: i64,
) -> Result<entities::user::Model> {
    user::create_user(
        db,
        NewUser {
            name: "Test User".to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role_id,
        },
    )
    .await
}

/// Creates a menu without an icon.
pub async fn create_test_menu(
    db: &DatabaseConnection,
    title: &str,
    path: &str,
    parent_id: Option<i64>,
    sort_order: i32,
) -> Result<entities::menu::Model> {
    menu::create_menu(
        db,
        MenuInput {
            title: title.to_string(),
            path: path.to_string(),
            icon: None,
            parent_id,
            sort_order,
        },
    )
    .await
}

/// An admin user and role that are never stored, for token tests.
pub fn sample_user_and_role() -> (entities::user::Model, entities::role::Model) {
    let now = Utc::now();
    let role = entities::role::Model {
        id: 1,
        name: "admin".to_string(),
        description: None,
        created_at: now,
        updated_at: now,
    };
    let user = entities::user::Model {
        id: 7,
        name: "Admin".to_string(),
        email: "admin@lab.test".to_string(),
        password_hash: String::new(),
        role_id: role.id,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    (user, role)
}

/// Order fields with only the client name filled in.
pub fn order_input(client_name: &str) -> OrderInput {
    OrderInput {
        client_name: client_name.to_string(),
        ..Default::default()
    }
}

/// A sample line measured in pieces, analysed for pH.
pub fn sample_input(name: &str, quantity: i32, unit_price: f64) -> SampleInput {
    SampleInput {
        name: name.to_string(),
        sample_type: None,
        quantity,
        unit: "pcs".to_string(),
        parameters: "pH".to_string(),
        unit_price,
        notes: None,
    }
}

/// A sample row that is never stored, for pure billing tests.
pub fn sample_model(
    id: i64,
    name: &str,
    quantity: i32,
    unit_price: f64,
    parameters: &str,
) -> entities::sample::Model {
    let now = Utc::now();
    entities::sample::Model {
        id,
        order_id: 1,
        sample_code: format!("RS1/2026/0001-{id:02}"),
        name: name.to_string(),
        sample_type: None,
        quantity,
        unit: "pcs".to_string(),
        parameters: parameters.to_string(),
        unit_price,
        notes: None,
        created_at: now,
        updated_at: now,
    }
}

/// Submits an order with two samples.
///
/// # Defaults
/// * client: "Budi Santoso", no company
/// * RS2 orders ship with JNE from Medan
/// * samples: 2 × "Soil A" at 150.000 and 1 × "Leaf B" at 200.000
pub async fn create_test_order(
    db: &DatabaseConnection,
    form_type: FormType,
) -> Result<OrderWithSamples> {
    let mut input = order_input("Budi Santoso");
    if form_type == FormType::Rs2 {
        input.courier = Some("JNE".to_string());
        input.courier_tracking_number = Some("JNE0001".to_string());
        input.shipping_origin = Some("Medan".to_string());
    }
    let samples = vec![
        SampleInput {
            parameters: "pH, N".to_string(),
            ..sample_input("Soil A", 2, 150_000.0)
        },
        SampleInput {
            parameters: "K".to_string(),
            ..sample_input("Leaf B", 1, 200_000.0)
        },
    ];
    order::submit_order(db, form_type, input, samples, None).await
}

/// Marks the sample as sent and received, bypassing the step checks.
pub async fn mark_received(db: &DatabaseConnection, sample_id: i64) -> Result<()> {
    let row = TrackingSample::find()
        .filter(tracking_sample::Column::SampleId.eq(sample_id))
        .one(db)
        .await?
        .ok_or_else(|| crate::errors::Error::not_found("Tracking sample", sample_id))?;
    let now = Utc::now();
    let mut row: tracking_sample::ActiveModel = row.into();
    row.sent_at = Set(Some(now));
    row.received_at = Set(Some(now));
    row.update(db).await?;
    Ok(())
}
