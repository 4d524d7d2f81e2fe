//! Storefront cart engine.
//!
//! This crate manages the shopping-cart lifecycle for a retail storefront:
//! building a cart item by item, checking it out against live catalog stock,
//! and keeping the resulting purchase history queryable. All state lives in
//! the relational database; cart mutations are transactional and serialized
//! per customer.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod migrator;
pub mod services;

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Shared application state: the connection pool, configuration and the
/// wired-up service graph. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub catalog_service: Arc<services::ProductCatalogService>,
    pub cart_service: Arc<services::CartService>,
}

impl AppState {
    /// Wires the service graph over an established connection pool.
    ///
    /// Returns the state together with the event receiver; the caller decides
    /// how to drain it (normally by spawning [`events::process_events`]).
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
    ) -> (Self, mpsc::Receiver<events::Event>) {
        let (event_sender, event_receiver) =
            events::event_channel(config.event_channel_capacity);
        let event_sender = Arc::new(event_sender);

        let catalog_service = Arc::new(services::ProductCatalogService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let cart_service = Arc::new(services::CartService::new(
            db.clone(),
            catalog_service.clone(),
            event_sender.clone(),
        ));

        (
            Self {
                db,
                config,
                event_sender,
                catalog_service,
                cart_service,
            },
            event_receiver,
        )
    }
}
