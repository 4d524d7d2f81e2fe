use crate::{
    entities::{product, Product, ProductModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ExprTrait,
    QueryFilter,
};
use std::sync::Arc;
use tracing::{info, instrument};

/// Catalog access for the cart core.
///
/// The cart service consumes exactly two operations from the catalog:
/// a product lookup and a stock adjustment. Stock decrements are a single
/// conditional UPDATE, so validation and decrement cannot interleave with a
/// concurrent writer between a read and a write.
#[derive(Clone)]
pub struct ProductCatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl ProductCatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Get a product by model.
    #[instrument(skip(self))]
    pub async fn get_product(&self, model: &str) -> Result<ProductModel, ServiceError> {
        Self::get_product_on(&*self.db, model).await
    }

    /// Get a product by model over an explicit connection, usable inside an
    /// open transaction.
    pub(crate) async fn get_product_on(
        conn: &impl ConnectionTrait,
        model: &str,
    ) -> Result<ProductModel, ServiceError> {
        Product::find_by_id(model.to_string())
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::ProductNotFound(model.to_string()))
    }

    /// Adjust catalog stock by `delta` (negative to decrement).
    ///
    /// Decrements that would take the stock below zero fail with
    /// `EmptyProductStock` or `LowProductStock` and leave the counter
    /// untouched.
    #[instrument(skip(self))]
    pub async fn adjust_stock(
        &self,
        model: &str,
        delta: i32,
    ) -> Result<ProductModel, ServiceError> {
        let product = Self::adjust_stock_on(&*self.db, model, delta).await?;

        self.event_sender
            .send_or_log(Event::StockAdjusted {
                product_model: model.to_string(),
                delta,
                new_quantity: product.quantity,
            })
            .await;

        info!(
            "Adjusted stock of {} by {} to {}",
            model, delta, product.quantity
        );
        Ok(product)
    }

    /// Stock adjustment over an explicit connection.
    ///
    /// The decrement guard (`quantity >= -delta`) lives in the UPDATE's WHERE
    /// clause, making read-and-decrement atomic at the statement level.
    pub(crate) async fn adjust_stock_on(
        conn: &impl ConnectionTrait,
        model: &str,
        delta: i32,
    ) -> Result<ProductModel, ServiceError> {
        let mut update = Product::update_many()
            .col_expr(
                product::Column::Quantity,
                Expr::col(product::Column::Quantity).add(delta),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Model.eq(model));

        if delta < 0 {
            update = update.filter(product::Column::Quantity.gte(-delta));
        }

        let result = update.exec(conn).await?;

        if result.rows_affected == 0 {
            // Either the product is gone or the guard rejected the decrement;
            // re-read to report which.
            let product = Self::get_product_on(conn, model).await?;
            if product.quantity == 0 {
                return Err(ServiceError::EmptyProductStock(model.to_string()));
            }
            return Err(ServiceError::LowProductStock {
                model: model.to_string(),
                available: product.quantity,
                requested: -delta,
            });
        }

        Self::get_product_on(conn, model).await
    }
}
