use serde::Serialize;

/// Typed failures surfaced by the cart and catalog services.
///
/// Every business condition a caller can recover from has its own variant;
/// storage faults are wrapped as [`ServiceError::DatabaseError`]. No variant
/// here is fatal to the process.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    /// The referenced product model does not exist in the catalog.
    #[error("Product {0} not found")]
    ProductNotFound(String),

    /// Catalog stock for the product is zero at the point it is needed.
    #[error("Product {0} is out of stock")]
    EmptyProductStock(String),

    /// Catalog stock is positive but below the quantity held in the cart.
    #[error("Product {model}: only {available} in stock, cart holds {requested}")]
    LowProductStock {
        model: String,
        available: i32,
        requested: i32,
    },

    /// No unpaid cart exists for the customer when one is required.
    #[error("No unpaid cart for customer {0}")]
    CartNotFound(String),

    /// The customer's unpaid cart has zero line items where a non-empty
    /// cart is required.
    #[error("Cart for customer {0} is empty")]
    EmptyCart(String),

    /// The named product is not a line item of the customer's current cart.
    #[error("Product {0} is not in the cart")]
    ProductNotInCart(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    /// Whether the error is an expected business condition, as opposed to a
    /// storage or wiring fault.
    pub fn is_business_error(&self) -> bool {
        !matches!(
            self,
            ServiceError::DatabaseError(_) | ServiceError::InternalError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_stock_message_names_model_and_quantities() {
        let err = ServiceError::LowProductStock {
            model: "phone-x".to_string(),
            available: 1,
            requested: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("phone-x"));
        assert!(msg.contains('1'));
        assert!(msg.contains('2'));
    }

    #[test]
    fn business_errors_are_flagged() {
        assert!(ServiceError::CartNotFound("alice".into()).is_business_error());
        assert!(ServiceError::EmptyCart("alice".into()).is_business_error());
        assert!(!ServiceError::InternalError("boom".into()).is_business_error());
    }

    #[test]
    fn db_error_converts_via_from() {
        let err: ServiceError = sea_orm::error::DbErr::Custom("oops".into()).into();
        assert!(matches!(err, ServiceError::DatabaseError(_)));
    }
}
