use crate::{
    entities::{cart, cart_item, Cart, CartItem, CartModel, CartStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::catalog::ProductCatalogService,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

/// Shopping cart service: the cart state machine and checkout protocol.
///
/// Each customer has at most one unpaid cart, created on demand by the first
/// `add_to_cart`. Every mutating operation recomputes the cart total from the
/// line items before returning, and runs under that customer's lock so
/// concurrent mutations of the same cart are serialized.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    catalog: Arc<ProductCatalogService>,
    event_sender: Arc<EventSender>,
    customer_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl CartService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        catalog: Arc<ProductCatalogService>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            db,
            catalog,
            event_sender,
            customer_locks: Arc::new(DashMap::new()),
        }
    }

    /// Adds one unit of a product to the customer's unpaid cart, creating
    /// the cart if none exists.
    ///
    /// The product must exist and have nonzero catalog stock. The stock check
    /// is against the catalog's current counter only; the quantity already in
    /// the cart is not reserved and is re-validated at checkout.
    ///
    /// A repeated add of the same model increments the line item's quantity
    /// by one; a first add inserts a line item with the product's current
    /// price and category snapshot.
    #[instrument(skip(self))]
    pub async fn add_to_cart(
        &self,
        customer_id: &str,
        product_model: &str,
    ) -> Result<CartView, ServiceError> {
        let lock = self.customer_lock(customer_id);
        let _guard = lock.lock().await;

        let product = self.catalog.get_product(product_model).await?;
        if product.quantity <= 0 {
            return Err(ServiceError::EmptyProductStock(product_model.to_string()));
        }

        let txn = self.db.begin().await?;

        let (cart, created) = match Self::find_unpaid_cart(&txn, customer_id).await? {
            Some(cart) => (cart, false),
            None => (Self::create_cart(&txn, customer_id).await?, true),
        };
        let cart_id = cart.id;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .filter(cart_item::Column::ProductModel.eq(product_model))
            .one(&txn)
            .await?;

        let quantity = if let Some(item) = existing {
            let current = item.quantity;
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(current + 1);
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?;
            current + 1
        } else {
            let item = cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart_id),
                product_model: Set(product.model.clone()),
                quantity: Set(1),
                category: Set(product.category.clone()),
                unit_price: Set(product.selling_price),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
            };
            item.insert(&txn).await?;
            1
        };

        let cart = Self::recalculate_cart_total(&txn, cart_id).await?;
        let items = cart.find_related(CartItem).all(&txn).await?;

        txn.commit().await?;

        if created {
            self.event_sender
                .send_or_log(Event::CartCreated {
                    cart_id,
                    customer_id: customer_id.to_string(),
                })
                .await;
        }
        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id,
                product_model: product.model.clone(),
                quantity,
            })
            .await;

        info!(
            "Added {} to cart {} (quantity now {})",
            product.model, cart_id, quantity
        );
        Ok(CartView::from_parts(cart, items))
    }

    /// Returns the customer's unpaid cart with its line items.
    ///
    /// A customer with no unpaid cart (or an unpaid cart whose items were all
    /// removed) receives a well-formed empty cart, never a missing value.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, customer_id: &str) -> Result<CartView, ServiceError> {
        let Some(cart) = Self::find_unpaid_cart(&*self.db, customer_id).await? else {
            return Ok(CartView::empty(customer_id));
        };

        let items = cart.find_related(CartItem).all(&*self.db).await?;
        if items.is_empty() {
            return Ok(CartView::empty(customer_id));
        }

        Ok(CartView::from_parts(cart, items))
    }

    /// Checks out the customer's unpaid cart.
    ///
    /// Two phases inside one transaction:
    /// 1. Validate: every line item against current catalog stock — zero
    ///    stock fails with `EmptyProductStock`, stock below the cart quantity
    ///    with `LowProductStock`. Any failing item aborts the whole checkout.
    /// 2. Commit: recompute the total, flip the cart to paid stamping
    ///    `payment_date`, then decrement catalog stock per line item.
    ///
    /// A failure in either phase rolls the transaction back: the cart stays
    /// unpaid and no stock is decremented.
    #[instrument(skip(self))]
    pub async fn checkout_cart(&self, customer_id: &str) -> Result<CartView, ServiceError> {
        let lock = self.customer_lock(customer_id);
        let _guard = lock.lock().await;

        let txn = self.db.begin().await?;

        let cart = Self::find_unpaid_cart(&txn, customer_id)
            .await?
            .ok_or_else(|| ServiceError::CartNotFound(customer_id.to_string()))?;

        let items = cart.find_related(CartItem).all(&txn).await?;
        if items.is_empty() {
            return Err(ServiceError::EmptyCart(customer_id.to_string()));
        }

        // Validate phase: read-only pass over every line item.
        for item in &items {
            let product = ProductCatalogService::get_product_on(&txn, &item.product_model).await?;
            if product.quantity == 0 {
                return Err(ServiceError::EmptyProductStock(item.product_model.clone()));
            }
            if product.quantity < item.quantity {
                return Err(ServiceError::LowProductStock {
                    model: item.product_model.clone(),
                    available: product.quantity,
                    requested: item.quantity,
                });
            }
        }

        // Commit phase. The stored total is recomputed from the line items
        // so history rows are self-contained.
        let total: Decimal = items.iter().map(|item| item.line_total()).sum();
        let payment_date = Utc::now();

        let cart_id = cart.id;
        let mut active: cart::ActiveModel = cart.into();
        active.status = Set(CartStatus::Paid);
        active.payment_date = Set(Some(payment_date));
        active.total = Set(total);
        active.updated_at = Set(payment_date);
        let cart = active.update(&txn).await?;

        for item in &items {
            ProductCatalogService::adjust_stock_on(&txn, &item.product_model, -item.quantity)
                .await?;
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartCheckedOut {
                cart_id,
                customer_id: customer_id.to_string(),
                total,
            })
            .await;

        info!(
            "Checked out cart {} for customer {} (total {})",
            cart_id, customer_id, total
        );
        Ok(CartView::from_parts(cart, items))
    }

    /// Removes one unit of a product from the customer's unpaid cart.
    ///
    /// Preconditions, in order: the product exists in the catalog, the
    /// customer has an unpaid cart, the cart is non-empty, and the product is
    /// one of its line items. A quantity above one is decremented; a
    /// quantity of exactly one deletes the line item.
    #[instrument(skip(self))]
    pub async fn remove_product_from_cart(
        &self,
        customer_id: &str,
        product_model: &str,
    ) -> Result<CartView, ServiceError> {
        let lock = self.customer_lock(customer_id);
        let _guard = lock.lock().await;

        self.catalog.get_product(product_model).await?;

        let txn = self.db.begin().await?;

        let cart = Self::find_unpaid_cart(&txn, customer_id)
            .await?
            .ok_or_else(|| ServiceError::CartNotFound(customer_id.to_string()))?;

        let items = cart.find_related(CartItem).all(&txn).await?;
        if items.is_empty() {
            return Err(ServiceError::EmptyCart(customer_id.to_string()));
        }

        let item = items
            .iter()
            .find(|item| item.product_model == product_model)
            .cloned()
            .ok_or_else(|| ServiceError::ProductNotInCart(product_model.to_string()))?;

        let cart_id = cart.id;
        if item.quantity > 1 {
            let quantity = item.quantity;
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(quantity - 1);
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?;
        } else {
            item.delete(&txn).await?;
        }

        let cart = Self::recalculate_cart_total(&txn, cart_id).await?;
        let items = cart.find_related(CartItem).all(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id,
                product_model: product_model.to_string(),
            })
            .await;

        info!("Removed {} from cart {}", product_model, cart_id);
        Ok(CartView::from_parts(cart, items))
    }

    /// Removes every line item from the customer's unpaid cart, leaving an
    /// empty cart with a zero total. The cart row itself is kept.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, customer_id: &str) -> Result<CartView, ServiceError> {
        let lock = self.customer_lock(customer_id);
        let _guard = lock.lock().await;

        let txn = self.db.begin().await?;

        let cart = Self::find_unpaid_cart(&txn, customer_id)
            .await?
            .ok_or_else(|| ServiceError::CartNotFound(customer_id.to_string()))?;

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        let cart_id = cart.id;
        let mut active: cart::ActiveModel = cart.into();
        active.total = Set(Decimal::ZERO);
        active.updated_at = Set(Utc::now());
        let cart = active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender.send_or_log(Event::CartCleared(cart_id)).await;

        info!("Cleared cart {}", cart_id);
        Ok(CartView::from_parts(cart, Vec::new()))
    }

    /// Returns the customer's purchase history: every paid cart with its
    /// frozen line items and total, oldest first.
    #[instrument(skip(self))]
    pub async fn get_customer_carts(
        &self,
        customer_id: &str,
    ) -> Result<Vec<CartView>, ServiceError> {
        let carts = Cart::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .filter(cart::Column::Status.eq(CartStatus::Paid))
            .order_by_asc(cart::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        self.load_views(carts).await
    }

    /// Administrative: every cart of every customer, any status.
    #[instrument(skip(self))]
    pub async fn get_all_carts(&self) -> Result<Vec<CartView>, ServiceError> {
        let carts = Cart::find()
            .order_by_asc(cart::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        self.load_views(carts).await
    }

    /// Administrative: deletes every cart and its line items. Line items go
    /// first so a cart row never outlives its parent — both or neither.
    #[instrument(skip(self))]
    pub async fn delete_all_carts(&self) -> Result<u64, ServiceError> {
        let txn = self.db.begin().await?;

        CartItem::delete_many().exec(&txn).await?;
        let result = Cart::delete_many().exec(&txn).await?;

        txn.commit().await?;

        info!("Deleted {} carts", result.rows_affected);
        Ok(result.rows_affected)
    }

    fn customer_lock(&self, customer_id: &str) -> Arc<Mutex<()>> {
        self.customer_locks
            .entry(customer_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn find_unpaid_cart(
        conn: &impl ConnectionTrait,
        customer_id: &str,
    ) -> Result<Option<CartModel>, ServiceError> {
        Cart::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .filter(cart::Column::Status.eq(CartStatus::Unpaid))
            .one(conn)
            .await
            .map_err(Into::into)
    }

    async fn create_cart(
        conn: &impl ConnectionTrait,
        customer_id: &str,
    ) -> Result<CartModel, ServiceError> {
        let cart = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id.to_string()),
            status: Set(CartStatus::Unpaid),
            payment_date: Set(None),
            total: Set(Decimal::ZERO),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };

        Ok(cart.insert(conn).await?)
    }

    /// Recompute the cart total from the line items and persist it.
    ///
    /// Recomputation from source data rather than incremental arithmetic:
    /// the total can never drift from the line items it is derived from.
    async fn recalculate_cart_total(
        conn: &impl ConnectionTrait,
        cart_id: Uuid,
    ) -> Result<CartModel, ServiceError> {
        let items = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .all(conn)
            .await?;

        let total: Decimal = items.iter().map(|item| item.line_total()).sum();

        let mut cart: cart::ActiveModel = Cart::find_by_id(cart_id)
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!("cart {} vanished during total recompute", cart_id))
            })?
            .into();

        cart.total = Set(total);
        cart.updated_at = Set(Utc::now());

        Ok(cart.update(conn).await?)
    }

    async fn load_views(&self, carts: Vec<CartModel>) -> Result<Vec<CartView>, ServiceError> {
        let mut views = Vec::with_capacity(carts.len());
        for cart in carts {
            let items = cart.find_related(CartItem).all(&*self.db).await?;
            views.push(CartView::from_parts(cart, items));
        }
        Ok(views)
    }
}

/// Read model for a cart: the uniform shape every operation returns,
/// including the empty cart of a customer who has none.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub customer_id: String,
    pub status: CartStatus,
    pub payment_date: Option<DateTime<Utc>>,
    pub total: Decimal,
    pub items: Vec<CartItemView>,
}

/// Read model for a cart line item.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub product_model: String,
    pub quantity: i32,
    pub category: String,
    pub unit_price: Decimal,
}

impl CartView {
    /// The canonical empty cart: unpaid, zero total, zero items.
    pub fn empty(customer_id: &str) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            status: CartStatus::Unpaid,
            payment_date: None,
            total: Decimal::ZERO,
            items: Vec::new(),
        }
    }

    fn from_parts(cart: CartModel, items: Vec<cart_item::Model>) -> Self {
        Self {
            customer_id: cart.customer_id,
            status: cart.status,
            payment_date: cart.payment_date,
            total: cart.total,
            items: items
                .into_iter()
                .map(|item| CartItemView {
                    product_model: item.product_model,
                    quantity: item.quantity,
                    category: item.category,
                    unit_price: item.unit_price,
                })
                .collect(),
        }
    }

    /// True when the cart has no line items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
