pub mod carts;
pub mod catalog;

pub use carts::{CartItemView, CartService, CartView};
pub use catalog::ProductCatalogService;
