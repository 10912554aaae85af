pub mod catalog;

pub use catalog::{CatalogClient, CatalogError, HttpCatalogClient, Product, ResilientCatalogClient};
