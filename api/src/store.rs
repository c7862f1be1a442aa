//! Product model and storage.
//!
//! Provides the `ProductStore` trait for abstracting product persistence,
//! an `InMemoryProductStore` implementation for development and testing,
//! and a `ClickHouse`-backed implementation for production use.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

/// A product in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier.
    pub id: String,
    /// Product name.
    pub name: String,
    /// Product price.
    pub price: f64,
    /// Product image URL.
    pub image: String,
    /// When the product was created.
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Creates a new product with a fresh identifier and the current
    /// timestamp.
    #[must_use]
    pub fn new(name: impl Into<String>, price: f64, image: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            price,
            image: image.into(),
            created_at: Utc::now(),
        }
    }
}

/// Incoming product payload.
///
/// All fields are optional at the deserialization layer so a partial body
/// reaches the handler (and its span) instead of being rejected by the
/// extractor; `validate` then decides.
#[derive(Debug, Deserialize, Validate)]
pub struct ProductInput {
    /// Product name.
    #[validate(required, length(min = 1, message = "Product name cannot be empty"))]
    pub name: Option<String>,
    /// Product price.
    #[validate(required, range(min = 0.0, message = "Price cannot be negative"))]
    pub price: Option<f64>,
    /// Product image URL.
    #[validate(required, length(min = 1, message = "Product image cannot be empty"))]
    pub image: Option<String>,
}

/// Errors that can occur during product store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to acquire lock on the store.
    #[error("Failed to acquire lock on product store")]
    LockError,

    /// Generic storage error.
    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Trait for product storage implementations.
///
/// Implementations must be thread-safe (Send + Sync).
pub trait ProductStore: Send + Sync {
    /// Inserts a product into the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn insert(&self, product: Product) -> Result<(), StoreError>;

    /// Lists all products, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query operation fails.
    fn list(&self) -> Result<Vec<Product>, StoreError>;

    /// Returns the number of stored products.
    ///
    /// # Errors
    ///
    /// Returns an error if the count operation fails.
    fn count(&self) -> Result<usize, StoreError>;

    /// Removes all products.
    ///
    /// # Errors
    ///
    /// Returns an error if the clear operation fails.
    fn clear(&self) -> Result<(), StoreError>;
}

/// In-memory product store implementation.
#[derive(Debug, Default)]
pub struct InMemoryProductStore {
    products: Arc<RwLock<Vec<Product>>>,
}

impl InMemoryProductStore {
    /// Creates a new empty in-memory product store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory product store wrapped in an Arc.
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl ProductStore for InMemoryProductStore {
    fn insert(&self, product: Product) -> Result<(), StoreError> {
        let mut products = self.products.write().map_err(|_| StoreError::LockError)?;
        products.push(product);
        Ok(())
    }

    fn list(&self) -> Result<Vec<Product>, StoreError> {
        let products = self.products.read().map_err(|_| StoreError::LockError)?;
        let mut result = products.clone();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    fn count(&self) -> Result<usize, StoreError> {
        let products = self.products.read().map_err(|_| StoreError::LockError)?;
        Ok(products.len())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut products = self.products.write().map_err(|_| StoreError::LockError)?;
        products.clear();
        Ok(())
    }
}

/// `ClickHouse`-backed product store implementation.
#[derive(Clone)]
pub struct ClickHouseProductStore {
    client: Arc<clickhouse::Client>,
}

#[derive(clickhouse::Row, Serialize, Deserialize)]
struct ProductRow {
    id: String,
    name: String,
    price: f64,
    image: String,
    created_at: i64,
}

impl From<&Product> for ProductRow {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            price: product.price,
            image: product.image.clone(),
            created_at: product.created_at.timestamp_nanos_opt().unwrap_or(0),
        }
    }
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            price: row.price,
            image: row.image,
            created_at: DateTime::from_timestamp_nanos(row.created_at),
        }
    }
}

impl ClickHouseProductStore {
    /// Creates a new `ClickHouse` product store with the given client.
    #[must_use]
    pub fn new(client: Arc<clickhouse::Client>) -> Self {
        Self { client }
    }

    /// Creates a new `ClickHouse` product store wrapped in an Arc.
    #[must_use]
    pub fn new_shared(client: Arc<clickhouse::Client>) -> Arc<Self> {
        Arc::new(Self::new(client))
    }

    /// Creates the products table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the DDL statement fails.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.client
            .query(
                "CREATE TABLE IF NOT EXISTS products (
                    id String,
                    name String,
                    price Float64,
                    image String,
                    created_at Int64
                ) ENGINE = MergeTree() ORDER BY created_at",
            )
            .execute()
            .await
            .map_err(|e| StoreError::StorageError(e.to_string()))
    }

    /// Helper to execute async operations synchronously.
    fn block_on<F, T>(future: F) -> Result<T, StoreError>
    where
        F: std::future::Future<Output = Result<T, clickhouse::error::Error>>,
    {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current()
                .block_on(future)
                .map_err(|e| StoreError::StorageError(e.to_string()))
        })
    }
}

impl ProductStore for ClickHouseProductStore {
    fn insert(&self, product: Product) -> Result<(), StoreError> {
        let client = Arc::clone(&self.client);
        Self::block_on(async move {
            let mut inserter = client.insert::<ProductRow>("products").await?;
            inserter.write(&ProductRow::from(&product)).await?;
            inserter.end().await?;
            Ok(())
        })
    }

    fn list(&self) -> Result<Vec<Product>, StoreError> {
        let client = Arc::clone(&self.client);
        let rows: Vec<ProductRow> = Self::block_on(async move {
            client
                .query(
                    "SELECT id, name, price, image, created_at \
                     FROM products ORDER BY created_at DESC",
                )
                .fetch_all::<ProductRow>()
                .await
        })?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    fn count(&self) -> Result<usize, StoreError> {
        let client = Arc::clone(&self.client);
        let count: u64 =
            Self::block_on(async move { client.query("SELECT count() FROM products").fetch_one::<u64>().await })?;
        usize::try_from(count).map_err(|e| StoreError::StorageError(e.to_string()))
    }

    fn clear(&self) -> Result<(), StoreError> {
        let client = Arc::clone(&self.client);
        Self::block_on(async move { client.query("TRUNCATE TABLE products").execute().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_new() {
        let product = Product::new("Desk Lamp", 24.99, "https://img.example/lamp.png");

        assert_eq!(product.name, "Desk Lamp");
        assert_eq!(product.price, 24.99);
        assert!(!product.id.is_empty());
    }

    #[test]
    fn test_product_input_valid() {
        let input = ProductInput {
            name: Some("Desk Lamp".to_string()),
            price: Some(24.99),
            image: Some("https://img.example/lamp.png".to_string()),
        };
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_product_input_missing_price() {
        let input = ProductInput {
            name: Some("Desk Lamp".to_string()),
            price: None,
            image: Some("https://img.example/lamp.png".to_string()),
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_product_input_empty_name() {
        let input = ProductInput {
            name: Some(String::new()),
            price: Some(1.0),
            image: Some("x".to_string()),
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_product_input_negative_price() {
        let input = ProductInput {
            name: Some("Desk Lamp".to_string()),
            price: Some(-1.0),
            image: Some("x".to_string()),
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_in_memory_store_insert_and_list() {
        let store = InMemoryProductStore::new();

        store
            .insert(Product::new("A", 1.0, "a.png"))
            .expect("insert failed");
        store
            .insert(Product::new("B", 2.0, "b.png"))
            .expect("insert failed");

        assert_eq!(store.count().unwrap(), 2);
        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[test]
    fn test_in_memory_store_list_empty() {
        let store = InMemoryProductStore::new();
        assert!(store.list().unwrap().is_empty());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_in_memory_store_clear() {
        let store = InMemoryProductStore::new();
        store.insert(Product::new("A", 1.0, "a.png")).unwrap();
        store.clear().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_product_serialization() {
        let product = Product::new("Desk Lamp", 24.99, "lamp.png");
        let json = serde_json::to_string(&product).unwrap();

        assert!(json.contains("\"name\":\"Desk Lamp\""));
        assert!(json.contains("\"price\":24.99"));
    }
}
