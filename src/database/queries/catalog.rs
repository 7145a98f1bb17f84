use anyhow::{bail, Result};
use thiserror::Error;

use crate::{
  database::{Category, Product},
  types::{DbConn, ProductDraft},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
  #[error("A category named {name:?} already exists")]
  CategoryExists { name: String },
}

pub async fn list_categories(db: &DbConn) -> Result<Vec<Category>> {
  log::debug!("list_categories");

  let result: Vec<Category> = sqlx::query_as("SELECT * FROM categories ORDER BY name")
    .fetch_all(db)
    .await?;

  log::debug!("list_categories result: {:?}", result);

  Ok(result)
}

pub async fn get_category(db: &DbConn, category_id: i64) -> Result<Option<Category>> {
  let result: Option<Category> =
    sqlx::query_as("SELECT * FROM categories WHERE category_id = $1")
      .bind(category_id)
      .fetch_optional(db)
      .await?;

  Ok(result)
}

pub async fn insert_category(db: &DbConn, name: String) -> Result<i64> {
  log::debug!("insert_category: {:?}", name);

  let existing: Option<i64> =
    sqlx::query_scalar("SELECT category_id FROM categories WHERE name = $1")
      .bind(&name)
      .fetch_optional(db)
      .await?;
  if existing.is_some() {
    return Err(CatalogError::CategoryExists { name }.into());
  }

  let result = sqlx::query_scalar("INSERT INTO categories (name) VALUES ($1) RETURNING category_id")
    .bind(&name)
    .fetch_one(db)
    .await;

  match result {
    Ok(category_id) => Ok(category_id),
    // Lost a race against another insert of the same name
    Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
      Err(CatalogError::CategoryExists { name }.into())
    }
    Err(e) => Err(e.into()),
  }
}

// Products, and any cart lines holding them, go with the category
pub async fn delete_category(db: &DbConn, category_id: i64) -> Result<bool> {
  log::debug!("delete_category: {:?}", category_id);

  let result = sqlx::query("DELETE FROM categories WHERE category_id = $1")
    .bind(category_id)
    .execute(db)
    .await?;

  Ok(result.rows_affected() > 0)
}

pub async fn list_products(db: &DbConn, category_id: i64) -> Result<Vec<Product>> {
  log::debug!("list_products for category_id: {:?}", category_id);

  let result: Vec<Product> =
    sqlx::query_as("SELECT * FROM products WHERE category_id = $1 ORDER BY name")
      .bind(category_id)
      .fetch_all(db)
      .await?;

  log::debug!("list_products result: {:?}", result);

  Ok(result)
}

pub async fn get_product(db: &DbConn, product_id: i64) -> Result<Option<Product>> {
  log::debug!("get_product: {:?}", product_id);

  let result: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE product_id = $1")
    .bind(product_id)
    .fetch_optional(db)
    .await?;

  Ok(result)
}

pub async fn insert_product(db: &DbConn, draft: ProductDraft, description: String) -> Result<i64> {
  log::debug!("insert_product: {:?} ({:?})", draft, description);

  if draft.price < 0 || draft.stock < 0 {
    bail!("Price and stock must not be negative");
  }

  let product_id: i64 = sqlx::query_scalar(
    "INSERT INTO products (category_id, name, description, price, stock) \
      VALUES ($1, $2, $3, $4, $5) RETURNING product_id",
  )
  .bind(draft.category_id)
  .bind(draft.name)
  .bind(description)
  .bind(draft.price)
  .bind(draft.stock)
  .fetch_one(db)
  .await?;

  Ok(product_id)
}

pub async fn update_product_price(db: &DbConn, product_id: i64, price: i64) -> Result<bool> {
  log::debug!("update_product_price: {:?} to {:?}", product_id, price);

  if price < 0 {
    bail!("Price must not be negative");
  }

  let result = sqlx::query("UPDATE products SET price = $1 WHERE product_id = $2")
    .bind(price)
    .bind(product_id)
    .execute(db)
    .await?;

  Ok(result.rows_affected() > 0)
}

// Sets the unreserved stock, reservations held in carts are not affected
pub async fn update_product_stock(db: &DbConn, product_id: i64, stock: i64) -> Result<bool> {
  log::debug!("update_product_stock: {:?} to {:?}", product_id, stock);

  if stock < 0 {
    bail!("Stock must not be negative");
  }

  let result = sqlx::query("UPDATE products SET stock = $1 WHERE product_id = $2")
    .bind(stock)
    .bind(product_id)
    .execute(db)
    .await?;

  Ok(result.rows_affected() > 0)
}

pub async fn delete_product(db: &DbConn, product_id: i64) -> Result<bool> {
  log::debug!("delete_product: {:?}", product_id);

  let result = sqlx::query("DELETE FROM products WHERE product_id = $1")
    .bind(product_id)
    .execute(db)
    .await?;

  Ok(result.rows_affected() > 0)
}

#[cfg(test)]
pub(crate) async fn seed_product(db: &DbConn, price: i64, stock: i64) -> i64 {
  let category_id = match list_categories(db).await.unwrap().first() {
    Some(category) => category.category_id,
    None => insert_category(db, "General".into()).await.unwrap(),
  };

  insert_product(
    db,
    ProductDraft {
      category_id,
      name: format!("Product {}", price),
      price,
      stock,
    },
    String::new(),
  )
  .await
  .unwrap()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::database::test_pool;

  #[tokio::test]
  async fn category_names_are_unique() {
    let db = test_pool().await;

    insert_category(&db, "Keys".into()).await.unwrap();
    let err = insert_category(&db, "Keys".into()).await.unwrap_err();
    assert_eq!(
      err.downcast::<CatalogError>().unwrap(),
      CatalogError::CategoryExists {
        name: "Keys".into()
      }
    );
    assert_eq!(list_categories(&db).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn storage_failures_are_not_duplicates() {
    let db = test_pool().await;
    db.close().await;

    let err = insert_category(&db, "Keys".into()).await.unwrap_err();
    assert!(err.downcast_ref::<CatalogError>().is_none());
  }

  #[tokio::test]
  async fn deleting_category_removes_products() {
    let db = test_pool().await;

    let product_id = seed_product(&db, 100, 5).await;
    let product = get_product(&db, product_id).await.unwrap().unwrap();

    assert!(delete_category(&db, product.category_id).await.unwrap());
    assert!(get_product(&db, product_id).await.unwrap().is_none());
    assert!(!delete_category(&db, product.category_id).await.unwrap());
  }

  #[tokio::test]
  async fn updates_price_and_stock() {
    let db = test_pool().await;

    let product_id = seed_product(&db, 100, 5).await;
    assert!(update_product_price(&db, product_id, 250).await.unwrap());
    assert!(update_product_stock(&db, product_id, 0).await.unwrap());
    assert!(update_product_stock(&db, product_id, -1).await.is_err());

    let product = get_product(&db, product_id).await.unwrap().unwrap();
    assert_eq!(product.price, 250);
    assert_eq!(product.stock, 0);

    assert!(!update_product_price(&db, 404, 1).await.unwrap());
  }
}
