use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::types::DbConn;

use super::{Category, Product};

pub type CatalogExport = Vec<ExportCategory>;

#[derive(Deserialize, Serialize, Debug, PartialEq)]
pub struct ExportCategory {
  pub name: String,
  pub products: Vec<ExportProduct>,
}

#[derive(Deserialize, Serialize, Debug, PartialEq)]
pub struct ExportProduct {
  pub name: String,
  #[serde(default)]
  pub description: String,
  pub price: i64,
  #[serde(default)]
  pub stock: i64,
}

#[derive(Debug, Default, PartialEq)]
pub struct ImportSummary {
  pub categories: usize,
  pub products: usize,
}

pub async fn export_catalog(db: &DbConn) -> Result<Vec<u8>> {
  log::debug!("Exporting catalog");

  let categories: Vec<Category> = sqlx::query_as("SELECT * FROM categories ORDER BY name")
    .fetch_all(db)
    .await?;
  let products: Vec<Product> = sqlx::query_as("SELECT * FROM products ORDER BY name")
    .fetch_all(db)
    .await?;

  let export: CatalogExport = categories
    .into_iter()
    .map(|category| ExportCategory {
      products: products
        .iter()
        .filter(|product| product.category_id == category.category_id)
        .map(|product| ExportProduct {
          name: product.name.clone(),
          description: product.description.clone(),
          price: product.price,
          stock: product.stock,
        })
        .collect(),
      name: category.name,
    })
    .collect();

  log::debug!("Exported {} categories", export.len());

  Ok(serde_json::to_vec_pretty(&export)?)
}

/// Merges an exported catalog into the database. Categories are matched by
/// name, products are always added.
pub async fn import_catalog(db: &DbConn, file: Vec<u8>) -> Result<ImportSummary> {
  let import: CatalogExport = serde_json::from_slice(&file)?;

  for category in &import {
    if category.name.trim().is_empty() {
      bail!("Category without a name");
    }
    for product in &category.products {
      if product.price < 0 || product.stock < 0 {
        bail!("Product {:?} has a negative price or stock", product.name);
      }
    }
  }

  let mut transaction = db.begin().await?;
  let mut summary = ImportSummary::default();

  for category in import {
    let category_id: i64 = sqlx::query_scalar(
      "INSERT INTO categories (name) VALUES ($1) \
        ON CONFLICT (name) DO UPDATE SET name = excluded.name \
        RETURNING category_id",
    )
    .bind(category.name.trim())
    .fetch_one(transaction.as_mut())
    .await?;
    summary.categories += 1;

    for product in category.products {
      sqlx::query(
        "INSERT INTO products (category_id, name, description, price, stock) \
          VALUES ($1, $2, $3, $4, $5)",
      )
      .bind(category_id)
      .bind(product.name)
      .bind(product.description)
      .bind(product.price)
      .bind(product.stock)
      .execute(transaction.as_mut())
      .await?;
      summary.products += 1;
    }
  }

  transaction.commit().await?;

  log::info!(
    "Imported {} categories and {} products",
    summary.categories,
    summary.products
  );

  Ok(summary)
}
