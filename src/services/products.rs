use crate::{
    db::DbPool,
    entities::product::{self, Entity as ProductEntity, Model as ProductModel},
    errors::ServiceError,
    services::totals::{to_money, validate_money},
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Sort keys understood by the catalog listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ProductSort {
    Price,
    Name,
    Category,
}

/// Query string of `GET /products`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductListQuery {
    /// `price`, `name` or `category`. Any other non-empty value leaves the
    /// listing in id order.
    pub sort: Option<String>,
    /// Exact category match. Ignored when `sort` is present.
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255, message = "name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[schema(value_type = String, example = "19.99")]
    pub price: Decimal,
    #[serde(default)]
    #[validate(length(max = 2048))]
    pub image_url: String,
    #[validate(length(min = 1, max = 255, message = "category is required"))]
    pub category: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>, example = "19.99")]
    pub price: Option<Decimal>,
    #[validate(length(max = 2048))]
    pub image_url: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub category: Option<String>,
}

/// CRUD over the product catalog plus the sorted/filtered listing.
#[derive(Clone)]
pub struct ProductCatalogService {
    db_pool: Arc<DbPool>,
}

impl ProductCatalogService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        query: ProductListQuery,
    ) -> Result<Vec<ProductModel>, ServiceError> {
        let products = ProductEntity::find()
            .order_by_asc(product::Column::Id)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list products");
                ServiceError::DatabaseError(e)
            })?;

        Ok(apply_listing(products, &query)
            .into_iter()
            .map(present)
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: i32) -> Result<ProductModel, ServiceError> {
        ProductEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .map(present)
            .ok_or_else(|| product_not_found(id))
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<ProductModel, ServiceError> {
        request.validate()?;
        validate_money(request.price, "price")?;

        let created = product::ActiveModel {
            name: Set(request.name.trim().to_string()),
            description: Set(request.description),
            price: Set(request.price),
            image_url: Set(request.image_url),
            category: Set(request.category.trim().to_string()),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create product");
            ServiceError::DatabaseError(e)
        })?;

        info!(product_id = created.id, "Product created");
        Ok(present(created))
    }

    #[instrument(skip(self, request))]
    pub async fn update_product(
        &self,
        id: i32,
        request: UpdateProductRequest,
    ) -> Result<ProductModel, ServiceError> {
        request.validate()?;
        if let Some(price) = request.price {
            validate_money(price, "price")?;
        }

        let existing = ProductEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| product_not_found(id))?;

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(description) = request.description {
            active.description = Set(description);
        }
        if let Some(price) = request.price {
            active.price = Set(price);
        }
        if let Some(image_url) = request.image_url {
            active.image_url = Set(image_url);
        }
        if let Some(category) = request.category {
            active.category = Set(category.trim().to_string());
        }

        let updated = active.update(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, product_id = id, "Failed to update product");
            ServiceError::DatabaseError(e)
        })?;

        info!(product_id = id, "Product updated");
        Ok(present(updated))
    }

    /// Deletes a product. A product still referenced by order items is a
    /// conflict, since items keep a foreign key to it.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: i32) -> Result<(), ServiceError> {
        let result = ProductEntity::delete_by_id(id)
            .exec(&*self.db_pool)
            .await
            .map_err(|e| {
                warn!(error = %e, product_id = id, "Failed to delete product");
                ServiceError::from_referenced_delete(e, &format!("Product {id}"))
            })?;

        if result.rows_affected == 0 {
            return Err(product_not_found(id));
        }

        info!(product_id = id, "Product deleted");
        Ok(())
    }
}

fn product_not_found(id: i32) -> ServiceError {
    ServiceError::NotFound(format!("Product {} not found", id))
}

fn present(mut model: ProductModel) -> ProductModel {
    model.price = to_money(model.price);
    model
}

/// Applies the listing rules to `products` (given in id order).
///
/// A non-empty `sort` wins and `category` is then ignored. Unknown sort keys
/// keep the input order. Sorting is stable, so equal keys stay in id order.
pub fn apply_listing(mut products: Vec<ProductModel>, query: &ProductListQuery) -> Vec<ProductModel> {
    let sort = query.sort.as_deref().map(str::trim).filter(|s| !s.is_empty());

    if let Some(sort) = sort {
        match ProductSort::from_str(sort) {
            Ok(key) => products.sort_by(|a, b| compare_by(key, a, b)),
            Err(_) => warn!(sort, "Unrecognized product sort key; returning unsorted"),
        }
        return products;
    }

    match query.category.as_deref().filter(|c| !c.is_empty()) {
        Some(category) => products
            .into_iter()
            .filter(|p| p.category == category)
            .collect(),
        None => products,
    }
}

fn compare_by(key: ProductSort, a: &ProductModel, b: &ProductModel) -> Ordering {
    match key {
        ProductSort::Price => a.price.cmp(&b.price),
        ProductSort::Name => compare_text(&a.name, &b.name),
        ProductSort::Category => compare_text(&a.category, &b.category),
    }
}

/// Case-insensitive ordering with the raw text as tie-break, so the result
/// is a total order.
fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn product(id: i32, name: &str, price: Decimal, category: &str) -> ProductModel {
        let now = Utc::now();
        ProductModel {
            id,
            name: name.to_string(),
            description: String::new(),
            price,
            image_url: String::new(),
            category: category.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn catalog() -> Vec<ProductModel> {
        vec![
            product(1, "banana", dec!(0.50), "food"),
            product(2, "Apple", dec!(1.25), "food"),
            product(3, "hoodie", dec!(45.00), "apparel"),
            product(4, "apple juice", dec!(0.50), "beverages"),
        ]
    }

    fn ids(products: &[ProductModel]) -> Vec<i32> {
        products.iter().map(|p| p.id).collect()
    }

    fn query(sort: Option<&str>, category: Option<&str>) -> ProductListQuery {
        ProductListQuery {
            sort: sort.map(str::to_string),
            category: category.map(str::to_string),
        }
    }

    #[rstest]
    #[case(Some("price"), None, vec![1, 4, 2, 3])]
    #[case(Some("name"), None, vec![2, 4, 1, 3])]
    #[case(Some("category"), None, vec![3, 4, 1, 2])]
    #[case(Some("popularity"), None, vec![1, 2, 3, 4])]
    #[case(None, Some("food"), vec![1, 2])]
    #[case(Some("price"), Some("apparel"), vec![1, 4, 2, 3])]
    #[case(Some(""), Some("apparel"), vec![3])]
    #[case(None, Some("Food"), vec![])]
    #[case(None, None, vec![1, 2, 3, 4])]
    fn listing_rules(
        #[case] sort: Option<&str>,
        #[case] category: Option<&str>,
        #[case] expected: Vec<i32>,
    ) {
        let listed = apply_listing(catalog(), &query(sort, category));
        assert_eq!(ids(&listed), expected);
    }

    #[test]
    fn sort_keys_parse_from_lowercase() {
        assert_eq!(ProductSort::from_str("price").unwrap(), ProductSort::Price);
        assert!(ProductSort::from_str("rating").is_err());
    }
}
