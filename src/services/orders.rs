use crate::{
    db::DbPool,
    entities::order::{self, Entity as OrderEntity, Model as OrderModel, OrderStatus},
    entities::order_item::{self, Entity as OrderItemEntity, Model as OrderItemModel},
    entities::product::{self, Entity as ProductEntity, Model as ProductModel},
    errors::ServiceError,
    services::totals::{compute_total, to_money, validate_money, LineAmount},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

/// One requested line item.
///
/// `price` is optional; when omitted the product's current catalog price is
/// used as the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OrderItemInput {
    pub product_id: i32,
    #[validate(range(min = 1, message = "quantity must be a positive integer"))]
    pub quantity: i32,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "9.99")]
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, max = 255, message = "customer is required"))]
    pub customer: String,
    #[serde(default)]
    pub status: Option<OrderStatus>,
    pub order_items: Vec<OrderItemInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddItemsRequest {
    pub order_items: Vec<OrderItemInput>,
}

/// Field patch for an order. `total` is derived and cannot be patched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateOrderRequest {
    #[validate(length(min = 1, max = 255, message = "customer must not be empty"))]
    pub customer: Option<String>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub id: i32,
    pub order_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    #[schema(value_type = String, example = "9.99")]
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
    pub product: Option<ProductModel>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: i32,
    pub customer: String,
    pub status: OrderStatus,
    #[schema(value_type = String, example = "19.98")]
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_items: Option<Vec<OrderItemResponse>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderTotalResponse {
    #[serde(rename = "orderID")]
    pub order_id: i32,
    #[schema(value_type = String, example = "19.98")]
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteOrderResponse {
    pub message: String,
}

/// A requested line after its price snapshot has been resolved.
#[derive(Debug, Clone, PartialEq)]
struct PricedItem {
    product_id: i32,
    quantity: i32,
    price: Decimal,
}

impl LineAmount for PricedItem {
    fn quantity(&self) -> i32 {
        self.quantity
    }

    fn unit_price(&self) -> Decimal {
        self.price
    }
}

/// Keeps each order's cached `total` equal to the sum of its items.
///
/// Every mutation that changes an order's item set runs inside one
/// transaction and stores a total produced by [`compute_total`].
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Creates an order and its items atomically and returns it with items
    /// and products expanded.
    #[instrument(skip(self, request), fields(customer = %request.customer, items = request.order_items.len()))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        ensure_items(&request.order_items)?;
        request.validate()?;
        if request.customer.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "customer is required".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        // Insert before reading the catalog so the transaction holds the
        // write lock from its first statement.
        let order = order::ActiveModel {
            customer: Set(request.customer.trim().to_string()),
            status: Set(request.status.unwrap_or_default()),
            total: Set(Decimal::ZERO),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to insert order");
            ServiceError::DatabaseError(e)
        })?;

        let priced = price_items(&txn, &request.order_items).await?;
        let total = compute_total(&priced)?;
        insert_items(&txn, order.id, &priced).await?;
        store_total(&txn, order.id, total).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = order.id, "Failed to commit order creation");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = order.id, total = %total, "Order created");

        load_order_with_items(db, order.id).await
    }

    /// Appends items to a pending order and re-derives its total from the
    /// full item set.
    ///
    /// The order row is claimed with an UPDATE before anything is read, so
    /// concurrent appends to the same order serialize on its row lock and
    /// each one sees the items committed by the other.
    #[instrument(skip(self, request), fields(items = request.order_items.len()))]
    pub async fn add_items(
        &self,
        order_id: i32,
        request: AddItemsRequest,
    ) -> Result<OrderResponse, ServiceError> {
        ensure_items(&request.order_items)?;

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, order_id, "Failed to start transaction for adding items");
            ServiceError::DatabaseError(e)
        })?;

        claim_order(&txn, order_id).await?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| order_not_found(order_id))?;
        if order.status != OrderStatus::Pending {
            return Err(ServiceError::Conflict(format!(
                "Order {} is {} and no longer accepts items",
                order_id, order.status
            )));
        }

        let priced = price_items(&txn, &request.order_items).await?;
        insert_items(&txn, order_id, &priced).await?;

        let all_items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;
        let total = compute_total(&all_items)?;

        store_total(&txn, order_id, total).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id, "Failed to commit item addition");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id, item_count = all_items.len(), total = %total, "Items added to order");

        load_order_with_items(db, order_id).await
    }

    /// Retrieves an order with its items and their products.
    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: i32) -> Result<OrderResponse, ServiceError> {
        load_order_with_items(&*self.db_pool, order_id).await
    }

    /// Lists orders without expanding their items.
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<OrderResponse>, ServiceError> {
        let orders = OrderEntity::find()
            .order_by_asc(order::Column::Id)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list orders");
                ServiceError::DatabaseError(e)
            })?;

        Ok(orders.into_iter().map(order_to_response).collect())
    }

    /// Returns the stored total. Every write path keeps it in sync with the
    /// item set, so no recomputation happens here.
    #[instrument(skip(self))]
    pub async fn get_total(&self, order_id: i32) -> Result<OrderTotalResponse, ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| order_not_found(order_id))?;

        Ok(OrderTotalResponse {
            order_id: order.id,
            total: to_money(order.total),
        })
    }

    /// Patches customer and/or status. Status changes must follow
    /// [`OrderStatus::can_transition_to`].
    #[instrument(skip(self, request))]
    pub async fn update_order(
        &self,
        order_id: i32,
        request: UpdateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let txn = db.begin().await?;
        claim_order(&txn, order_id).await?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| order_not_found(order_id))?;

        let current_status = order.status;
        let mut active: order::ActiveModel = order.into();

        if let Some(customer) = request.customer {
            let customer = customer.trim();
            if customer.is_empty() {
                return Err(ServiceError::ValidationError(
                    "customer must not be empty".to_string(),
                ));
            }
            active.customer = Set(customer.to_string());
        }

        if let Some(next) = request.status {
            if !current_status.can_transition_to(next) {
                return Err(ServiceError::InvalidStatus(format!(
                    "Cannot transition order {} from '{}' to '{}'",
                    order_id, current_status, next
                )));
            }
            active.status = Set(next);
        }

        let updated = active.update(&txn).await.map_err(|e| {
            error!(error = %e, order_id, "Failed to update order");
            ServiceError::DatabaseError(e)
        })?;
        txn.commit().await?;

        info!(order_id, status = %updated.status, "Order updated");
        Ok(order_to_response(updated))
    }

    /// Deletes an order together with the items it owns.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: i32) -> Result<DeleteOrderResponse, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await?;
        claim_order(&txn, order_id).await?;

        let removed_items = OrderItemEntity::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        OrderEntity::delete_by_id(order_id).exec(&txn).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id, "Failed to commit order deletion");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_id,
            items_removed = removed_items.rows_affected,
            "Order deleted"
        );
        Ok(DeleteOrderResponse {
            message: "Order deleted successfully".to_string(),
        })
    }
}

fn order_not_found(order_id: i32) -> ServiceError {
    ServiceError::NotFound(format!("Order {} not found", order_id))
}

/// Touches the order row as the transaction's first statement.
///
/// SQLite cannot upgrade a read lock while another writer is active and
/// fails with `SQLITE_BUSY` instead of waiting, so every order transaction
/// writes before it reads. On Postgres the UPDATE takes the row lock that
/// serializes concurrent writers to the same order.
async fn claim_order<C: ConnectionTrait>(conn: &C, order_id: i32) -> Result<(), ServiceError> {
    let claimed = OrderEntity::update_many()
        .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(order::Column::Id.eq(order_id))
        .exec(conn)
        .await?;
    if claimed.rows_affected == 0 {
        warn!(order_id, "Order not found");
        return Err(order_not_found(order_id));
    }
    Ok(())
}

async fn store_total<C: ConnectionTrait>(
    conn: &C,
    order_id: i32,
    total: Decimal,
) -> Result<(), ServiceError> {
    OrderEntity::update_many()
        .col_expr(order::Column::Total, Expr::value(total))
        .filter(order::Column::Id.eq(order_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Rejects an empty item list and any line with a bad quantity or price.
/// Runs before any database access.
fn ensure_items(items: &[OrderItemInput]) -> Result<(), ServiceError> {
    if items.is_empty() {
        return Err(ServiceError::ValidationError(
            "orderItems must be a non-empty array".to_string(),
        ));
    }

    for (index, item) in items.iter().enumerate() {
        item.validate()
            .map_err(|e| ServiceError::ValidationError(format!("orderItems[{index}]: {e}")))?;
        if let Some(price) = item.price {
            validate_money(price, &format!("orderItems[{index}].price"))?;
        }
    }
    Ok(())
}

/// Resolves the price snapshot of each requested line against the catalog.
async fn price_items<C: ConnectionTrait>(
    conn: &C,
    items: &[OrderItemInput],
) -> Result<Vec<PricedItem>, ServiceError> {
    let ids: BTreeSet<i32> = items.iter().map(|item| item.product_id).collect();

    let products: HashMap<i32, ProductModel> = ProductEntity::find()
        .filter(product::Column::Id.is_in(ids.iter().copied()))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let missing: Vec<String> = ids
        .iter()
        .filter(|id| !products.contains_key(id))
        .map(|id| id.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ServiceError::InvalidInput(format!(
            "Invalid product reference(s) in orderItems: {}",
            missing.join(", ")
        )));
    }

    items
        .iter()
        .map(|item| {
            let catalog_price = products
                .get(&item.product_id)
                .map(|p| p.price)
                .ok_or_else(|| {
                    ServiceError::InvalidInput(format!(
                        "Invalid product reference: {}",
                        item.product_id
                    ))
                })?;

            let price = match item.price {
                Some(requested) if requested != catalog_price => {
                    return Err(ServiceError::ValidationError(format!(
                        "price {} for product {} does not match catalog price {}",
                        requested, item.product_id, catalog_price
                    )))
                }
                Some(requested) => requested,
                None => catalog_price,
            };

            Ok(PricedItem {
                product_id: item.product_id,
                quantity: item.quantity,
                price,
            })
        })
        .collect()
}

async fn insert_items<C: ConnectionTrait>(
    conn: &C,
    order_id: i32,
    items: &[PricedItem],
) -> Result<(), ServiceError> {
    for item in items {
        order_item::ActiveModel {
            order_id: Set(order_id),
            product_id: Set(item.product_id),
            quantity: Set(item.quantity),
            price: Set(item.price),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(|e| {
            error!(error = %e, order_id, product_id = item.product_id, "Failed to insert order item");
            ServiceError::from_item_write(e)
        })?;
    }
    Ok(())
}

async fn load_order_with_items<C: ConnectionTrait>(
    conn: &C,
    order_id: i32,
) -> Result<OrderResponse, ServiceError> {
    let order = OrderEntity::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or_else(|| order_not_found(order_id))?;

    let items = OrderItemEntity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_item::Column::Id)
        .find_also_related(ProductEntity)
        .all(conn)
        .await?;

    let mut response = order_to_response(order);
    response.order_items = Some(
        items
            .into_iter()
            .map(|(item, product)| item_to_response(item, product))
            .collect(),
    );
    Ok(response)
}

fn order_to_response(model: OrderModel) -> OrderResponse {
    OrderResponse {
        id: model.id,
        customer: model.customer,
        status: model.status,
        total: to_money(model.total),
        created_at: model.created_at,
        updated_at: model.updated_at,
        order_items: None,
    }
}

fn item_to_response(item: OrderItemModel, product: Option<ProductModel>) -> OrderItemResponse {
    OrderItemResponse {
        id: item.id,
        order_id: item.order_id,
        product_id: item.product_id,
        quantity: item.quantity,
        price: to_money(item.price),
        created_at: item.created_at,
        product: product.map(|mut p| {
            p.price = to_money(p.price);
            p
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use sea_orm::DatabaseConnection;

    fn item(product_id: i32, quantity: i32, price: Option<Decimal>) -> OrderItemInput {
        OrderItemInput {
            product_id,
            quantity,
            price,
        }
    }

    #[test]
    fn empty_item_list_is_rejected() {
        assert_matches!(ensure_items(&[]), Err(ServiceError::ValidationError(msg)) if msg.contains("non-empty"));
    }

    #[test]
    fn bad_lines_are_rejected_before_touching_the_database() {
        assert_matches!(
            ensure_items(&[item(1, 0, None)]),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            ensure_items(&[item(1, 1, Some(dec!(-2.00)))]),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            ensure_items(&[item(1, 1, Some(dec!(2.001)))]),
            Err(ServiceError::ValidationError(_))
        );
        assert!(ensure_items(&[item(1, 3, Some(dec!(2.50))), item(2, 1, None)]).is_ok());
    }

    #[tokio::test]
    async fn create_with_no_items_fails_without_a_connection() {
        let service = OrderService::new(Arc::new(DatabaseConnection::Disconnected));
        let result = service
            .create_order(CreateOrderRequest {
                customer: "Ada".into(),
                status: None,
                order_items: vec![],
            })
            .await;
        assert_matches!(result, Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn order_response_uses_wire_names() {
        let now = Utc::now();
        let response = order_to_response(OrderModel {
            id: 4,
            customer: "Ada".into(),
            status: OrderStatus::Pending,
            total: dec!(19.98),
            created_at: now,
            updated_at: now,
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["total"], "19.98");
        assert_eq!(json["status"], "pending");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("orderItems").is_none());

        let total = serde_json::to_value(OrderTotalResponse {
            order_id: 4,
            total: dec!(19.98),
        })
        .unwrap();
        assert_eq!(total["orderID"], 4);
    }

    #[test]
    fn update_patch_rejects_total() {
        let parsed: Result<UpdateOrderRequest, _> =
            serde_json::from_value(serde_json::json!({ "customer": "Bo", "total": "0.00" }));
        assert!(parsed.is_err());
    }

    #[test]
    fn item_input_accepts_numeric_and_string_prices() {
        let from_number: OrderItemInput =
            serde_json::from_value(serde_json::json!({"productId": 1, "quantity": 2, "price": 9.99}))
                .unwrap();
        let from_string: OrderItemInput = serde_json::from_value(
            serde_json::json!({"productId": 1, "quantity": 2, "price": "9.99"}),
        )
        .unwrap();
        assert_eq!(from_number.price, Some(dec!(9.99)));
        assert_eq!(from_string.price, Some(dec!(9.99)));
    }
}
