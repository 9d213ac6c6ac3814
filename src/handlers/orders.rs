use crate::handlers::common::{created_response, json_body, path_param, success_response};
use crate::{
    errors::{ErrorResponse, ServiceError},
    services::orders::{
        AddItemsRequest, CreateOrderRequest, DeleteOrderResponse, OrderResponse,
        OrderTotalResponse, UpdateOrderRequest,
    },
    AppState,
};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

/// Creates the router for order endpoints
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route(
            "/:id",
            get(get_order).put(update_order).delete(delete_order),
        )
        .route("/:id/total", get(get_order_total))
        .route("/:id/items", post(add_order_items))
}

/// List all orders (items are not expanded)
#[utoipa::path(
    get,
    path = "/orders",
    responses(
        (status = 200, description = "Orders", body = [OrderResponse]),
        (status = 500, description = "Server error", body = ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn list_orders(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.orders.list_orders().await?;
    Ok(success_response(orders))
}

/// Fetch one order with its items and their products
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order", body = OrderResponse),
        (status = 404, description = "Order not found", body = ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = path_param(id)?;
    let order = state.services.orders.get_order(id).await?;
    Ok(success_response(order))
}

/// Create an order with its items; the total is computed server-side
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = OrderResponse),
        (status = 400, description = "Empty or malformed orderItems, or unknown product", body = ErrorResponse),
        (status = 500, description = "Server error", body = ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let request = json_body(payload)?;
    let order = state.services.orders.create_order(request).await?;
    Ok(created_response(order))
}

/// Patch customer and/or status. `total` is not accepted.
#[utoipa::path(
    put,
    path = "/orders/{id}",
    params(("id" = i32, Path, description = "Order id")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = OrderResponse),
        (status = 400, description = "Invalid patch or status transition", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<UpdateOrderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = path_param(id)?;
    let request = json_body(payload)?;
    let order = state.services.orders.update_order(id, request).await?;
    Ok(success_response(order))
}

/// Delete an order and its items
#[utoipa::path(
    delete,
    path = "/orders/{id}",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order deleted", body = DeleteOrderResponse),
        (status = 404, description = "Order not found", body = ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = path_param(id)?;
    let message = state.services.orders.delete_order(id).await?;
    Ok(success_response(message))
}

/// Stored total of an order
#[utoipa::path(
    get,
    path = "/orders/{id}/total",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order total", body = OrderTotalResponse),
        (status = 404, description = "Order not found", body = ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order_total(
    State(state): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = path_param(id)?;
    let total = state.services.orders.get_total(id).await?;
    Ok(success_response(total))
}

/// Append items to a pending order and recompute its total
#[utoipa::path(
    post,
    path = "/orders/{id}/items",
    params(("id" = i32, Path, description = "Order id")),
    request_body = AddItemsRequest,
    responses(
        (status = 200, description = "Updated order", body = OrderResponse),
        (status = 400, description = "Empty or malformed orderItems, or unknown product", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse),
        (status = 409, description = "Order no longer accepts items", body = ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn add_order_items(
    State(state): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<AddItemsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = path_param(id)?;
    let request = json_body(payload)?;
    let order = state.services.orders.add_items(id, request).await?;
    Ok(success_response(order))
}
