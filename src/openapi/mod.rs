use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Student Store API",
        version = "0.1.0",
        description = r#"
# Student Store API

Product catalog and order management for the student storefront.

## Money

Prices and totals are decimal strings with two fractional digits
(for example `"19.98"`). Requests may send prices as strings or numbers.
An order's `total` is always computed by the server from its items.

## Errors

Failures use a single JSON shape:

```json
{
  "error": "Bad Request",
  "message": "Validation error: orderItems must be a non-empty array",
  "request_id": "7f0c...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development")
    ),
    tags(
        (name = "Products", description = "Product catalog endpoints"),
        (name = "Orders", description = "Order and line item endpoints"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::create_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::delete_order,
        crate::handlers::orders::get_order_total,
        crate::handlers::orders::add_order_items,
        crate::health_check,
    ),
    components(
        schemas(
            crate::entities::product::Model,
            crate::entities::order::OrderStatus,
            crate::services::products::CreateProductRequest,
            crate::services::products::UpdateProductRequest,
            crate::services::orders::OrderItemInput,
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::AddItemsRequest,
            crate::services::orders::UpdateOrderRequest,
            crate::services::orders::OrderItemResponse,
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderTotalResponse,
            crate::services::orders::DeleteOrderResponse,
            crate::HealthResponse,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
