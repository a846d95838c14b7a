use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use catalog_core::VariantId;
use catalog_infra::{CallContext, GetVariant};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_variants).post(create_variant))
        .route("/lookup", get(lookup_variant))
        .route("/stock", put(bulk_set_stock))
        .route("/:id", get(get_variant).put(update_variant).delete(delete_variant))
        .route("/:id/stock", post(manage_stock).get(get_available_stock))
}

fn parse_id(raw: &str) -> Result<VariantId, axum::response::Response> {
    raw.parse().map_err(errors::domain_error_to_response)
}

pub async fn create_variant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallContext>,
    body: Result<Json<dto::VariantRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::rejection_to_response(e),
    };

    match services.variants.create_variant(&ctx, body.into()).await {
        Ok(v) => (StatusCode::CREATED, Json(dto::VariantResponse::from(v))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_variant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::VariantRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::rejection_to_response(e),
    };

    match services.variants.update_variant(&ctx, id, body.into()).await {
        Ok(v) => (StatusCode::OK, Json(dto::VariantResponse::from(v))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_variant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallContext>,
    Path(id): Path<String>,
    query: Result<Query<dto::ScopeQuery>, QueryRejection>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Query(scope) = match query {
        Ok(q) => q,
        Err(e) => return errors::rejection_to_response(e),
    };

    let mut req = GetVariant::by_id(id);
    req.unscoped = scope.unscoped.unwrap_or(false);

    match services.variants.get_variant(&ctx, &req).await {
        Ok(v) => (StatusCode::OK, Json(dto::VariantResponse::from(v))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Lookup by `id`, else `sku`, else `barcode`.
pub async fn lookup_variant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallContext>,
    query: Result<Query<dto::LookupQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::rejection_to_response(e),
    };
    let req = match query.into_request() {
        Ok(r) => r,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.variants.get_variant(&ctx, &req).await {
        Ok(v) => (StatusCode::OK, Json(dto::VariantResponse::from(v))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_variants(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallContext>,
    query: Result<Query<dto::ListQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::rejection_to_response(e),
    };

    let filter = query.filter();
    let page = query.page();
    match services.variants.list_variants(&ctx, &filter, page).await {
        Ok(result) => (StatusCode::OK, Json(dto::VariantListResponse::new(result, page))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_variant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallContext>,
    Path(id): Path<String>,
    query: Result<Query<dto::ScopeQuery>, QueryRejection>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Query(scope) = match query {
        Ok(q) => q,
        Err(e) => return errors::rejection_to_response(e),
    };

    match services
        .variants
        .delete_variant(&ctx, id, scope.unscoped.unwrap_or(false))
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn manage_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::ManageStockRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::rejection_to_response(e),
    };

    match services
        .variants
        .manage_stock(&ctx, id, &body.action, body.quantity)
        .await
    {
        Ok(v) => (StatusCode::OK, Json(dto::StockResponse::from(&v))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_available_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.variants.available_stock(&ctx, id).await {
        Ok(available) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": id,
                "available_stock": available,
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn bulk_set_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CallContext>,
    body: Result<Json<dto::BulkStockRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::rejection_to_response(e),
    };
    let stocks = match body.into_map() {
        Ok(m) => m,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.variants.bulk_set_stock(&ctx, &stocks).await {
        Ok(updated) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "variants": updated.iter().map(dto::StockResponse::from).collect::<Vec<_>>(),
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
