use std::sync::Arc;

use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use serde::Deserialize;

use crate::outbox::{OutboxCoordinator, SubmitError};
use crate::store::OrderStore;

mod auth;

pub use auth::{AuthenticatedUser, USER_ID_HEADER};

// ============================================================================
// Ingestion Boundary - HTTP adapter over the coordinator
// ============================================================================

pub struct ApiState {
    pub coordinator: OutboxCoordinator,
    pub store: Arc<dyn OrderStore>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub product_id: String,
    pub quantity: i32,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/orders", web::post().to(create_order))
        .route("/orders", web::get().to(list_orders));
}

/// Start the ingestion HTTP server.
pub async fn serve(state: ApiState, host: &str, port: u16) -> std::io::Result<()> {
    tracing::info!("🚀 Starting HTTP server on http://{}:{}", host, port);

    let data = web::Data::new(state);
    HttpServer::new(move || App::new().app_data(data.clone()).configure(configure))
        .bind((host, port))?
        .run()
        .await
}

async fn create_order(
    state: web::Data<ApiState>,
    user: AuthenticatedUser,
    body: web::Json<CreateOrderRequest>,
) -> impl Responder {
    match state
        .coordinator
        .submit(&user.0, &body.product_id, body.quantity)
        .await
    {
        Ok(order) => HttpResponse::Created().json(order),
        Err(SubmitError::Validation(err)) => {
            HttpResponse::BadRequest().json(serde_json::json!({ "error": err.to_string() }))
        }
        Err(err) => {
            tracing::error!(error = %err, "Order creation failed");
            HttpResponse::InternalServerError()
                .json(serde_json::json!({ "error": "Failed to create order" }))
        }
    }
}

async fn list_orders(state: web::Data<ApiState>, user: AuthenticatedUser) -> impl Responder {
    match state.store.list_by_owner(&user.0).await {
        Ok(orders) => HttpResponse::Ok().json(orders),
        Err(err) => {
            tracing::error!(error = %err, owner_id = %user.0, "Order listing failed");
            HttpResponse::InternalServerError()
                .json(serde_json::json!({ "error": "Failed to fetch orders" }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::test_support::ScriptedPublisher;
    use crate::metrics::Metrics;
    use crate::models::Order;
    use crate::store::MemoryOrderStore;
    use actix_web::{http::StatusCode, test};

    fn test_state() -> ApiState {
        let store = Arc::new(MemoryOrderStore::new());
        let publisher = Arc::new(ScriptedPublisher::always_ok());
        let coordinator = OutboxCoordinator::new(
            store.clone(),
            publisher,
            Arc::new(Metrics::default()),
        );
        ApiState {
            coordinator,
            store,
        }
    }

    #[actix_web::test]
    async fn create_requires_identity_header() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/orders")
            .set_json(serde_json::json!({ "productId": "prod-1", "quantity": 1 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn create_returns_created_order_owned_by_caller() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(configure),
        )
        .await;

        // A client-supplied ownerId must be ignored in favor of the header
        let req = test::TestRequest::post()
            .uri("/orders")
            .insert_header((USER_ID_HEADER, "alice"))
            .set_json(serde_json::json!({
                "productId": "prod-1",
                "quantity": 2,
                "ownerId": "mallory"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let order: Order = test::read_body_json(resp).await;
        assert_eq!(order.owner_id, "alice");
        assert_eq!(order.product_id, "prod-1");
        assert_eq!(order.quantity, 2);
    }

    #[actix_web::test]
    async fn create_rejects_invalid_quantity() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/orders")
            .insert_header((USER_ID_HEADER, "alice"))
            .set_json(serde_json::json!({ "productId": "prod-1", "quantity": 0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("quantity"));
    }

    #[actix_web::test]
    async fn list_returns_only_callers_orders() {
        let state = web::Data::new(test_state());
        let app = test::init_service(
            App::new().app_data(state.clone()).configure(configure),
        )
        .await;

        for (owner, product) in [("alice", "p1"), ("bob", "p2")] {
            let req = test::TestRequest::post()
                .uri("/orders")
                .insert_header((USER_ID_HEADER, owner))
                .set_json(serde_json::json!({ "productId": product, "quantity": 1 }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::CREATED);
        }

        let req = test::TestRequest::get()
            .uri("/orders")
            .insert_header((USER_ID_HEADER, "alice"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let orders: Vec<Order> = test::read_body_json(resp).await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].owner_id, "alice");
        assert_eq!(orders[0].product_id, "p1");
    }
}
