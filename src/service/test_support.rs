// Services wired over the in-memory store, for unit tests.
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use chrono::Duration;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    config::Config,
    db::{memory::MemoryStore, store::MarketStore},
    routes::create_router,
    service::{
        finalization::FinalizationService,
        listing_service::ListingService,
        notification_service::{testing::RecordingNotifier, Notifier},
        offer_ledger::OfferLedger,
    },
    utils::token,
    AppState,
};

const TOKEN_MINUTES: i64 = 60;

pub struct TestMarket {
    pub store: MemoryStore,
    pub notifier: Arc<RecordingNotifier>,
    pub finalization: Arc<FinalizationService>,
    pub ledger: OfferLedger,
    pub listings: ListingService,
}

impl TestMarket {
    pub fn new() -> Self {
        Self::with_notifier(RecordingNotifier::default())
    }

    pub fn with_failing_notifier() -> Self {
        Self::with_notifier(RecordingNotifier::failing())
    }

    fn with_notifier(notifier: RecordingNotifier) -> Self {
        let store = MemoryStore::new();
        let notifier = Arc::new(notifier);

        let shared: Arc<dyn MarketStore> = Arc::new(store.clone());
        let finalization = Arc::new(FinalizationService::new(
            shared.clone(),
            notifier.clone() as Arc<dyn Notifier>,
        ));
        let ledger = OfferLedger::new(shared.clone(), finalization.clone());
        let listings = ListingService::new(shared, Duration::days(7));

        Self {
            store,
            notifier,
            finalization,
            ledger,
            listings,
        }
    }

    pub fn app_state(&self) -> Arc<AppState> {
        Arc::new(AppState {
            env: Config::for_tests(),
            offer_ledger: self.ledger.clone(),
            finalization: self.finalization.clone(),
            listing_service: self.listings.clone(),
        })
    }

    /// Sends one request through the full router, authenticated as `caller`.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        caller: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let state = self.app_state();
        let mut request = Request::builder().method(method).uri(uri);

        if let Some(caller) = caller {
            let token = token::create_token(
                &caller.to_string(),
                state.env.jwt_secret.as_bytes(),
                TOKEN_MINUTES,
            )
            .unwrap();
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = create_router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }
}
