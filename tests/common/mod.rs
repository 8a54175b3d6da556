// Common test utilities and helper structs
// Shared across all test files to avoid duplication
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, Response, StatusCode},
    Router,
};
use loyalty_backend::{
    in_memory_router,
    models::{MerchantCustomer, MerchantType, Program, Reward},
    services::catalog::{
        CreateCustomerRequest, CreateMerchantRequest, CreateProgramRequest, CreateRewardRequest,
    },
    AppState, ServiceSettings,
};
use serde::Serialize;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "hunter22";

pub fn unique_phone() -> String {
    format!("+1{}", Uuid::new_v4().as_u128() % 10_000_000_000)
}

pub fn unique_email(prefix: &str) -> String {
    format!("{}{}@example.com", prefix, Uuid::new_v4().simple())
}

/// Test application wrapper over the full router and in-memory stores
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
}

/// Cookies and headers a logged-in client replays
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub user_id: Uuid,
    pub token: String,
    pub csrf: String,
}

/// Merchant, customer and program wired together
#[derive(Debug, Clone)]
pub struct Seed {
    pub owner_id: Uuid,
    pub customer: MerchantCustomer,
    pub program: Program,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_settings(ServiceSettings::for_tests())
    }

    pub fn with_settings(settings: ServiceSettings) -> Self {
        let (app, state) = in_memory_router(settings);
        Self { app, state }
    }

    pub fn get(&self, uri: &str) -> TestRequest {
        TestRequest::new(self, "GET", uri)
    }

    pub fn post(&self, uri: &str) -> TestRequest {
        TestRequest::new(self, "POST", uri)
    }

    pub fn put(&self, uri: &str) -> TestRequest {
        TestRequest::new(self, "PUT", uri)
    }

    /// Register through the API and return (user id, csrf token from the response)
    pub async fn register(&self, email: &str, password: &str) -> (Uuid, String) {
        let response = self
            .post("/api/auth/register")
            .json(&json!({
                "email": email,
                "password": password,
                "name": "A",
                "phone": unique_phone()
            }))
            .send()
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let csrf = response.cookie("csrf_token").expect("csrf cookie");
        let body: Value = response.json().await;
        let user_id = Uuid::parse_str(body["data"]["user_id"].as_str().unwrap()).unwrap();
        (user_id, csrf)
    }

    /// The OTP most recently issued to the user
    pub async fn latest_otp(&self, user_id: Uuid) -> String {
        self.state
            .stores
            .credentials
            .latest_verification(user_id)
            .await
            .unwrap()
            .expect("verification issued")
            .otp
    }

    pub async fn verify(&self, email: &str, otp: &str, csrf: &str) -> TestResponse {
        self.post("/api/auth/verify")
            .csrf(csrf)
            .json(&json!({ "email": email, "otp": otp }))
            .send()
            .await
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.post("/api/auth/login")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
    }

    /// Register, verify and log in a user
    pub async fn signed_in_user(&self, email: &str) -> ClientSession {
        let (user_id, csrf) = self.register(email, PASSWORD).await;
        let otp = self.latest_otp(user_id).await;
        assert_eq!(self.verify(email, &otp, &csrf).await.status(), StatusCode::OK);

        let response = self.login(email, PASSWORD).await;
        assert_eq!(response.status(), StatusCode::OK);
        ClientSession {
            user_id,
            token: response.cookie("session_token").expect("session cookie"),
            csrf: response.header("x-csrf-token").expect("csrf header"),
        }
    }

    /// Merchant owned by `owner_id`, one customer and one program
    pub async fn seed(&self, owner_id: Uuid) -> Seed {
        let catalog = &self.state.catalog_service;
        let merchant = catalog
            .create_merchant(CreateMerchantRequest {
                user_id: owner_id,
                name: format!("Shop {}", Uuid::new_v4().simple()),
                merchant_type: MerchantType::Ecommerce,
            })
            .await
            .unwrap();
        let customer = catalog
            .create_customer(CreateCustomerRequest {
                merchant_id: merchant.id,
                email: format!("c{}@shop.io", Uuid::new_v4().simple()),
                phone: unique_phone(),
                password: "customer-pass".to_string(),
                name: "Cust".to_string(),
            })
            .await
            .unwrap();
        let program = catalog
            .create_program(CreateProgramRequest {
                merchant_id: merchant.id,
                user_id: owner_id,
                program_name: "Stars".to_string(),
                point_currency_name: "star".to_string(),
            })
            .await
            .unwrap();

        Seed {
            owner_id,
            customer,
            program,
        }
    }

    pub async fn reward(&self, program_id: Uuid, points_required: i64, stock: Option<i32>) -> Reward {
        self.state
            .catalog_service
            .create_reward(CreateRewardRequest {
                program_id,
                name: "Coffee".to_string(),
                description: String::new(),
                points_required,
                stock,
                is_active: true,
            })
            .await
            .unwrap()
    }

    /// POST /api/transactions for the seeded pair
    pub async fn transact(
        &self,
        session: &ClientSession,
        seed: &Seed,
        kind: &str,
        amount: f64,
    ) -> TestResponse {
        self.post("/api/transactions")
            .session(session)
            .json(&json!({
                "merchant_customers_id": seed.customer.id,
                "program_id": seed.program.id,
                "transaction_type": kind,
                "transaction_amount": amount
            }))
            .send()
            .await
    }

    pub async fn balance(&self, session: &ClientSession, seed: &Seed) -> i64 {
        let response = self
            .get(&format!(
                "/api/points/{}/{}/balance",
                seed.customer.id, seed.program.id
            ))
            .session(session)
            .send()
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await;
        body["data"]["balance"].as_i64().unwrap()
    }

    pub async fn ledger(&self, session: &ClientSession, seed: &Seed) -> Vec<Value> {
        let response = self
            .get(&format!(
                "/api/points/{}/{}/ledger",
                seed.customer.id, seed.program.id
            ))
            .session(session)
            .send()
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await;
        body["data"].as_array().cloned().unwrap_or_default()
    }
}

/// Test request builder
pub struct TestRequest<'a> {
    app: &'a TestApp,
    method: &'static str,
    uri: String,
    headers: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl<'a> TestRequest<'a> {
    fn new(app: &'a TestApp, method: &'static str, uri: &str) -> Self {
        Self {
            app,
            method,
            uri: uri.to_string(),
            headers: Vec::new(),
            cookies: Vec::new(),
            body: None,
        }
    }

    /// Add JSON body to request
    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        self.body = Some(serde_json::to_vec(body).unwrap());
        self.header("content-type", "application/json")
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push((name.to_string(), value.to_string()));
        self
    }

    /// Matching CSRF cookie and header
    pub fn csrf(self, token: &str) -> Self {
        self.cookie("csrf_token", token).header("x-csrf-token", token)
    }

    /// Everything a browser holding the session would send
    pub fn session(self, session: &ClientSession) -> Self {
        self.cookie("session_token", &session.token)
            .cookie("user_id", &session.user_id.to_string())
            .csrf(&session.csrf)
    }

    /// Send the request
    pub async fn send(self) -> TestResponse {
        let mut builder = Request::builder().method(self.method).uri(&self.uri);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !self.cookies.is_empty() {
            let cookie_header = self
                .cookies
                .iter()
                .map(|(n, v)| format!("{}={}", n, v))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(header::COOKIE, cookie_header);
        }

        let body = self.body.map(Body::from).unwrap_or_else(Body::empty);
        let request = builder.body(body).unwrap();

        let response = self.app.app.clone().oneshot(request).await.unwrap();
        TestResponse { response }
    }
}

/// Test response wrapper
pub struct TestResponse {
    response: Response<Body>,
}

impl TestResponse {
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    }

    /// Raw Set-Cookie line for `name`, the last one wins
    pub fn set_cookie_line(&self, name: &str) -> Option<String> {
        let prefix = format!("{}=", name);
        self.response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter(|v| v.starts_with(&prefix))
            .last()
            .map(String::from)
    }

    /// Value of a cookie set by the response
    pub fn cookie(&self, name: &str) -> Option<String> {
        let line = self.set_cookie_line(name)?;
        let value = line[name.len() + 1..].split(';').next()?.trim().to_string();
        Some(value)
    }

    /// Parse JSON response
    pub async fn json<T: serde::de::DeserializeOwned>(self) -> T {
        let body = axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    /// Get response body as text
    pub async fn text(self) -> String {
        let body = axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }
}
