use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;

use quotebook::config::AppConfig;
use quotebook::db::{self, queries};
use quotebook::models::{BookingRequestStatus, Business, User};
use quotebook::routes;
use quotebook::services::email::EmailProvider;
use quotebook::state::AppState;

// ── Mock Providers ──

#[derive(Debug, Clone)]
struct SentEmail {
    to: String,
    subject: String,
    html: String,
}

type Outbox = Arc<Mutex<Vec<SentEmail>>>;

struct MockEmail {
    sent: Outbox,
}

#[async_trait]
impl EmailProvider for MockEmail {
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        Ok(())
    }
}

struct FailingEmail;

#[async_trait]
impl EmailProvider for FailingEmail {
    async fn send_email(&self, _to: &str, _subject: &str, _html: &str) -> anyhow::Result<()> {
        anyhow::bail!("relay unavailable")
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        frontend_url: "http://app.test".to_string(),
        public_url: "http://api.test".to_string(),
        jwt_secret: "test-secret".to_string(),
        jwt_expiry_hours: 24,
        smtp_host: "".to_string(),
        smtp_port: 587,
        smtp_username: "".to_string(),
        smtp_password: "".to_string(),
        mail_from: "noreply@test".to_string(),
        mail_from_name: "Quotebook".to_string(),
        cors_origins: vec!["http://app.test".to_string()],
    }
}

fn test_state_with_outbox() -> (Arc<AppState>, Outbox) {
    let conn = db::init_db(":memory:").unwrap();
    let sent: Outbox = Arc::new(Mutex::new(vec![]));
    let email = Arc::new(MockEmail {
        sent: Arc::clone(&sent),
    });
    (Arc::new(AppState::new(conn, test_config(), email)), sent)
}

fn test_app(state: Arc<AppState>) -> Router {
    routes::router(state)
}

fn seed_user(state: &AppState, id: &str, is_admin: bool) -> String {
    let user = User {
        id: id.to_string(),
        full_name: format!("User {id}"),
        email: format!("{id}@test.com"),
        phone: None,
        verified: true,
        is_admin,
        created_at: Utc::now().naive_utc(),
    };
    let db = state.db.lock().unwrap();
    queries::insert_user(&db, &user).unwrap();
    state.tokens.issue(&user).unwrap()
}

fn seed_business(state: &AppState, id: &str) {
    let db = state.db.lock().unwrap();
    queries::insert_business(
        &db,
        &Business {
            id: id.to_string(),
            name: format!("Salon {id}"),
            email: format!("{id}@salon.test"),
            contact_person: "Pat".to_string(),
            phone: "555-0100".to_string(),
            zip_code: "10001".to_string(),
            created_at: Utc::now().naive_utc(),
        },
    )
    .unwrap();
}

fn request_for(state: &AppState, booking_id: &str, business_id: &str) -> String {
    let db = state.db.lock().unwrap();
    queries::get_requests_for_booking(&db, booking_id)
        .unwrap()
        .into_iter()
        .find(|r| r.business_id == business_id)
        .map(|r| r.id)
        .unwrap()
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

/// The six-digit code from the most recent OTP email to `to`.
fn otp_for(sent: &Outbox, to: &str) -> String {
    let sent = sent.lock().unwrap();
    let email = sent
        .iter()
        .rev()
        .find(|e| e.to == to && e.subject == "Your verification code")
        .expect("no otp email sent");
    let digits: Vec<char> = email.html.chars().collect();
    digits
        .windows(6)
        .enumerate()
        .find(|(i, w)| {
            w.iter().all(|c| c.is_ascii_digit())
                && digits.get(i + 6).map_or(true, |c| !c.is_ascii_digit())
                && (*i == 0 || !digits[i - 1].is_ascii_digit())
        })
        .map(|(_, w)| w.iter().collect())
        .expect("no code in otp email")
}

/// Queued notifications are delivered off the request path.
async fn wait_for_email(sent: &Outbox, to: &str, subject: &str) -> SentEmail {
    for _ in 0..100 {
        if let Some(email) = sent
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.to == to && e.subject == subject)
            .cloned()
        {
            return email;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no '{subject}' email sent to {to}");
}

// ── Health ──

#[tokio::test]
async fn test_health() {
    let (state, _) = test_state_with_outbox();
    let app = test_app(state);

    let (status, json) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

// ── Auth Tests ──

#[tokio::test]
async fn test_signup_and_verify() {
    let (state, sent) = test_state_with_outbox();
    let app = test_app(state);

    let (status, _) = send(
        &app,
        post_json(
            "/api/auth/signup",
            None,
            json!({"fullName": "Ada Lovelace", "email": "Ada@Test.com", "phone": "555-0100"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let code = otp_for(&sent, "ada@test.com");
    let (status, json) = send(
        &app,
        post_json("/api/auth/verify-signup", None, json!({"email": "ada@test.com", "otp": code})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["user"]["fullName"], "Ada Lovelace");
    assert_eq!(json["user"]["email"], "ada@test.com");
    assert_eq!(json["user"]["isAdmin"], false);
    let token = json["token"].as_str().unwrap().to_string();

    let (status, json) = send(&app, get("/api/auth/check-admin", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["isAdmin"], false);

    // the code is single-use
    let (status, _) = send(
        &app,
        post_json("/api/auth/verify-signup", None, json!({"email": "ada@test.com", "otp": code})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // the email is now taken
    let (status, _) = send(
        &app,
        post_json("/api/auth/signup", None, json!({"fullName": "Ada", "email": "ada@test.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signup_requires_name_and_valid_email() {
    let (state, _) = test_state_with_outbox();
    let app = test_app(state);

    let (status, json) = send(&app, post_json("/api/auth/signup", None, json!({"email": "a@test.com"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("fullName"));

    let (status, _) = send(
        &app,
        post_json("/api/auth/signup", None, json!({"fullName": "A", "email": "not-an-email"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verify_with_wrong_code() {
    let (state, sent) = test_state_with_outbox();
    let app = test_app(state);

    send(&app, post_json("/api/auth/signup", None, json!({"fullName": "Bo", "email": "bo@test.com"}))).await;
    let code = otp_for(&sent, "bo@test.com");
    let wrong = if code == "000000" { "000001" } else { "000000" };

    let (status, json) = send(
        &app,
        post_json("/api/auth/verify-signup", None, json!({"email": "bo@test.com", "otp": wrong})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid or expired OTP");
}

#[tokio::test]
async fn test_login_unknown_email() {
    let (state, sent) = test_state_with_outbox();
    let app = test_app(state);

    let (status, _) = send(&app, post_json("/api/auth/login", None, json!({"email": "ghost@test.com"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_login_flow() {
    let (state, sent) = test_state_with_outbox();
    seed_user(&state, "u1", true);
    let app = test_app(state);

    let (status, _) = send(&app, post_json("/api/auth/login", None, json!({"email": "u1@test.com"}))).await;
    assert_eq!(status, StatusCode::OK);

    let code = otp_for(&sent, "u1@test.com");
    let (status, json) = send(
        &app,
        post_json("/api/auth/verify-login", None, json!({"email": "u1@test.com", "otp": code})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["id"], "u1");
    assert_eq!(json["user"]["isAdmin"], true);
}

#[tokio::test]
async fn test_otp_delivery_failure_is_internal_error() {
    let conn = db::init_db(":memory:").unwrap();
    let state = Arc::new(AppState::new(conn, test_config(), Arc::new(FailingEmail)));
    let app = test_app(state);

    let (status, json) = send(
        &app,
        post_json("/api/auth/signup", None, json!({"fullName": "Cy", "email": "cy@test.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "internal server error");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let (state, _) = test_state_with_outbox();
    let token = seed_user(&state, "u1", false);
    let app = test_app(state);

    let (status, _) = send(&app, get("/api/bookings/my-bookings", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, get("/api/bookings/my-bookings", Some("garbage"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, get("/api/admin/stats", Some(&token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(&app, get("/api/bookings/my-bookings", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["bookings"], json!([]));
}

#[tokio::test]
async fn test_revoked_admin_loses_access_immediately() {
    let (state, _) = test_state_with_outbox();
    let token = seed_user(&state, "boss", true);
    let app = test_app(Arc::clone(&state));

    let (status, _) = send(&app, get("/api/admin/stats", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);

    {
        let db = state.db.lock().unwrap();
        assert!(queries::set_admin_by_email(&db, "boss@test.com", false).unwrap());
    }

    let (status, _) = send(&app, get("/api/admin/stats", Some(&token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(&app, get("/api/auth/check-admin", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["isAdmin"], false);
}

#[tokio::test]
async fn test_profile_update() {
    let (state, _) = test_state_with_outbox();
    let token = seed_user(&state, "u1", false);
    let app = test_app(state);

    let req = Request::builder()
        .method("PUT")
        .uri("/api/users/me")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(json!({"fullName": "New Name", "phone": "555-0199"}).to_string()))
        .unwrap();
    let (status, json) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["fullName"], "New Name");

    let (_, json) = send(&app, get("/api/users/me", Some(&token))).await;
    assert_eq!(json["phone"], "555-0199");
    assert_eq!(json["email"], "u1@test.com");
}

// ── Booking Flow Tests ──

#[tokio::test]
async fn test_booking_broadcast_quote_and_confirm() {
    let (state, sent) = test_state_with_outbox();
    let customer = seed_user(&state, "u1", false);
    let business_user = seed_user(&state, "owner", false);
    seed_business(&state, "b1");
    seed_business(&state, "b2");
    let app = test_app(state.clone());

    let (status, json) = send(
        &app,
        post_json(
            "/api/bookings",
            Some(&customer),
            json!({"serviceType": "manicure", "zipCode": "10001", "timePreference": "asap"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["requestsSent"], 2);
    assert_eq!(json["booking"]["status"], "PENDING");
    let booking_id = json["booking"]["id"].as_str().unwrap().to_string();

    let broadcast = wait_for_email(&sent, "b1@salon.test", "New booking request").await;
    let r1 = request_for(&state, &booking_id, "b1");
    let r2 = request_for(&state, &booking_id, "b2");
    assert!(broadcast.html.contains(&format!("http://api.test/api/business/accept/{r1}")));

    let (status, json) = send(
        &app,
        post_json(
            &format!("/api/business/booking-requests/{r1}/accept"),
            Some(&business_user),
            json!({"price": 40, "notes": "gel included"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["bookingRequest"]["status"], "ACCEPTED");
    wait_for_email(&sent, "u1@test.com", "You received a quote").await;

    // accepting twice is a state conflict
    let (status, _) = send(
        &app,
        post_json(
            &format!("/api/business/booking-requests/{r1}/accept"),
            Some(&business_user),
            json!({"price": 45}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = send(&app, get(&format!("/api/bookings/{booking_id}/quotes"), Some(&customer))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["quotes"].as_array().unwrap().len(), 1);
    assert_eq!(json["quotes"][0]["price"], 40.0);
    assert_eq!(json["quotes"][0]["business"]["name"], "Salon b1");

    let (status, _) = send(
        &app,
        post_json(
            &format!("/api/bookings/requests/{r1}/confirm"),
            Some(&customer),
            json!({"message": "see you"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    wait_for_email(&sent, "u1@test.com", "Your booking is confirmed").await;
    wait_for_email(&sent, "b1@salon.test", "Your quote was accepted").await;

    let (status, json) = send(&app, get(&format!("/api/bookings/{booking_id}"), Some(&customer))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "CONFIRMED");
    assert_eq!(json["selectedRequestId"], r1.as_str());

    {
        let db = state.db.lock().unwrap();
        let sibling = queries::get_booking_request(&db, &r2).unwrap().unwrap();
        assert_eq!(sibling.status, BookingRequestStatus::Declined);
    }

    // the sibling can no longer be confirmed
    let (status, _) = send(
        &app,
        post_json(&format!("/api/bookings/requests/{r2}/confirm"), Some(&customer), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_declines_cancel_booking_and_notify_customer() {
    let (state, sent) = test_state_with_outbox();
    let customer = seed_user(&state, "u1", false);
    seed_business(&state, "b1");
    let app = test_app(state.clone());

    let (_, json) = send(
        &app,
        post_json(
            "/api/bookings",
            Some(&customer),
            json!({"serviceType": "haircut", "zipCode": "10001", "timePreference": "after"}),
        ),
    )
    .await;
    let booking_id = json["booking"]["id"].as_str().unwrap().to_string();
    let r1 = request_for(&state, &booking_id, "b1");

    let (status, _) = send(
        &app,
        post_json(&format!("/api/business/booking-requests/{r1}/decline"), Some(&customer), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    wait_for_email(&sent, "u1@test.com", "No provider available").await;

    let (_, json) = send(&app, get(&format!("/api/bookings/{booking_id}"), Some(&customer))).await;
    assert_eq!(json["status"], "CANCELLED");
}

#[tokio::test]
async fn test_booking_validation_and_ownership() {
    let (state, _) = test_state_with_outbox();
    let customer = seed_user(&state, "u1", false);
    let stranger = seed_user(&state, "u2", false);
    let app = test_app(state);

    let (status, _) = send(
        &app,
        post_json(
            "/api/bookings",
            Some(&customer),
            json!({"serviceType": "manicure", "zipCode": "10001", "timePreference": "tomorrow"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &app,
        post_json(
            "/api/bookings",
            Some(&customer),
            json!({"serviceType": "manicure", "zipCode": "10001", "timePreference": "between"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["requestsSent"], 0);
    let booking_id = json["booking"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(&app, get(&format!("/api/bookings/{booking_id}"), Some(&stranger))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        post_json(&format!("/api/bookings/{booking_id}/cancel"), Some(&stranger), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(
        &app,
        post_json(&format!("/api/bookings/{booking_id}/cancel"), Some(&customer), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["booking"]["status"], "CANCELLED");
}

// ── Email Link Tests ──

#[tokio::test]
async fn test_email_links_redirect() {
    let (state, _) = test_state_with_outbox();
    let customer = seed_user(&state, "u1", false);
    seed_business(&state, "b1");
    let app = test_app(state.clone());

    let (_, json) = send(
        &app,
        post_json(
            "/api/bookings",
            Some(&customer),
            json!({"serviceType": "manicure", "zipCode": "10001", "timePreference": "asap"}),
        ),
    )
    .await;
    let booking_id = json["booking"]["id"].as_str().unwrap().to_string();
    let r1 = request_for(&state, &booking_id, "b1");

    let res = app
        .clone()
        .oneshot(get(&format!("/api/business/accept/{r1}"), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        res.headers()[header::LOCATION],
        format!("http://app.test/business/respond/{r1}?action=accept").as_str()
    );

    let res = app
        .clone()
        .oneshot(get("/api/business/decline/missing", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        res.headers()[header::LOCATION],
        "http://app.test/business/error?reason=not_found"
    );
}

// ── Admin API Tests ──

#[tokio::test]
async fn test_admin_business_pagination() {
    let (state, _) = test_state_with_outbox();
    let admin = seed_user(&state, "admin", true);
    for n in 0..25 {
        seed_business(&state, &format!("b{n:02}"));
    }
    let app = test_app(state);

    let (status, json) = send(&app, get("/api/admin/businesses?page=2&limit=10", Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["items"].as_array().unwrap().len(), 10);
    assert_eq!(
        json["pagination"],
        json!({"total": 25, "pages": 3, "currentPage": 2, "perPage": 10})
    );

    let (_, json) = send(&app, get("/api/admin/businesses?search=B07%40", Some(&admin))).await;
    assert_eq!(json["pagination"]["total"], 1);
}

#[tokio::test]
async fn test_admin_business_crud() {
    let (state, _) = test_state_with_outbox();
    let admin = seed_user(&state, "admin", true);
    let app = test_app(state);

    let body = json!({
        "name": "Polished",
        "email": "hello@polished.test",
        "contactPerson": "Sam",
        "phone": "555-0100",
        "zipCode": "10001"
    });
    let (status, json) = send(&app, post_json("/api/admin/businesses", Some(&admin), body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = json["id"].as_str().unwrap().to_string();

    let (status, _) = send(&app, post_json("/api/admin/businesses", Some(&admin), body)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/api/admin/businesses/{id}"))
        .header(header::AUTHORIZATION, format!("Bearer {admin}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, get(&format!("/api/admin/businesses/{id}"), Some(&admin))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_stats() {
    let (state, _) = test_state_with_outbox();
    let admin = seed_user(&state, "admin", true);
    let customer = seed_user(&state, "u1", false);
    seed_business(&state, "b1");
    let app = test_app(state);

    send(
        &app,
        post_json(
            "/api/bookings",
            Some(&customer),
            json!({"serviceType": "manicure", "zipCode": "10001", "timePreference": "asap"}),
        ),
    )
    .await;

    let (status, json) = send(&app, get("/api/admin/stats", Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalUsers"], 1);
    assert_eq!(json["totalBusinesses"], 1);
    assert_eq!(json["totalBookings"], 1);
    assert_eq!(json["bookingsByStatus"]["PENDING"], 1);
    assert_eq!(json["bookingsByStatus"]["CONFIRMED"], 0);
}
