//! End-to-end flows against a real Postgres. Each test skips when
//! `TEST_DATABASE_URL` (or the local default) cannot be reached.

mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use serial_test::serial;
use sqlx::PgPool;
use std::time::Duration;
use tokio::task::JoinSet;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;
use strength_coach::auth::UserRole;
use strength_coach::config::DatabaseSeeder;
use strength_coach::models::{
    CreateProgramRequest, SubscriptionTier, UpdateProgramRequest, WorkoutTemplateInput,
};
use strength_coach::services::lemon_squeezy::sign;
use strength_coach::services::{ProgramService, SubscriptionService};

async fn seeded_app() -> Option<(PgPool, Router)> {
    let pool = test_database().await?;
    DatabaseSeeder::new(pool.clone()).seed_all().await.unwrap();
    let app = app_with(pool.clone(), test_config(Some(WEBHOOK_SECRET)));
    Some((pool, app))
}

fn new_user() -> (String, String) {
    let id = format!("user_{}", Uuid::new_v4().simple());
    let email = format!("{}@example.com", id);
    (id, email)
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = if status == StatusCode::NO_CONTENT {
        Value::Null
    } else {
        json_body(response).await
    };
    (status, body)
}

async fn create_program(pool: &PgPool, is_premium: bool) -> Uuid {
    let detail = ProgramService::new(pool.clone())
        .create_program(&CreateProgramRequest {
            name: format!("Test Program {}", Uuid::new_v4()),
            description: None,
            structure_id: None,
            is_premium,
            templates: vec![WorkoutTemplateInput {
                name: "Day 1".to_string(),
                required_muscle_groups: vec!["chest".to_string()],
            }],
        })
        .await
        .unwrap();
    detail.program.id
}

#[tokio::test]
#[serial]
async fn test_seeding_is_idempotent() {
    let Some(pool) = test_database().await else { return };

    let seeder = DatabaseSeeder::new(pool.clone());
    seeder.seed_all().await.unwrap();
    let (programs_before,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM training_programs")
        .fetch_one(&pool)
        .await
        .unwrap();

    seeder.seed_all().await.unwrap();
    let (programs_after,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM training_programs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(programs_before, programs_after);

    let subscriptions = SubscriptionService::new(pool, Default::default(), None, String::new());
    let free = subscriptions.tier_features(SubscriptionTier::Free).await.unwrap();
    assert_eq!(free.max_program_configurations, Some(1));
    assert_eq!(free.daily_chat_messages, Some(5));
    assert!(!free.premium_programs);

    let pro = subscriptions.tier_features(SubscriptionTier::ProYearly).await.unwrap();
    assert_eq!(pro.max_program_configurations, None);
    assert!(pro.volume_analytics);
}

#[tokio::test]
#[serial]
async fn test_me_provisions_and_onboarding_completes() {
    let Some((_, app)) = seeded_app().await else { return };
    let (user_id, email) = new_user();
    let token = token(&user_id, &email, UserRole::User);

    let (status, me) = call(&app, request(Method::GET, "/api/me", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], user_id.as_str());
    assert_eq!(me["subscription_tier"], "FREE");
    assert_eq!(me["onboarding_completed"], false);

    let (status, _) = call(
        &app,
        request(
            Method::PUT,
            "/api/onboarding",
            Some(&token),
            Some(json!({
                "name": "Sam",
                "fitness_goal": "build_muscle",
                "experience_level": "beginner",
                "available_equipment": ["dumbbell"],
                "training_days_per_week": 9,
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, me) = call(
        &app,
        request(
            Method::PUT,
            "/api/onboarding",
            Some(&token),
            Some(json!({
                "name": "Sam",
                "fitness_goal": "build_muscle",
                "experience_level": "beginner",
                "available_equipment": ["dumbbell", "bodyweight"],
                "training_days_per_week": 3,
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["onboarding_completed"], true);
    assert_eq!(me["training_days_per_week"], 3);
}

#[tokio::test]
#[serial]
async fn test_free_tier_configuration_limit_and_premium_lock() {
    let Some((pool, app)) = seeded_app().await else { return };
    let (user_id, email) = new_user();
    let token = token(&user_id, &email, UserRole::User);

    let first = create_program(&pool, false).await;
    let second = create_program(&pool, false).await;
    let premium = create_program(&pool, true).await;
    let body = json!({ "category": "minimalist", "selections": {} });

    let (status, saved) = call(
        &app,
        request(
            Method::PUT,
            &format!("/api/programs/{}/configuration", first),
            Some(&token),
            Some(body.clone()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["category"], "minimalist");
    assert_eq!(saved["ready"], false);

    // Updating the existing configuration does not count against the limit
    let (status, _) = call(
        &app,
        request(
            Method::PUT,
            &format!("/api/programs/{}/configuration", first),
            Some(&token),
            Some(json!({ "category": "essentialist", "selections": {} })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        &app,
        request(
            Method::PUT,
            &format!("/api/programs/{}/configuration", second),
            Some(&token),
            Some(body.clone()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        request(
            Method::PUT,
            &format!("/api/programs/{}/configuration", premium),
            Some(&token),
            Some(body),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, programs) = call(&app, request(Method::GET, "/api/programs", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    let locked = programs
        .as_array()
        .unwrap()
        .iter()
        .find(|program| program["id"] == premium.to_string())
        .map(|program| program["locked"].clone());
    assert_eq!(locked, Some(Value::Bool(true)));

    // Analysis without volume for the free tier
    let (status, analysis) = call(
        &app,
        request(
            Method::GET,
            &format!("/api/programs/{}/configuration/analysis", first),
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(analysis.get("volume").is_none());

    let (status, _) = call(
        &app,
        request(
            Method::DELETE,
            &format!("/api/programs/{}/configuration", first),
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
#[serial]
async fn test_rejects_unknown_exercise_in_configuration() {
    let Some((pool, app)) = seeded_app().await else { return };
    let (user_id, email) = new_user();
    let token = token(&user_id, &email, UserRole::User);

    let program_id = create_program(&pool, false).await;
    let detail = ProgramService::new(pool.clone())
        .get_program_detail(program_id)
        .await
        .unwrap()
        .unwrap();
    let mut selections = serde_json::Map::new();
    selections.insert(detail.templates[0].id.to_string(), json!([Uuid::new_v4()]));

    let (status, body) = call(
        &app,
        request(
            Method::PUT,
            &format!("/api/programs/{}/configuration", program_id),
            Some(&token),
            Some(json!({
                "category": "minimalist",
                "selections": selections,
            })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "VALIDATION_ERROR");
}

fn signed_webhook(payload: &Value) -> Request<Body> {
    let body = payload.to_string();
    let signature = sign(WEBHOOK_SECRET.as_bytes(), body.as_bytes()).unwrap();

    Request::builder()
        .method(Method::POST)
        .uri("/api/webhooks/lemon-squeezy")
        .header("content-type", "application/json")
        .header("x-signature", signature)
        .body(Body::from(body))
        .unwrap()
}

fn subscription_event(event: &str, user_id: Option<&str>, email: &str, status: &str, variant_id: i64) -> Value {
    json!({
        "meta": {
            "event_name": event,
            "custom_data": user_id.map(|id| json!({ "user_id": id })),
        },
        "data": {
            "id": format!("sub_{}", Uuid::new_v4().simple()),
            "type": "subscriptions",
            "attributes": {
                "status": status,
                "variant_id": variant_id,
                "customer_id": 4242,
                "user_email": email,
                "renews_at": "2030-01-01T00:00:00Z",
                "ends_at": null,
            }
        }
    })
}

#[tokio::test]
#[serial]
async fn test_webhook_upgrades_then_downgrades_user() {
    let Some((_, app)) = seeded_app().await else { return };
    let (user_id, email) = new_user();
    let token = token(&user_id, &email, UserRole::User);
    call(&app, request(Method::GET, "/api/me", Some(&token), None)).await;

    let created = subscription_event("subscription_created", Some(&user_id), &email, "active", PRO_MONTHLY_VARIANT);
    let (status, ack) = call(&app, signed_webhook(&created)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack, json!({ "received": true, "outcome": "applied" }));

    let (_, subscription) = call(&app, request(Method::GET, "/api/subscription", Some(&token), None)).await;
    assert_eq!(subscription["tier"], "PRO_MONTHLY");
    assert_eq!(subscription["status"], "active");
    assert_eq!(subscription["features"]["premium_programs"], true);

    // Resolved by email when custom data is missing
    let expired = subscription_event("subscription_expired", None, &email.to_uppercase(), "expired", PRO_MONTHLY_VARIANT);
    let (status, ack) = call(&app, signed_webhook(&expired)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["outcome"], "applied");

    let (_, me) = call(&app, request(Method::GET, "/api/me", Some(&token), None)).await;
    assert_eq!(me["subscription_tier"], "FREE");
}

#[tokio::test]
#[serial]
async fn test_webhook_for_unknown_user_or_variant_is_acknowledged() {
    let Some((pool, app)) = seeded_app().await else { return };
    let (user_id, email) = new_user();

    let orphan = subscription_event("subscription_created", Some(&user_id), &email, "active", PRO_YEARLY_VARIANT);
    let (status, ack) = call(&app, signed_webhook(&orphan)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["outcome"], "user_not_found");

    let token = token(&user_id, &email, UserRole::User);
    call(&app, request(Method::GET, "/api/me", Some(&token), None)).await;

    let unmapped = subscription_event("subscription_created", Some(&user_id), &email, "active", 999_999);
    let (status, ack) = call(&app, signed_webhook(&unmapped)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["outcome"], "ignored");

    let (tier,): (String,) = sqlx::query_as("SELECT subscription_tier FROM users WHERE id = $1")
        .bind(&user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(tier, "FREE");
}

#[tokio::test]
#[serial]
async fn test_admin_manages_catalog_and_tiers() {
    let Some((_, app)) = seeded_app().await else { return };
    let admin = token("admin_root", "admin@example.com", UserRole::Admin);

    let name = format!("Test Curl {}", Uuid::new_v4().simple());
    let (status, exercise) = call(
        &app,
        request(
            Method::POST,
            "/api/admin/exercises",
            Some(&admin),
            Some(json!({
                "name": name,
                "primary_muscle_group": "biceps",
                "secondary_muscle_groups": ["forearms"],
                "equipment": "dumbbell",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = call(
        &app,
        request(
            Method::POST,
            "/api/admin/exercises",
            Some(&admin),
            Some(json!({ "name": name, "primary_muscle_group": "biceps" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let exercise_uri = format!("/api/admin/exercises/{}", exercise["id"].as_str().unwrap());
    let (status, updated) = call(
        &app,
        request(Method::PUT, &exercise_uri, Some(&admin), Some(json!({ "is_active": false }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["is_active"], false);

    let (status, _) = call(&app, request(Method::DELETE, &exercise_uri, Some(&admin), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, request(Method::DELETE, &exercise_uri, Some(&admin), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, config) = call(
        &app,
        request(
            Method::PUT,
            "/api/admin/ai-config",
            Some(&admin),
            Some(json!({ "temperature": 0.3 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(config["temperature"], 0.3);
    assert_eq!(config["updated_by"], "admin_root");

    let (status, tiers) = call(&app, request(Method::GET, "/api/admin/tier-features", Some(&admin), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tiers.as_array().unwrap().len(), 3);
}

async fn coach_app(pool: &PgPool, server: &MockServer) -> Router {
    let mut config = test_config(Some(WEBHOOK_SECRET));
    config.llm.api_base = format!("{}/v1/", server.uri());
    config.llm.api_key = Some("sk-test".to_string());
    app_with(pool.clone(), config)
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    }))
}

async fn stored_user_messages(pool: &PgPool, user_id: &str) -> i64 {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM coach_messages WHERE user_id = $1 AND role = 'user'")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .unwrap();
    count
}

#[tokio::test]
#[serial]
async fn test_coach_chat_daily_limit_holds_under_concurrent_sends() {
    let Some(pool) = test_database().await else { return };
    DatabaseSeeder::new(pool.clone()).seed_all().await.unwrap();
    let (limit,): (Option<i32>,) = sqlx::query_as(
        "SELECT daily_chat_messages FROM subscription_tier_features WHERE tier = 'FREE'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    let limit = i64::from(limit.expect("free tier has a daily chat limit"));

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion("Add a set each week.").set_delay(Duration::from_millis(100)))
        .mount(&server)
        .await;
    let app = coach_app(&pool, &server).await;

    let (user_id, email) = new_user();
    let token = token(&user_id, &email, UserRole::User);
    let (status, _) = call(&app, request(Method::GET, "/api/me", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);

    let sends = limit + 3;
    let mut tasks = JoinSet::new();
    for n in 0..sends {
        let app = app.clone();
        let body = json!({ "message": format!("Question {}", n) });
        let request = request(Method::POST, "/api/coach/messages", Some(&token), Some(body));
        tasks.spawn(async move { call(&app, request).await });
    }

    let mut accepted = 0;
    let mut limited = 0;
    let mut remaining = Vec::new();
    while let Some(result) = tasks.join_next().await {
        let (status, body) = result.unwrap();
        match status {
            StatusCode::OK => {
                accepted += 1;
                assert_eq!(body["reply"]["content"], "Add a set each week.");
                remaining.push(body["remaining_today"].as_i64().unwrap());
            }
            StatusCode::TOO_MANY_REQUESTS => {
                limited += 1;
                assert_eq!(body["error_code"], "RATE_LIMITED");
            }
            other => panic!("unexpected status {}: {}", other, body),
        }
    }

    assert_eq!(accepted, limit);
    assert_eq!(limited, sends - limit);
    assert_eq!(stored_user_messages(&pool, &user_id).await, limit);
    remaining.sort_unstable();
    assert_eq!(remaining, (0..limit).collect::<Vec<_>>());

    // History is oldest first and pages backwards with `before`
    let (status, history) =
        call(&app, request(Method::GET, "/api/coach/messages", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().unwrap().clone();
    assert_eq!(history.len() as i64, limit * 2);
    for pair in history.chunks(2) {
        assert_eq!(pair[0]["role"], "user");
        assert_eq!(pair[1]["role"], "assistant");
    }

    let (_, newest) = call(
        &app,
        request(Method::GET, "/api/coach/messages?limit=2", Some(&token), None),
    )
    .await;
    let newest = newest.as_array().unwrap().clone();
    assert_eq!(newest, history[history.len() - 2..].to_vec());

    let before = newest[0]["created_at"].as_str().unwrap();
    let (_, older) = call(
        &app,
        request(
            Method::GET,
            &format!("/api/coach/messages?limit=2&before={}", before),
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(older.as_array().unwrap().clone(), history[history.len() - 4..history.len() - 2].to_vec());
}

#[tokio::test]
#[serial]
async fn test_coach_chat_upstream_failure_stores_nothing() {
    let Some(pool) = test_database().await else { return };
    DatabaseSeeder::new(pool.clone()).seed_all().await.unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "message": "The server had an error" }
        })))
        .mount(&server)
        .await;
    let app = coach_app(&pool, &server).await;

    let (user_id, email) = new_user();
    let token = token(&user_id, &email, UserRole::User);

    let (status, body) = call(
        &app,
        request(
            Method::POST,
            "/api/coach/messages",
            Some(&token),
            Some(json!({ "message": "Is deload week useful?" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error_code"], "UPSTREAM_ERROR");
    assert_eq!(stored_user_messages(&pool, &user_id).await, 0);

    let (status, body) = call(
        &app,
        request(
            Method::POST,
            "/api/coach/messages",
            Some(&token),
            Some(json!({ "message": "   " })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "VALIDATION_ERROR");
}

#[tokio::test]
#[serial]
async fn test_replacing_templates_keeps_saved_selections() {
    let Some((pool, app)) = seeded_app().await else { return };
    let (user_id, email) = new_user();
    let token = token(&user_id, &email, UserRole::User);
    let programs = ProgramService::new(pool.clone());

    let template = |name: &str| WorkoutTemplateInput {
        name: name.to_string(),
        required_muscle_groups: vec!["chest".to_string()],
    };
    let detail = programs
        .create_program(&CreateProgramRequest {
            name: format!("Template Program {}", Uuid::new_v4()),
            description: None,
            structure_id: None,
            is_premium: false,
            templates: vec![template("Push"), template("Pull")],
        })
        .await
        .unwrap();
    let program_id = detail.program.id;
    let push_id = detail.templates[0].id;

    let (exercise_id,): (Uuid,) = sqlx::query_as(
        "SELECT id FROM training_exercises WHERE primary_muscle_group = 'chest' AND is_active LIMIT 1",
    )
    .fetch_one(&pool)
    .await
    .unwrap();

    let mut selections = serde_json::Map::new();
    selections.insert(push_id.to_string(), json!([exercise_id]));
    let (status, _) = call(
        &app,
        request(
            Method::PUT,
            &format!("/api/programs/{}/configuration", program_id),
            Some(&token),
            Some(json!({ "category": "minimalist", "selections": selections })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let updated = programs
        .update_program(
            program_id,
            &UpdateProgramRequest {
                name: None,
                description: None,
                structure_id: None,
                is_premium: None,
                is_active: None,
                templates: Some(vec![template("Push Day")]),
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.templates.len(), 1);
    assert_eq!(updated.templates[0].id, push_id);
    assert_eq!(updated.templates[0].name, "Push Day");

    let (status, saved) = call(
        &app,
        request(
            Method::GET,
            &format!("/api/programs/{}/configuration", program_id),
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["selections"][push_id.to_string()], json!([exercise_id]));
}
