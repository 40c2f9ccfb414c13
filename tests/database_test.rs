//! Runs against a real Postgres when `DATABASE_URL` is set; every test is a
//! no-op otherwise. Each test works with freshly generated tenants, so the
//! suite can share one database.

use std::time::Duration;

use actix_web::{http::StatusCode, test, web, App};
use futures_util::future::join_all;
use serde_json::{json, Value};
use uuid::Uuid;

use happymeter::analytics::AnalyticsCache;
use happymeter::clients::MessagingClient;
use happymeter::config::{Config, MessagingConfig};
use happymeter::database::Database;
use happymeter::handlers;
use happymeter::models::UserRole;
use happymeter::plans::Plan;

const OFFSET_MINUTES: i32 = -360;

fn test_config(database_url: String) -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        database_url,
        cron_secret: None,
        default_utc_offset_minutes: OFFSET_MINUTES,
        analytics_cache_ttl_secs: 60,
        messaging: MessagingConfig {
            whatsapp_api_url: None,
            whatsapp_api_token: None,
            email_api_url: None,
            email_api_key: None,
            email_from: "HappyMeter <reportes@happymeter.app>".into(),
        },
    }
}

/// Connects and migrates, or returns from the test when no database is configured.
macro_rules! database_or_skip {
    () => {{
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping");
            return;
        };
        let db = Database::connect(&url).await.expect("database connection");
        (db, test_config(url))
    }};
}

macro_rules! test_app {
    ($db:expr, $config:expr) => {{
        test::init_service(
            App::new()
                .app_data(web::Data::new($db.clone()))
                .app_data(web::Data::new(MessagingClient::new($config.messaging.clone())))
                .app_data(web::Data::new(AnalyticsCache::new(Duration::from_secs(60))))
                .app_data(web::Data::new($config.clone()))
                .service(web::scope("/api/v1").configure(handlers::configure)),
        )
        .await
    }};
}

/// Sends the request and returns the status with the decoded envelope.
macro_rules! send {
    ($app:expr, $req:expr) => {{
        let resp = test::call_service(&$app, $req.to_request()).await;
        let status = resp.status();
        let body: Value = test::read_body_json(resp).await;
        (status, body)
    }};
}

fn as_actor(req: test::TestRequest, actor: Uuid) -> test::TestRequest {
    req.insert_header(("X-Actor-Id", actor.to_string()))
}

fn id_of(value: &Value) -> Uuid {
    Uuid::parse_str(value.as_str().expect("id string")).expect("uuid")
}

async fn pro_tenant(db: &Database) -> Uuid {
    let tenant = Uuid::new_v4();
    db.set_role_and_plan(tenant, None, Some(Plan::Pro), OFFSET_MINUTES)
        .await
        .expect("tenant settings");
    tenant
}

async fn admin(db: &Database) -> Uuid {
    let admin = Uuid::new_v4();
    db.set_role_and_plan(admin, Some(UserRole::Admin), None, OFFSET_MINUTES)
        .await
        .expect("admin settings");
    admin
}

// ============================================================================
// CHAINS
// ============================================================================

#[actix_web::test]
async fn chain_owner_reaches_a_branch_only_after_it_accepts() {
    let (db, config) = database_or_skip!();
    let app = test_app!(db, config);
    let owner = pro_tenant(&db).await;
    let rival = pro_tenant(&db).await;
    let victim = pro_tenant(&db).await;
    let surveys_of_victim = format!("/api/v1/surveys?owner_user_id={victim}");

    let (status, _) = send!(app, as_actor(test::TestRequest::get().uri(&surveys_of_victim), owner));
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, chain) = send!(
        app,
        as_actor(test::TestRequest::post().uri("/api/v1/chains"), owner).set_json(json!({ "name": "Tacos del Norte" }))
    );
    assert_eq!(status, StatusCode::CREATED);
    let chain_id = id_of(&chain["data"]["id"]);

    let (status, branch) = send!(
        app,
        as_actor(test::TestRequest::post().uri(&format!("/api/v1/chains/{chain_id}/branches")), owner)
            .set_json(json!({ "branch_user_id": victim, "label": "Centro" }))
    );
    assert_eq!(status, StatusCode::CREATED);
    assert!(branch["data"]["accepted_at"].is_null());

    // A pending invitation grants nothing.
    let (status, _) = send!(app, as_actor(test::TestRequest::get().uri(&surveys_of_victim), owner));
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, invitations) = send!(app, as_actor(test::TestRequest::get().uri("/api/v1/chains/invitations"), victim));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(invitations["data"][0]["chain_id"], chain["data"]["id"]);

    let (status, accepted) = send!(
        app,
        as_actor(test::TestRequest::post().uri(&format!("/api/v1/chains/{chain_id}/branches/accept")), victim)
    );
    assert_eq!(status, StatusCode::OK);
    assert!(!accepted["data"]["accepted_at"].is_null());

    let (status, _) = send!(app, as_actor(test::TestRequest::get().uri(&surveys_of_victim), owner));
    assert_eq!(status, StatusCode::OK);

    // A second chain may invite, but the branch cannot belong to both.
    let (_, other_chain) = send!(
        app,
        as_actor(test::TestRequest::post().uri("/api/v1/chains"), rival).set_json(json!({ "name": "Tacos del Sur" }))
    );
    let other_chain_id = id_of(&other_chain["data"]["id"]);
    let (status, _) = send!(
        app,
        as_actor(test::TestRequest::post().uri(&format!("/api/v1/chains/{other_chain_id}/branches")), rival)
            .set_json(json!({ "branch_user_id": victim, "label": "Sucursal" }))
    );
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send!(
        app,
        as_actor(test::TestRequest::post().uri(&format!("/api/v1/chains/{other_chain_id}/branches/accept")), victim)
    );
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send!(app, as_actor(test::TestRequest::get().uri(&surveys_of_victim), rival));
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ============================================================================
// ROULETTE & COUPONS
// ============================================================================

/// Creates a one-question survey with a roulette whose only prize is won on
/// every spin. Evaluates to (survey id, question id, game id).
macro_rules! survey_with_roulette {
    ($app:expr, $owner:expr) => {{
        let (status, survey) = send!(
            $app,
            as_actor(test::TestRequest::post().uri("/api/v1/surveys"), $owner).set_json(json!({
                "title": "Visita de hoy",
                "questions": [{ "text": "¿Cómo calificas tu visita?", "question_type": "rating" }]
            }))
        );
        assert_eq!(status, StatusCode::CREATED);
        let survey_id = id_of(&survey["data"]["id"]);
        let question_id = id_of(&survey["data"]["questions"][0]["id"]);

        let (status, game) = send!(
            $app,
            as_actor(test::TestRequest::put().uri("/api/v1/roulette"), $owner).set_json(json!({
                "survey_id": survey_id,
                "prizes": [{ "label": "Postre gratis", "weight": 1.0, "guaranteed_every": 1 }]
            }))
        );
        assert_eq!(status, StatusCode::OK);

        (survey_id, question_id, id_of(&game["data"]["id"]))
    }};
}

macro_rules! submit_response {
    ($app:expr, $survey_id:expr, $question_id:expr) => {{
        let (status, response) = send!(
            $app,
            test::TestRequest::post()
                .uri(&format!("/api/v1/surveys/{}/responses", $survey_id))
                .set_json(json!({ "answers": [{ "question_id": $question_id, "score": 5 }] }))
        );
        assert_eq!(status, StatusCode::CREATED);
        id_of(&response["data"]["id"])
    }};
}

#[actix_web::test]
async fn a_response_spins_only_once() {
    let (db, config) = database_or_skip!();
    let app = test_app!(db, config);
    let owner = pro_tenant(&db).await;
    let (survey_id, question_id, game_id) = survey_with_roulette!(app, owner);
    let response_id = submit_response!(app, survey_id, question_id);
    let spin_uri = format!("/api/v1/roulette/{game_id}/spin");

    let (status, outcome) = send!(
        app,
        test::TestRequest::post().uri(&spin_uri).set_json(json!({ "response_id": response_id }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["data"]["won"], true);
    assert_eq!(outcome["data"]["spin"]["spin_number"], 1);

    let (status, body) = send!(
        app,
        test::TestRequest::post().uri(&spin_uri).set_json(json!({ "response_id": response_id }))
    );
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "This response already used its spin");

    let game = db.get_roulette(game_id).await.unwrap().unwrap();
    assert_eq!(game.game.spin_count, 1);
}

#[actix_web::test]
async fn concurrent_spins_get_consecutive_numbers() {
    const SPINS: i64 = 8;

    let (db, config) = database_or_skip!();
    let app = test_app!(db, config);
    let owner = pro_tenant(&db).await;
    let (survey_id, question_id, game_id) = survey_with_roulette!(app, owner);

    let mut responses = Vec::new();
    for _ in 0..SPINS {
        responses.push(submit_response!(app, survey_id, question_id));
    }

    let game = db.get_roulette(game_id).await.unwrap().unwrap();
    let results = join_all(
        responses
            .iter()
            .map(|response_id| db.record_spin(&game, *response_id, happymeter::codes::coupon_code(), |_, _| None)),
    )
    .await;

    let mut numbers: Vec<i64> = results
        .into_iter()
        .map(|result| result.expect("spin").spin.spin_number)
        .collect();
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=SPINS).collect::<Vec<_>>());

    let game = db.get_roulette(game_id).await.unwrap().unwrap();
    assert_eq!(game.game.spin_count, SPINS);
}

#[actix_web::test]
async fn coupons_redeem_once_and_not_after_expiry() {
    let (db, config) = database_or_skip!();
    let app = test_app!(db, config);
    let owner = pro_tenant(&db).await;
    let (survey_id, question_id, game_id) = survey_with_roulette!(app, owner);
    let spin_uri = format!("/api/v1/roulette/{game_id}/spin");

    let mut codes = Vec::new();
    for _ in 0..2 {
        let response_id = submit_response!(app, survey_id, question_id);
        let (status, outcome) = send!(
            app,
            test::TestRequest::post().uri(&spin_uri).set_json(json!({ "response_id": response_id }))
        );
        assert_eq!(status, StatusCode::OK);
        codes.push(outcome["data"]["coupon"]["code"].as_str().unwrap().to_string());
    }

    let redeem = |code: &str| {
        as_actor(test::TestRequest::post().uri("/api/v1/coupons/redeem"), owner)
            .set_json(json!({ "owner_user_id": owner, "code": code.to_lowercase() }))
    };

    let (status, coupon) = send!(app, redeem(&codes[0]));
    assert_eq!(status, StatusCode::OK);
    assert!(!coupon["data"]["redeemed_at"].is_null());

    let (status, body) = send!(app, redeem(&codes[0]));
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Coupon was already redeemed");

    sqlx::query("UPDATE coupons SET expires_at = NOW() - INTERVAL '1 day' WHERE code = $1")
        .bind(&codes[1])
        .execute(db.pool())
        .await
        .unwrap();

    let (status, body) = send!(app, redeem(&codes[1]));
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Coupon has expired");
}

// ============================================================================
// LOYALTY
// ============================================================================

#[actix_web::test]
async fn one_visit_per_day_and_redemption_spends_points() {
    let (db, config) = database_or_skip!();
    let app = test_app!(db, config);
    let owner = pro_tenant(&db).await;

    let (status, _) = send!(
        app,
        as_actor(test::TestRequest::put().uri("/api/v1/loyalty/program"), owner).set_json(json!({
            "name": "Cliente frecuente",
            "points_per_visit": 10,
            "reward_threshold": 10,
            "reward_description": "Café gratis"
        }))
    );
    assert_eq!(status, StatusCode::OK);

    let (status, customer) = send!(
        app,
        test::TestRequest::post()
            .uri(&format!("/api/v1/loyalty/programs/{owner}/customers"))
            .set_json(json!({ "name": "Lucía", "phone": "5512345678" }))
    );
    assert_eq!(status, StatusCode::CREATED);
    let customer_id = id_of(&customer["data"]["id"]);
    let qr_code = customer["data"]["qr_code"].as_str().unwrap().to_string();

    let visit = || {
        as_actor(test::TestRequest::post().uri("/api/v1/loyalty/visits"), owner).set_json(json!({ "qr_code": qr_code }))
    };

    let (status, outcome) = send!(app, visit());
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(outcome["data"]["customer"]["points"], 10);
    assert_eq!(outcome["data"]["reward_available"], true);

    let (status, _) = send!(app, visit());
    assert_eq!(status, StatusCode::CONFLICT);

    let redeem_uri = format!("/api/v1/loyalty/customers/{customer_id}/redeem");
    let (status, redemption) = send!(app, as_actor(test::TestRequest::post().uri(&redeem_uri), owner));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(redemption["data"]["customer"]["points"], 0);
    assert_eq!(redemption["data"]["redemption"]["points_spent"], 10);

    let (status, _) = send!(app, as_actor(test::TestRequest::post().uri(&redeem_uri), owner));
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let points: i32 = sqlx::query_scalar("SELECT points FROM loyalty_customers WHERE id = $1")
        .bind(customer_id)
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(points, 0);
}

#[actix_web::test]
async fn loyalty_customers_are_paginated() {
    let (db, config) = database_or_skip!();
    let app = test_app!(db, config);
    let owner = pro_tenant(&db).await;

    let (status, _) = send!(
        app,
        as_actor(test::TestRequest::put().uri("/api/v1/loyalty/program"), owner).set_json(json!({
            "name": "Cliente frecuente",
            "points_per_visit": 1,
            "reward_threshold": 10,
            "reward_description": "Café gratis"
        }))
    );
    assert_eq!(status, StatusCode::OK);

    for (name, phone) in [("Ana", "5511111111"), ("Beto", "5522222222"), ("Carla", "5533333333")] {
        let (status, _) = send!(
            app,
            test::TestRequest::post()
                .uri(&format!("/api/v1/loyalty/programs/{owner}/customers"))
                .set_json(json!({ "name": name, "phone": phone }))
        );
        assert_eq!(status, StatusCode::CREATED);
    }

    let page = |query: &str| as_actor(test::TestRequest::get().uri(&format!("/api/v1/loyalty/customers?{query}")), owner);

    let (status, first) = send!(app, page("limit=2"));
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = first["data"].as_array().unwrap().iter().map(|c| c["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["Ana", "Beto"]);

    let (_, rest) = send!(app, page("limit=2&offset=2"));
    let names: Vec<&str> = rest["data"].as_array().unwrap().iter().map(|c| c["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["Carla"]);
}

// ============================================================================
// AFFILIATES
// ============================================================================

#[actix_web::test]
async fn payouts_need_the_minimum_and_rejection_releases_commissions() {
    let (db, config) = database_or_skip!();
    let app = test_app!(db, config);
    let admin = admin(&db).await;
    let affiliate = Uuid::new_v4();

    let (status, profile) = send!(
        app,
        as_actor(test::TestRequest::post().uri("/api/v1/affiliates"), affiliate)
            .set_json(json!({ "payout_email": "pagos@ejemplo.mx" }))
    );
    assert_eq!(status, StatusCode::CREATED);
    let referral_code = profile["data"]["referral_code"].as_str().unwrap().to_string();
    assert_eq!(db.get_user_role(affiliate).await.unwrap(), Some(UserRole::Creator));

    let record_commission = |payment_amount: &str| {
        as_actor(test::TestRequest::post().uri("/api/v1/admin/commissions"), admin).set_json(json!({
            "referral_code": referral_code,
            "referred_user_id": Uuid::new_v4(),
            "payment_amount": payment_amount,
            "source_payment_ref": format!("pay_{}", Uuid::new_v4().simple()),
        }))
    };
    let approve = |commission_id: Uuid| {
        as_actor(test::TestRequest::put().uri(&format!("/api/v1/admin/commissions/{commission_id}")), admin)
            .set_json(json!({ "status": "approved" }))
    };
    let request_payout = || as_actor(test::TestRequest::post().uri("/api/v1/affiliates/payouts"), affiliate);

    let (status, commission) = send!(app, record_commission("1000.00"));
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send!(app, approve(id_of(&commission["data"]["id"])));
    assert_eq!(status, StatusCode::OK);

    // 200.00 available is below the 500.00 minimum.
    let (status, _) = send!(app, request_payout());
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, commission) = send!(app, record_commission("2000.00"));
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send!(app, approve(id_of(&commission["data"]["id"])));
    assert_eq!(status, StatusCode::OK);

    let (status, payout) = send!(app, request_payout());
    assert_eq!(status, StatusCode::CREATED);
    let payout_id = payout["data"]["id"].clone();

    let (_, dashboard) = send!(app, as_actor(test::TestRequest::get().uri("/api/v1/affiliates/me"), affiliate));
    let commissions = dashboard["data"]["commissions"].as_array().unwrap();
    assert_eq!(commissions.len(), 2);
    assert!(commissions.iter().all(|commission| commission["payout_id"] == payout_id));

    let (status, _) = send!(
        app,
        as_actor(test::TestRequest::put().uri(&format!("/api/v1/admin/payouts/{}", id_of(&payout_id))), admin)
            .set_json(json!({ "status": "rejected" }))
    );
    assert_eq!(status, StatusCode::OK);

    let (_, dashboard) = send!(app, as_actor(test::TestRequest::get().uri("/api/v1/affiliates/me"), affiliate));
    let commissions = dashboard["data"]["commissions"].as_array().unwrap();
    assert!(commissions.iter().all(|commission| commission["payout_id"].is_null()));

    let (status, _) = send!(app, request_payout());
    assert_eq!(status, StatusCode::CREATED);
}

#[actix_web::test]
async fn registering_as_affiliate_keeps_an_admin_an_admin() {
    let (db, config) = database_or_skip!();
    let app = test_app!(db, config);
    let admin = admin(&db).await;

    let (status, _) = send!(
        app,
        as_actor(test::TestRequest::post().uri("/api/v1/affiliates"), admin)
            .set_json(json!({ "payout_email": "admin@happymeter.app" }))
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(db.get_user_role(admin).await.unwrap(), Some(UserRole::Admin));
}
