use actix_web::http::StatusCode;
use serde_json::json;

use super::helpers::*;

#[actix_web::test]
async fn readiness_is_public() {
    let market = TestMarket::new();
    let (status, body) = market.get("/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_envelope(&body);
    assert_eq!(body["message"], "ready to serve");
}

#[actix_web::test]
async fn protected_routes_need_a_token() {
    let market = TestMarket::new();
    for path in ["/user/allproducts", "/user/getcart", "/seller/products", "/seller/listorders"] {
        let (status, body) = market.get(path, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{path}");
        assert_envelope(&body);
        assert_eq!(body["status"], "Unauthorized");
        assert!(body["data"].is_null());
        assert!(!body["errors"].as_array().unwrap().is_empty());
    }
    let (status, _) = market.get("/user/allproducts", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn guards_do_not_accept_the_other_role() {
    let market = TestMarket::new();
    let user = access_token(&market.sign_up_and_login("user", "buyer@example.com").await);
    let seller = access_token(&market.sign_up_and_login("seller", "shop@example.com").await);

    let (status, _) = market.get("/seller/products", Some(&user)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = market.get("/user/allproducts", Some(&seller)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = market.get("/seller/products", Some(&seller)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = market.get("/user/allproducts", Some(&user)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn login_returns_tokens_and_hides_the_hash() {
    let market = TestMarket::new();
    let login = market.sign_up_and_login("user", "Buyer@Example.com").await;
    assert_eq!(login["user"]["email"], "buyer@example.com");
    assert!(login["user"].get("password").is_none());
    assert!(login["refresh_token"].as_str().is_some());

    let (status, body) =
        market.post("/user/login", None, json!({ "email": "buyer@example.com", "password": "wrong" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_envelope(&body);
    let (status, _) =
        market.post("/user/login", None, json!({ "email": "nobody@example.com", "password": "hunter2" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn duplicate_and_malformed_sign_ups() {
    let market = TestMarket::new();
    market.sign_up_and_login("seller", "shop@example.com").await;
    let creds = json!({ "email": "shop@example.com", "password": "other" });
    let (status, body) = market.post("/seller/create", None, creds.clone()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_envelope(&body);
    // the same address is free on the user side
    let (status, _) = market.post("/user/create", None, creds).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = market.post("/user/create", None, json!({ "email": 42 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(&body);
}

#[actix_web::test]
async fn logout_revokes_both_tokens() {
    let market = TestMarket::new();
    let login = market.sign_up_and_login("user", "buyer@example.com").await;
    let token = access_token(&login);
    let refresh = login["refresh_token"].as_str().unwrap().to_string();

    let (status, _) = market.post("/user/logout", Some(&token), json!({ "refresh_token": refresh })).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = market.get("/user/allproducts", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = market.post("/user/refresh", None, json!({ "refresh_token": refresh })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn refresh_rotates_the_pair() {
    let market = TestMarket::new();
    let login = market.sign_up_and_login("seller", "shop@example.com").await;
    let refresh = login["refresh_token"].as_str().unwrap().to_string();

    let (status, body) = market.post("/seller/refresh", None, json!({ "refresh_token": refresh })).await;
    assert_eq!(status, StatusCode::OK);
    let fresh = access_token(&body["data"]);
    let (status, _) = market.get("/seller/products", Some(&fresh)).await;
    assert_eq!(status, StatusCode::OK);

    // the old refresh token was spent
    let (status, _) = market.post("/seller/refresh", None, json!({ "refresh_token": refresh })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    // and a seller refresh token is no good on the user side
    let next = body["data"]["refresh_token"].as_str().unwrap().to_string();
    let (status, _) = market.post("/user/refresh", None, json!({ "refresh_token": next })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    // nor is an access token
    let (status, _) = market.post("/seller/refresh", None, json!({ "refresh_token": fresh })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
