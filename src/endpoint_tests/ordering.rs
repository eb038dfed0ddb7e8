use actix_web::http::StatusCode;
use serde_json::{json, Value};

use super::helpers::*;

async fn stocked_market() -> (TestMarket, String, String, i64) {
    let market = TestMarket::new();
    let seller = access_token(&market.sign_up_and_login("seller", "shop@example.com").await);
    let user = access_token(&market.sign_up_and_login("user", "buyer@example.com").await);
    let product = json!({ "title": "Kettle", "price": 10.0, "stock": 10, "overview": "Boils water" });
    let (status, body) = market.post("/seller/addproduct", Some(&seller), product).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let product_id = body["data"]["id"].as_i64().unwrap();
    (market, seller, user, product_id)
}

fn ids(orders: &Value) -> Vec<i64> {
    orders.as_array().unwrap().iter().map(|o| o["id"].as_i64().unwrap()).collect()
}

#[actix_web::test]
async fn browse_order_and_accept() {
    let (market, seller, user, product_id) = stocked_market().await;

    let (status, body) = market.get("/user/allproducts", Some(&user)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["products"].as_array().unwrap().len(), 1);
    let (status, body) = market.get(&format!("/user/getproduct/{product_id}"), Some(&user)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["product"]["title"], "Kettle");

    let (status, _) = market.get("/user/getcart", Some(&user)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) =
        market.post("/user/addtocart", Some(&user), json!({ "product_id": product_id, "quantity": 2 })).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = market.get("/user/getcart", Some(&user)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 20.0);

    let (status, body) = market.post("/user/placeorder", Some(&user), json!({})).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let order_id = body["data"]["order_id"].as_i64().unwrap();
    assert_eq!(body["data"]["order"]["status"], "PLACED");
    assert_eq!(body["data"]["order"]["total"], 20.0);
    let (status, _) = market.get("/user/getcart", Some(&user)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = market.get("/seller/listorders", Some(&seller)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body["data"]), vec![order_id]);

    let (status, body) = market.put(&format!("/seller/acceptorder/{order_id}"), Some(&seller), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ACCEPTED");
    let (status, body) = market.put(&format!("/seller/declineorder/{order_id}"), Some(&seller), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_envelope(&body);
    let (status, _) = market.put(&format!("/seller/completeorder/{order_id}"), Some(&seller), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = market.get("/user/vieworders", Some(&user)).await;
    assert_eq!(body["data"]["orders"][0]["status"], "COMPLETED");
}

#[actix_web::test]
async fn stock_is_checked_at_the_cart_and_at_checkout() {
    let (market, seller, user, product_id) = stocked_market().await;
    let (status, body) =
        market.post("/user/addtocart", Some(&user), json!({ "product_id": product_id, "quantity": 11 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(&body);

    let (status, _) =
        market.post("/user/addtocart", Some(&user), json!({ "product_id": product_id, "quantity": 5 })).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) =
        market.put(&format!("/seller/updatestock/{product_id}"), Some(&seller), json!({ "stock": 4 })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = market.post("/user/placeorder", Some(&user), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, body) = market.get("/user/vieworders", Some(&user)).await;
    assert!(body["data"]["orders"].as_array().unwrap().is_empty());
    // the cart survived the failed checkout
    let (status, body) = market.get("/user/getcart", Some(&user)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 50.0);

    let (status, _) =
        market.put("/user/editcart", Some(&user), json!({ "product_id": product_id, "quantity": 4 })).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = market.post("/user/placeorder", Some(&user), json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[actix_web::test]
async fn sellers_only_touch_their_own_products_and_orders() {
    let (market, _seller, user, product_id) = stocked_market().await;
    let rival = access_token(&market.sign_up_and_login("seller", "rival@example.com").await);

    let (status, _) =
        market.put(&format!("/seller/updatestock/{product_id}"), Some(&rival), json!({ "stock": 0 })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = market.delete(&format!("/seller/deleteproduct/{product_id}"), Some(&rival)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    market.post("/user/addtocart", Some(&user), json!({ "product_id": product_id, "quantity": 1 })).await;
    let (_, body) = market.post("/user/placeorder", Some(&user), json!({})).await;
    let order_id = body["data"]["order_id"].as_i64().unwrap();

    let (status, body) = market.get("/seller/listorders", Some(&rival)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());
    let (status, _) = market.put(&format!("/seller/acceptorder/{order_id}"), Some(&rival), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn bad_ids_and_missing_rows() {
    let (market, seller, user, product_id) = stocked_market().await;
    let (status, body) = market.get("/user/getproduct/abc", Some(&user)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(&body);
    let (status, _) = market.get("/user/getproduct/9999", Some(&user)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = market.delete(&format!("/user/deletefromcart/{product_id}"), Some(&user)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = market.put("/seller/acceptorder/9999", Some(&seller), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = market.post("/user/placeorder", Some(&user), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = market.delete(&format!("/seller/deleteproduct/{product_id}"), Some(&seller)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = market.get("/seller/products", Some(&seller)).await;
    assert!(body["data"]["products"].as_array().unwrap().is_empty());
}
