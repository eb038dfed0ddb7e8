//! Request handlers.
//!
//! Handlers only unpack the request, call into the engine and wrap the result in the response envelope. Every
//! failure is a [`MarketError`], which renders itself with the right status code.
use actix_web::{http::StatusCode, web, HttpResponse};
use serde_json::json;

use crate::{
    auth::{AuthenticatedSeller, AuthenticatedUser, BearerToken, Role},
    errors::MarketError,
    market::{AccountApi, CartApi, CatalogApi, OrderFlowApi},
    models::{
        CartInput,
        LogoutInput,
        ProductInput,
        RefreshInput,
        SignInInput,
        SignUpSellerInput,
        SignUpUserInput,
        StockInput,
    },
    response,
    store::MarketStore,
};

type HandlerResult = Result<HttpResponse, MarketError>;

fn parse_id(raw: &str, what: &str) -> Result<i64, MarketError> {
    raw.trim().parse::<i64>().map_err(|e| MarketError::Validation(format!("Invalid {what} ID '{raw}': {e}")))
}

fn login_response<T: serde::Serialize>(key: &str, login: crate::market::Login<T>) -> HttpResponse {
    let mut res = response::ok(
        "Login successful",
        json!({
            key: login.account,
            "access_token": login.tokens.access_token,
            "refresh_token": login.tokens.refresh_token,
        }),
    );
    let headers = res.headers_mut();
    if let Ok(v) = login.tokens.access_token.parse() {
        headers.insert(actix_web::http::header::HeaderName::from_static("access_token"), v);
    }
    if let Ok(v) = login.tokens.refresh_token.parse() {
        headers.insert(actix_web::http::header::HeaderName::from_static("refresh_token"), v);
    }
    res
}

pub async fn readiness() -> HttpResponse {
    response::ok_empty("ready to serve")
}

// ---------------------------------------------   Accounts   ----------------------------------------------------

pub async fn create_user<B: MarketStore + Clone>(
    api: web::Data<AccountApi<B>>,
    body: web::Json<SignUpUserInput>,
) -> HandlerResult {
    let user = api.register_user(body.into_inner()).await?;
    Ok(response::respond(StatusCode::CREATED, "User created", user))
}

pub async fn login_user<B: MarketStore + Clone>(
    api: web::Data<AccountApi<B>>,
    body: web::Json<SignInInput>,
) -> HandlerResult {
    let login = api.login_user(body.into_inner()).await?;
    Ok(login_response("user", login))
}

pub async fn create_seller<B: MarketStore + Clone>(
    api: web::Data<AccountApi<B>>,
    body: web::Json<SignUpSellerInput>,
) -> HandlerResult {
    let seller = api.register_seller(body.into_inner()).await?;
    Ok(response::respond(StatusCode::CREATED, "Seller created", seller))
}

pub async fn login_seller<B: MarketStore + Clone>(
    api: web::Data<AccountApi<B>>,
    body: web::Json<SignInInput>,
) -> HandlerResult {
    let login = api.login_seller(body.into_inner()).await?;
    Ok(login_response("seller", login))
}

pub async fn refresh_user<B: MarketStore + Clone>(
    api: web::Data<AccountApi<B>>,
    body: web::Json<RefreshInput>,
) -> HandlerResult {
    let tokens = api.refresh(&body.refresh_token, Role::User).await?;
    Ok(response::ok("Token refreshed", tokens))
}

pub async fn refresh_seller<B: MarketStore + Clone>(
    api: web::Data<AccountApi<B>>,
    body: web::Json<RefreshInput>,
) -> HandlerResult {
    let tokens = api.refresh(&body.refresh_token, Role::Seller).await?;
    Ok(response::ok("Token refreshed", tokens))
}

pub async fn logout<B: MarketStore + Clone>(
    api: web::Data<AccountApi<B>>,
    token: BearerToken,
    body: Option<web::Json<LogoutInput>>,
) -> HandlerResult {
    let refresh = body.and_then(|b| b.into_inner().refresh_token);
    api.logout(&token.0, refresh.as_deref()).await?;
    Ok(response::ok_empty("Logout successful"))
}

// ---------------------------------------------   Buyer routes   ------------------------------------------------

pub async fn all_products<B: MarketStore>(api: web::Data<CatalogApi<B>>, _user: AuthenticatedUser) -> HandlerResult {
    let products = api.all_products().await?;
    Ok(response::ok("Products fetched", json!({ "products": products })))
}

pub async fn get_product<B: MarketStore>(
    api: web::Data<CatalogApi<B>>,
    _user: AuthenticatedUser,
    id: web::Path<String>,
) -> HandlerResult {
    let product = api.product_by_id(parse_id(&id, "product")?).await?;
    Ok(response::ok("Product fetched", json!({ "product": product })))
}

pub async fn add_to_cart<B: MarketStore>(
    api: web::Data<CartApi<B>>,
    user: AuthenticatedUser,
    body: web::Json<CartInput>,
) -> HandlerResult {
    let item = api.add(user.0.id, body.product_id, body.quantity).await?;
    Ok(response::ok("Product added to cart", item))
}

pub async fn edit_cart<B: MarketStore>(
    api: web::Data<CartApi<B>>,
    user: AuthenticatedUser,
    body: web::Json<CartInput>,
) -> HandlerResult {
    let item = api.edit(user.0.id, body.product_id, body.quantity).await?;
    Ok(response::ok("Cart updated", item))
}

pub async fn delete_from_cart<B: MarketStore>(
    api: web::Data<CartApi<B>>,
    user: AuthenticatedUser,
    id: web::Path<String>,
) -> HandlerResult {
    api.remove(user.0.id, parse_id(&id, "product")?).await?;
    Ok(response::ok_empty("Product deleted from cart"))
}

pub async fn view_cart<B: MarketStore>(api: web::Data<CartApi<B>>, user: AuthenticatedUser) -> HandlerResult {
    let cart = api.view(user.0.id).await?;
    Ok(response::ok("Cart fetched successfully", cart))
}

pub async fn place_order<B: MarketStore>(api: web::Data<OrderFlowApi<B>>, user: AuthenticatedUser) -> HandlerResult {
    let order = api.place_order(user.0.id).await?;
    Ok(response::respond(
        StatusCode::CREATED,
        "Order placed successfully",
        json!({ "order_id": order.id, "order": order }),
    ))
}

pub async fn view_orders<B: MarketStore>(api: web::Data<OrderFlowApi<B>>, user: AuthenticatedUser) -> HandlerResult {
    let orders = api.orders_for_user(user.0.id).await?;
    Ok(response::ok("Orders fetched", json!({ "orders": orders })))
}

// ---------------------------------------------   Seller routes   -----------------------------------------------

pub async fn add_product<B: MarketStore>(
    api: web::Data<CatalogApi<B>>,
    seller: AuthenticatedSeller,
    body: web::Json<ProductInput>,
) -> HandlerResult {
    let product = api.create_product(seller.0.id, body.into_inner()).await?;
    Ok(response::respond(StatusCode::CREATED, "Product created", product))
}

pub async fn seller_products<B: MarketStore>(
    api: web::Data<CatalogApi<B>>,
    seller: AuthenticatedSeller,
) -> HandlerResult {
    let products = api.products_for_seller(seller.0.id).await?;
    Ok(response::ok("Products fetched", json!({ "products": products })))
}

pub async fn update_stock<B: MarketStore>(
    api: web::Data<CatalogApi<B>>,
    seller: AuthenticatedSeller,
    id: web::Path<String>,
    body: web::Json<StockInput>,
) -> HandlerResult {
    let product = api.adjust_stock(seller.0.id, parse_id(&id, "product")?, body.stock).await?;
    Ok(response::ok("Stock updated", product))
}

pub async fn delete_product<B: MarketStore>(
    api: web::Data<CatalogApi<B>>,
    seller: AuthenticatedSeller,
    id: web::Path<String>,
) -> HandlerResult {
    api.delete_product(seller.0.id, parse_id(&id, "product")?).await?;
    Ok(response::ok_empty("Product deleted"))
}

pub async fn list_orders<B: MarketStore>(
    api: web::Data<OrderFlowApi<B>>,
    seller: AuthenticatedSeller,
) -> HandlerResult {
    let orders = api.list_orders(seller.0.id).await?;
    Ok(response::ok("Orders fetched successfully", orders))
}

pub async fn accept_order<B: MarketStore>(
    api: web::Data<OrderFlowApi<B>>,
    seller: AuthenticatedSeller,
    id: web::Path<String>,
) -> HandlerResult {
    let order = api.accept_order(seller.0.id, parse_id(&id, "order")?).await?;
    Ok(response::ok("Order accepted", order))
}

pub async fn decline_order<B: MarketStore>(
    api: web::Data<OrderFlowApi<B>>,
    seller: AuthenticatedSeller,
    id: web::Path<String>,
) -> HandlerResult {
    let order = api.decline_order(seller.0.id, parse_id(&id, "order")?).await?;
    Ok(response::ok("Order declined", order))
}

pub async fn complete_order<B: MarketStore>(
    api: web::Data<OrderFlowApi<B>>,
    seller: AuthenticatedSeller,
    id: web::Path<String>,
) -> HandlerResult {
    let order = api.complete_order(seller.0.id, parse_id(&id, "order")?).await?;
    Ok(response::ok("Order completed", order))
}
