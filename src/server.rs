use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};
use log::info;

use crate::{
    auth::Role,
    config::{ServerConfig, StorageBackend},
    errors::{MarketError, ServerError},
    market::MarketContext,
    middleware::RoleGuard,
    routes,
    store::{MarketStore, MemoryStore, MongoStore},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let srv = match config.storage {
        StorageBackend::MongoDb => {
            let url = config
                .database_url
                .clone()
                .ok_or_else(|| ServerError::ConfigurationError("DATABASE_URL must be set".into()))?;
            let db = MongoStore::connect(&url, &config.database_name).await?;
            create_server_instance(config, db)?
        },
        StorageBackend::Memory => {
            info!("Using the in-memory store. Nothing will survive a restart.");
            create_server_instance(config, MemoryStore::new())?
        },
    };
    srv.await?;
    Ok(())
}

pub fn create_server_instance<B>(config: ServerConfig, db: B) -> Result<Server, ServerError>
where B: MarketStore + Clone + Send + 'static {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let ctx = MarketContext::new(db.clone(), &config.auth, config.hashing);
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("market::access_log"))
            .configure(|cfg| configure(cfg, ctx))
    })
    .bind((host.as_str(), port))?
    .run();
    info!("🚀️ Listening on {host}:{port}");
    Ok(srv)
}

/// Registers the API data, the public routes and the two guarded scopes.
///
/// Public resources are registered before the scopes that share their prefix, so `/user/login` is matched before the
/// guarded `/user` scope gets a chance to reject it.
pub fn configure<B>(cfg: &mut web::ServiceConfig, ctx: MarketContext<B>)
where B: MarketStore + Clone + 'static {
    let MarketContext { accounts, catalog, carts, orders, access } = ctx;
    cfg.app_data(web::Data::new(accounts))
        .app_data(web::Data::new(catalog))
        .app_data(web::Data::new(carts))
        .app_data(web::Data::new(orders))
        .app_data(
            web::JsonConfig::default().error_handler(|err, _| MarketError::Validation(err.to_string()).into()),
        )
        .route("/", web::get().to(routes::readiness))
        .route("/user/create", web::post().to(routes::create_user::<B>))
        .route("/user/login", web::post().to(routes::login_user::<B>))
        .route("/user/refresh", web::post().to(routes::refresh_user::<B>))
        .route("/seller/create", web::post().to(routes::create_seller::<B>))
        .route("/seller/login", web::post().to(routes::login_seller::<B>))
        .route("/seller/refresh", web::post().to(routes::refresh_seller::<B>))
        .service(
            web::scope("/user")
                .wrap(RoleGuard::new(access.clone(), Role::User))
                .route("/allproducts", web::get().to(routes::all_products::<B>))
                .route("/getproduct/{id}", web::get().to(routes::get_product::<B>))
                .route("/logout", web::post().to(routes::logout::<B>))
                .route("/addtocart", web::post().to(routes::add_to_cart::<B>))
                .route("/editcart", web::put().to(routes::edit_cart::<B>))
                .route("/deletefromcart/{id}", web::delete().to(routes::delete_from_cart::<B>))
                .route("/getcart", web::get().to(routes::view_cart::<B>))
                .route("/placeorder", web::post().to(routes::place_order::<B>))
                .route("/vieworders", web::get().to(routes::view_orders::<B>)),
        )
        .service(
            web::scope("/seller")
                .wrap(RoleGuard::new(access, Role::Seller))
                .route("/logout", web::post().to(routes::logout::<B>))
                .route("/addproduct", web::post().to(routes::add_product::<B>))
                .route("/products", web::get().to(routes::seller_products::<B>))
                .route("/updatestock/{id}", web::put().to(routes::update_stock::<B>))
                .route("/deleteproduct/{id}", web::delete().to(routes::delete_product::<B>))
                .route("/listorders", web::get().to(routes::list_orders::<B>))
                .route("/acceptorder/{id}", web::put().to(routes::accept_order::<B>))
                .route("/declineorder/{id}", web::put().to(routes::decline_order::<B>))
                .route("/completeorder/{id}", web::put().to(routes::complete_order::<B>)),
        );
}
