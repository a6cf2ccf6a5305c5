use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local;
use env_logger::{Env, Target};
use std::io::Write;
use std::sync::Arc;

use hubsensi_backend::{
    config::Config,
    database::{DbPool, connect, create_pool, run_migrations},
    external::{LoginMailer, PostmarkService},
    handlers,
    middlewares::{AuthMiddleware, SubscriptionGate, create_cors},
    services::*,
    swagger::swagger_config,
    tasks::{self, DbTaskStore, RetryPolicy, TaskClient, TaskStore, TaskWorker},
    utils::JwtService,
};

fn init_logging() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();
}

/// Reuses the main pool when a queue URL points at the main database.
async fn queue_pool(url: &str, main_url: &str, main: &DbPool, max: u32) -> std::io::Result<DbPool> {
    if url == main_url {
        return Ok(main.clone());
    }
    let pool = connect(url, max).await.map_err(std::io::Error::other)?;
    run_migrations(&pool).await.map_err(std::io::Error::other)?;
    Ok(pool)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = Config::from_toml().map_err(std::io::Error::other)?;
    if let Err(e) = config.validate() {
        log::error!("Invalid configuration: {e}");
        return Err(std::io::Error::other(e));
    }

    let pool = create_pool(&config.database)
        .await
        .map_err(std::io::Error::other)?;
    run_migrations(&pool).await.map_err(std::io::Error::other)?;

    let broker = queue_pool(
        &config.queue.broker_url,
        &config.database.url,
        &pool,
        config.database.max_connections,
    )
    .await?;
    let results = queue_pool(
        &config.queue.result_backend_url,
        &config.database.url,
        &pool,
        config.database.max_connections,
    )
    .await?;

    let jwt_service = JwtService::new(
        &config.jwt.secret,
        config.jwt.access_token_expires_in,
        config.jwt.refresh_token_expires_in,
    );

    let mailer: Arc<dyn LoginMailer> = Arc::new(PostmarkService::new(&config.postmark));
    let store: Arc<dyn TaskStore> = Arc::new(DbTaskStore::new(
        broker,
        results,
        config.queue.result_expires_secs,
    ));
    let task_client = TaskClient::new(store.clone());

    if config.queue.run_worker {
        let worker = TaskWorker::new(
            store,
            mailer,
            RetryPolicy::from_config(&config.queue),
            config.default_login_url(),
            config.queue.batch_size,
        )
        .with_visibility_timeout(config.queue.visibility_timeout_secs);
        tasks::spawn_all(
            worker,
            std::time::Duration::from_secs(config.queue.poll_interval_secs.max(1)),
        );
        log::info!(
            "Task worker started, polling every {}s",
            config.queue.poll_interval_secs
        );
    }

    let auth_service = AuthService::new(pool.clone(), jwt_service.clone(), &config.app);
    let account_service = AccountService::new(
        pool.clone(),
        task_client.clone(),
        config.app.login_url(),
    );
    let school_service = SchoolService::new(pool.clone());
    let subscription_service = SubscriptionService::new(pool.clone());
    let classroom_service = ClassroomService::new(pool.clone());
    let attendance_service = AttendanceService::new(pool.clone());
    let dashboard_service = DashboardService::new(pool.clone());

    let lookup: Arc<dyn SubscriptionLookup> = Arc::new(subscription_service.clone());
    let missing_policy = config.subscription.missing_policy;
    let app_config = config.app.clone();

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(SubscriptionGate::new(lookup.clone(), missing_policy))
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .wrap(create_cors())
            .wrap(Logger::default())
            .app_data(web::Data::new(app_config.clone()))
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(account_service.clone()))
            .app_data(web::Data::new(school_service.clone()))
            .app_data(web::Data::new(subscription_service.clone()))
            .app_data(web::Data::new(classroom_service.clone()))
            .app_data(web::Data::new(attendance_service.clone()))
            .app_data(web::Data::new(dashboard_service.clone()))
            .app_data(web::Data::new(task_client.clone()))
            .configure(swagger_config)
            .configure(handlers::site_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::auth_config)
                    .configure(handlers::superadmin_config)
                    .configure(handlers::admin_config)
                    .configure(handlers::teacher_config)
                    .configure(handlers::student_config),
            )
            .default_service(web::to(handlers::not_found))
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
