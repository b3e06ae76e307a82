use dotenv::dotenv;
use tokio_util::sync::CancellationToken;

use redpacket_backend::{
    config::Config,
    database::create_pool,
    events::run_reconcile_consumer,
    services::BalanceService,
    utils::logger,
};

#[tokio::main]
async fn main() {
    dotenv().ok();
    logger::init();

    log::info!("Starting balance reconciler...");

    let config = Config::from_toml().expect("Failed to load configuration file");

    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");
    let balance = BalanceService::new(pool);

    let shutdown = CancellationToken::new();
    let consumer = {
        let kafka = config.kafka.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = run_reconcile_consumer(&kafka, balance, shutdown).await {
                log::error!("Reconcile consumer failed: {e}");
            }
        })
    };

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
    log::info!("Received shutdown signal, stopping reconciler...");
    // 让在途事件处理完, 各分区任务随后退出
    shutdown.cancel();
    let _ = consumer.await;
    log::info!("Reconciler stopped");
}
