use actix_web::{App, HttpServer, middleware::Logger, web};
use dotenv::dotenv;
use std::sync::Arc;

use redpacket_backend::{
    cache::{self, RedisCache, RedisMutex},
    config::Config,
    database::{create_pool, run_migrations},
    events::KafkaPublisher,
    handlers::red_packet_config,
    services::RedPacketService,
    swagger::swagger_config,
    utils::logger,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    logger::init();

    // 加载配置
    let config = Config::from_toml().expect("Failed to load configuration file");

    // 创建数据库连接 (主从分离)
    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    // 运行数据库迁移
    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    // Redis 集群: 库存缓存与分布式锁共用一条连接
    let redis_conn = cache::connect(&config.redis)
        .await
        .expect("Failed to connect to Redis cluster");
    let stock_cache = Arc::new(RedisCache::new(redis_conn.clone()));
    let packet_mutex = Arc::new(RedisMutex::new(redis_conn));

    // Kafka 生产者
    let publisher = Arc::new(
        KafkaPublisher::new(&config.kafka).expect("Failed to initialize Kafka producer"),
    );

    let red_packet_service =
        RedPacketService::new(pool.clone(), stock_cache, packet_mutex, publisher);

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(red_packet_service.clone()))
            .configure(swagger_config)
            .configure(red_packet_config)
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
