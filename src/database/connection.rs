use crate::config::DatabaseConfig;
use crate::error::AppResult;
use migration::{Migrator, MigratorTrait};
use rand::Rng;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

/// Master/replica handle pair. Writes and transactional reads go to the
/// master; point reads are served from a replica picked at random.
#[derive(Clone)]
pub struct DbPool {
    master: DatabaseConnection,
    replicas: Vec<DatabaseConnection>,
}

impl DbPool {
    /// Connection every write and master-bound read must use.
    pub fn master(&self) -> &DatabaseConnection {
        &self.master
    }

    /// Random replica for point reads, master when no replica is configured.
    pub fn reader(&self) -> &DatabaseConnection {
        if self.replicas.is_empty() {
            return &self.master;
        }
        let idx = rand::rng().random_range(0..self.replicas.len());
        &self.replicas[idx]
    }

    /// Wrap a single connection (used by tests and single-node setups).
    pub fn single(conn: DatabaseConnection) -> Self {
        Self {
            master: conn,
            replicas: Vec::new(),
        }
    }
}

pub async fn create_pool(config: &DatabaseConfig) -> AppResult<DbPool> {
    let mut master_opts = ConnectOptions::new(config.master_url());
    master_opts.max_connections(config.max_connections);
    let master = Database::connect(master_opts).await?;
    log::info!("Connected to MySQL master at {}", config.master);

    let mut replicas = Vec::new();
    if config.replica != config.master {
        let mut replica_opts = ConnectOptions::new(config.replica_url());
        replica_opts.max_connections(config.max_connections);
        replicas.push(Database::connect(replica_opts).await?);
        log::info!("Connected to MySQL replica at {}", config.replica);
    }

    Ok(DbPool { master, replicas })
}

pub async fn run_migrations(pool: &DbPool) -> AppResult<()> {
    Migrator::up(pool.master(), None).await?;
    Ok(())
}
