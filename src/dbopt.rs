use diesel::ConnectionError;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(clap::Parser, Clone)]
pub struct DbOpt {
    /// How to connect to the postgres database.
    #[clap(long, env = "DATABASE_URL", hide_env_values = true)]
    db_url: String,
}

impl DbOpt {
    /// Get a single database connection from the configured url.
    pub async fn get_db(&self) -> Result<AsyncPgConnection, ConnectionError> {
        let time = Instant::now();
        let db = AsyncPgConnection::establish(&self.db_url).await;
        let time = time.elapsed();
        if time > Duration::from_millis(50) {
            warn!("Got a db connection in {time:.1?}.  Why so long?");
        }
        db
    }
}
