use fred::prelude::*;
use std::fmt;
use tracing::debug;

#[derive(clap::Parser, Clone)]
pub struct CacheOpt {
    /// How to connect to the redis cache.
    #[clap(long, env = "REDIS_URL", hide_env_values = true)]
    redis_url: String,
}

impl CacheOpt {
    pub async fn get_cache(&self) -> Result<AppearanceCache, Error> {
        let config = Config::from_url(&self.redis_url)?;
        let pool = Pool::new(config, None, None, None, 5)?;
        pool.init().await?;
        Ok(AppearanceCache { pool })
    }
}

/// The category an appearance series is cached under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Main,
    Alternate,
}

impl fmt::Display for Category {
    fn fmt(&self, out: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Category::Main => write!(out, "main"),
            Category::Alternate => write!(out, "alternate"),
        }
    }
}

/// The read-optimized view of per-year appearance counts.
///
/// Each (slug, category) is one sorted set with the year as member and
/// the count as score, so zadd overwrites any earlier count for that
/// year and repeated syncs converge instead of accumulating.
pub struct AppearanceCache {
    pool: Pool,
}

impl AppearanceCache {
    fn key(slug: &str, category: Category) -> String {
        format!("appearances:{slug}:{category}")
    }

    pub async fn put_yearly(
        &self,
        slug: &str,
        category: Category,
        years: &[(i32, i64)],
    ) -> Result<(), Error> {
        if years.is_empty() {
            return Ok(());
        }
        let values: Vec<(f64, i64)> = years
            .iter()
            .map(|&(year, count)| (count as f64, i64::from(year)))
            .collect();
        let added: i64 = self
            .pool
            .zadd(Self::key(slug, category), None, None, false, false, values)
            .await?;
        debug!("Cached {} {category} years for {slug} ({added} new)", years.len());
        Ok(())
    }
}
