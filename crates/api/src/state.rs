//! Application state shared across handlers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::debug;

use tienda_core::reparto::ZonaConfig;

use crate::config::ApiConfig;
use crate::db::{RepositoryError, ZonaRepository};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    zonas: ZonaCache,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: ApiConfig, pool: PgPool) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                zonas: ZonaCache::new(),
            }),
        }
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the delivery zone cache.
    #[must_use]
    pub fn zonas(&self) -> &ZonaCache {
        &self.inner.zonas
    }
}

/// In-memory copy of every delivery zone configuration.
///
/// Quotes read all zones on every request, so the full set is cached for
/// 5 minutes and dropped whenever a zone is written. A load that overlaps a
/// write is returned to its caller but not kept, so the cache never holds a
/// set read before the last write committed.
#[derive(Clone)]
pub struct ZonaCache {
    cache: Cache<(), Arc<Vec<ZonaConfig>>>,
    /// Bumped by every [`ZonaCache::invalidate`].
    generacion: Arc<AtomicU64>,
}

impl ZonaCache {
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();
        Self {
            cache,
            generacion: Arc::new(AtomicU64::new(0)),
        }
    }

    /// All zone configurations, loading them on a miss.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the zones cannot be loaded.
    pub async fn todas(&self, pool: &PgPool) -> Result<Arc<Vec<ZonaConfig>>, RepositoryError> {
        let repo = ZonaRepository::new(pool);
        self.obtener(|| repo.list_configs()).await
    }

    async fn obtener<F, Fut>(&self, cargar: F) -> Result<Arc<Vec<ZonaConfig>>, RepositoryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<ZonaConfig>, RepositoryError>>,
    {
        if let Some(zonas) = self.cache.get(&()).await {
            debug!("zone cache hit");
            return Ok(zonas);
        }

        let generacion = self.generacion.load(Ordering::Acquire);
        let zonas = Arc::new(cargar().await?);
        self.cache.insert((), Arc::clone(&zonas)).await;

        // An invalidation after this check also clears the insert above.
        if self.generacion.load(Ordering::Acquire) == generacion {
            debug!(count = zonas.len(), "zone cache filled");
        } else {
            debug!("zones changed while loading, not cached");
            self.cache.invalidate(&()).await;
        }
        Ok(zonas)
    }

    /// Drop the cached zones so the next read goes to the database.
    pub async fn invalidate(&self) {
        self.generacion.fetch_add(1, Ordering::AcqRel);
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}

impl Default for ZonaCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[tokio::test]
    async fn test_loaded_zones_are_reused() {
        let zonas = ZonaCache::new();
        let cargas = &AtomicUsize::new(0);
        let cargar = move || async move {
            cargas.fetch_add(1, Ordering::SeqCst);
            Ok::<_, RepositoryError>(Vec::new())
        };

        zonas.obtener(cargar).await.unwrap();
        zonas.obtener(cargar).await.unwrap();
        assert_eq!(cargas.load(Ordering::SeqCst), 1);

        zonas.invalidate().await;
        zonas.obtener(cargar).await.unwrap();
        assert_eq!(cargas.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_write_during_load_is_not_masked() {
        let zonas = &ZonaCache::new();
        let cargas = &AtomicUsize::new(0);

        // A zone write commits and invalidates while the read is in flight.
        let leidas = zonas
            .obtener(move || async move {
                cargas.fetch_add(1, Ordering::SeqCst);
                zonas.invalidate().await;
                Ok::<_, RepositoryError>(Vec::new())
            })
            .await
            .unwrap();
        assert!(leidas.is_empty());

        zonas
            .obtener(move || async move {
                cargas.fetch_add(1, Ordering::SeqCst);
                Ok::<_, RepositoryError>(Vec::new())
            })
            .await
            .unwrap();
        assert_eq!(cargas.load(Ordering::SeqCst), 2);
    }
}
