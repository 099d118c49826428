use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::limits::*;
use crate::mirror::MirrorFormat;
use crate::store::Store;

/// Keeps one store per site. Site = a named group of rooms with its own
/// mirror file under `data_dir`.
pub struct StoreRegistry {
    stores: DashMap<String, Arc<Store>>,
    /// Sites opened or being opened. Reserved before `Store::open` so the
    /// limit holds under concurrent first lookups.
    opened: AtomicUsize,
    max_sites: usize,
    data_dir: PathBuf,
    format: MirrorFormat,
    clock: Arc<dyn Clock>,
}

fn sanitize(site: &str) -> String {
    site.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

impl StoreRegistry {
    pub fn new(data_dir: PathBuf, format: MirrorFormat) -> Self {
        Self::with_clock(data_dir, format, Arc::new(SystemClock))
    }

    pub fn with_clock(data_dir: PathBuf, format: MirrorFormat, clock: Arc<dyn Clock>) -> Self {
        Self {
            stores: DashMap::new(),
            opened: AtomicUsize::new(0),
            max_sites: MAX_SITES,
            data_dir,
            format,
            clock,
        }
    }

    /// Get or lazily open the store for a site. Names that sanitize to the
    /// same string share a store, so no mirror file has two writers.
    pub fn get_or_create(&self, site: &str) -> std::io::Result<Arc<Store>> {
        if site.len() > MAX_SITE_NAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "site name too long",
            ));
        }
        // Sanitize to keep the mirror inside data_dir
        let safe_name = sanitize(site);
        if safe_name.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty site name",
            ));
        }
        if let Some(store) = self.stores.get(&safe_name) {
            return Ok(store.value().clone());
        }

        // The vacant entry holds its shard lock until insert, so one mirror
        // file never gets two stores.
        match self.stores.entry(safe_name) {
            Entry::Occupied(e) => Ok(e.get().clone()),
            Entry::Vacant(e) => {
                self.reserve_slot()?;
                let path = self
                    .data_dir
                    .join(format!("{}.{}", e.key(), self.format.extension()));
                let store = match self
                    .format
                    .open(path)
                    .and_then(|mirror| Store::open(mirror, self.clock.clone()))
                {
                    Ok(store) => Arc::new(store),
                    Err(err) => {
                        self.opened.fetch_sub(1, Ordering::SeqCst);
                        return Err(err);
                    }
                };
                info!("opened site {} at {}", e.key(), store.mirror_path().display());
                e.insert(store.clone());
                let active = self.opened.load(Ordering::SeqCst);
                metrics::gauge!(crate::observability::SITES_ACTIVE).set(active as f64);
                Ok(store)
            }
        }
    }

    fn reserve_slot(&self) -> std::io::Result<()> {
        self.opened
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max_sites).then_some(n + 1)
            })
            .map(|_| ())
            .map_err(|_| std::io::Error::other("too many sites"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::*;
    use std::fs;

    /// 2026-10-20T00:00:00Z
    const DAY: Ms = 1_792_454_400_000;
    const H: Ms = 3_600_000;

    fn test_data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("boardroom_test_registry").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn registry(dir: PathBuf) -> StoreRegistry {
        StoreRegistry::with_clock(dir, MirrorFormat::Json, Arc::new(FixedClock::new(DAY)))
    }

    fn owner() -> Owner {
        Owner {
            name: "Grace".into(),
            email: "grace@example.com".into(),
            phone: "555-0100".into(),
        }
    }

    #[tokio::test]
    async fn site_isolation() {
        let reg = registry(test_data_dir("isolation"));
        let london = reg.get_or_create("london").unwrap();
        let paris = reg.get_or_create("paris").unwrap();

        london
            .create("room-1", DAY + 9 * H, DAY + 10 * H, owner())
            .await
            .unwrap();
        // Same room key and time in another site is not a conflict
        paris
            .create("room-1", DAY + 9 * H, DAY + 10 * H, owner())
            .await
            .unwrap();

        assert_eq!(london.len().await.unwrap(), 1);
        assert_eq!(paris.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn site_lazy_creation() {
        let dir = test_data_dir("lazy");
        let reg = registry(dir.clone());

        let store = reg.get_or_create("hq").unwrap();
        // Opening does not touch the disk
        assert!(fs::read_dir(&dir).unwrap().next().is_none());

        store
            .create("room-1", DAY + 9 * H, DAY + 10 * H, owner())
            .await
            .unwrap();
        assert!(dir.join("hq.json").exists());
    }

    #[tokio::test]
    async fn framed_sites_use_their_own_extension() {
        let dir = test_data_dir("framed");
        let reg = StoreRegistry::with_clock(
            dir.clone(),
            MirrorFormat::Framed,
            Arc::new(FixedClock::new(DAY)),
        );
        let store = reg.get_or_create("hq").unwrap();
        assert_eq!(store.mirror_path(), dir.join("hq.mirror"));
    }

    #[tokio::test]
    async fn same_store_returned() {
        let reg = registry(test_data_dir("same_store"));
        let a = reg.get_or_create("foo").unwrap();
        let b = reg.get_or_create("foo").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        // Different spellings of one file share a store
        let c = reg.get_or_create("f/o/o").unwrap();
        assert!(Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn site_name_sanitized() {
        let dir = test_data_dir("sanitize");
        let reg = registry(dir.clone());

        let store = reg.get_or_create("../evil").unwrap();
        assert_eq!(store.mirror_path(), dir.join("evil.json"));

        let err = reg.get_or_create("../..").err().unwrap();
        assert!(err.to_string().contains("empty site name"));
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn site_name_length() {
        let reg = registry(test_data_dir("name_len"));
        reg.get_or_create(&"x".repeat(MAX_SITE_NAME_LEN)).unwrap();
        let err = reg
            .get_or_create(&"x".repeat(MAX_SITE_NAME_LEN + 1))
            .err()
            .unwrap();
        assert!(err.to_string().contains("site name too long"));
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn site_count_limit() {
        let reg = registry(test_data_dir("count_limit"));
        for i in 0..MAX_SITES {
            reg.get_or_create(&format!("s{i}")).unwrap();
        }
        // Existing sites are still reachable at the limit
        reg.get_or_create("s0").unwrap();
        let err = reg.get_or_create("one_more").err().unwrap();
        assert!(err.to_string().contains("too many sites"));
    }

    #[test]
    fn concurrent_opens_respect_site_limit() {
        let reg = StoreRegistry {
            max_sites: 4,
            ..registry(test_data_dir("concurrent_limit"))
        };
        let opened = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|i| {
                    let reg = &reg;
                    scope.spawn(move || reg.get_or_create(&format!("site{i}")).is_ok())
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count()
        });
        assert_eq!(opened, 4);
        assert_eq!(reg.stores.len(), 4);

        // Whichever sites won stay reachable at the limit
        let winner = reg.stores.iter().next().map(|e| e.key().clone()).unwrap();
        reg.get_or_create(&winner).unwrap();
        assert!(reg.get_or_create("late").is_err());
    }
}
