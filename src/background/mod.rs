use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Loads the configured background image off the render thread and hands the
/// decoded result over through a single slot. The render loop samples the
/// latest successfully loaded image (or none) at the start of each tick;
/// loading is fire-and-forget and a decode failure only logs.
pub struct BackgroundLoader {
    requested: Option<PathBuf>,
    slot: Arc<Mutex<Option<Arc<RgbaImage>>>>,
    generation: Arc<AtomicU64>,
}

impl BackgroundLoader {
    pub fn new() -> Self {
        Self {
            requested: None,
            slot: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Reconcile with the path currently configured. A change clears the
    /// slot immediately (the old image is no longer wanted) and kicks off a
    /// load for the new path, if any.
    pub fn update(&mut self, path: Option<&Path>) {
        if self.requested.as_deref() == path {
            return;
        }
        self.requested = path.map(Path::to_path_buf);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *lock(&self.slot) = None;

        let Some(path) = self.requested.clone() else {
            return;
        };

        let slot = Arc::clone(&self.slot);
        let latest = Arc::clone(&self.generation);
        std::thread::spawn(move || match image::open(&path) {
            Ok(decoded) => {
                // A newer request may have raced past this load; only the
                // latest generation is allowed to publish.
                if latest.load(Ordering::SeqCst) == generation {
                    tracing::info!("background image loaded from {}", path.display());
                    *lock(&slot) = Some(Arc::new(decoded.into_rgba8()));
                }
            }
            Err(err) => {
                tracing::warn!(
                    "failed to load background image {}: {err}",
                    path.display()
                );
            }
        });
    }

    /// Latest successfully loaded background, if any.
    pub fn current(&self) -> Option<Arc<RgbaImage>> {
        lock(&self.slot).clone()
    }
}

impl Default for BackgroundLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(slot: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
