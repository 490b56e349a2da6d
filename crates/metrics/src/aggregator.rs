//! The shared, persisted metrics aggregator.
//!
//! One instance is constructed at process start and handed to whatever
//! records or shuts down; clones share state. A background task saves on a
//! fixed interval and [`Aggregator::close`] saves once more on the way out.

use crate::{ModelMetrics, Sample, store};
use anyhow::Result;
use fcore::CompletionMeta;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::broadcast, task::JoinHandle, time};

/// Per-model running statistics behind one mutex.
#[derive(Clone)]
pub struct Aggregator {
    shared: Arc<Shared>,
}

struct Shared {
    path: PathBuf,
    models: Mutex<BTreeMap<String, ModelMetrics>>,
    /// Serializes writers so timer and shutdown saves cannot interleave.
    write: Mutex<()>,
    saver: Mutex<Option<Saver>>,
}

struct Saver {
    shutdown: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl Aggregator {
    /// Open the aggregator persisted at `path`.
    ///
    /// Prior state is loaded if the file exists and parses; otherwise the
    /// aggregator starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let models = store::load(&path);
        Self {
            shared: Arc::new(Shared {
                path,
                models: Mutex::new(models),
                write: Mutex::new(()),
                saver: Mutex::new(None),
            }),
        }
    }

    /// The persistence file.
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Start saving every `interval` on the current tokio runtime.
    ///
    /// Calling this while a saver already runs does nothing. The saver only
    /// holds a weak reference: once the last handle is dropped it stops
    /// without a final save, so call [`Aggregator::close`] to keep the tail.
    pub fn start(&self, interval: Duration) {
        let mut saver = self.shared.saver.lock();
        if saver.is_some() {
            return;
        }

        let (shutdown, mut rx) = broadcast::channel(1);
        let shared = Arc::downgrade(&self.shared);
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.tick().await;
            tracing::debug!("metrics saver started, interval {interval:?}");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(shared) = shared.upgrade() else {
                            return;
                        };
                        if let Err(e) = (Aggregator { shared }).save() {
                            tracing::warn!("periodic metrics save failed: {e:#}");
                        }
                    }
                    _ = rx.recv() => {
                        tracing::debug!("metrics saver stopping");
                        return;
                    }
                }
            }
        });
        *saver = Some(Saver { shutdown, handle });
    }

    /// Record one completed stream.
    ///
    /// Updates the model's overall statistics and the single bucket matching
    /// `meta.prompt_eval_count`, creating either on first use.
    pub fn record(&self, meta: &CompletionMeta, ttft_ms: f64) {
        let sample = Sample::from_meta(meta, ttft_ms);
        let mut models = self.shared.models.lock();
        models
            .entry(meta.model.clone())
            .or_insert_with(|| ModelMetrics::new(&meta.model))
            .record(&sample, meta.prompt_eval_count);
        tracing::trace!(
            model = %meta.model,
            ttft_ms,
            tps = sample.tokens_per_second,
            "recorded stream"
        );
    }

    /// A copy of every model's metrics, ordered by model name.
    pub fn snapshot(&self) -> Vec<ModelMetrics> {
        self.shared.models.lock().values().cloned().collect()
    }

    /// A copy of one model's metrics.
    pub fn model(&self, name: &str) -> Option<ModelMetrics> {
        self.shared.models.lock().get(name).cloned()
    }

    /// Write the full snapshot to disk.
    pub fn save(&self) -> Result<()> {
        let _write = self.shared.write.lock();
        let bytes = {
            let models = self.shared.models.lock();
            serde_json::to_vec_pretty(&models.values().collect::<Vec<_>>())?
        };
        store::write_atomic(&self.shared.path, &bytes)?;
        tracing::debug!("saved metrics to {}", self.shared.path.display());
        Ok(())
    }

    /// Stop the periodic saver and save one final time.
    ///
    /// Safe to call repeatedly and without a running saver.
    pub async fn close(&self) -> Result<()> {
        let saver = self.shared.saver.lock().take();
        if let Some(saver) = saver {
            let _ = saver.shutdown.send(());
            if let Err(e) = saver.handle.await {
                tracing::warn!("metrics saver task failed: {e}");
            }
        }
        self.save()
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("path", &self.shared.path)
            .field("models", &self.shared.models.lock().len())
            .finish()
    }
}

/// Shut down an aggregator if one was ever created.
pub async fn shutdown(aggregator: Option<&Aggregator>) -> Result<()> {
    match aggregator {
        Some(aggregator) => aggregator.close().await,
        None => Ok(()),
    }
}
