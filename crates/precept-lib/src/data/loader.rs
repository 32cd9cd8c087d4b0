//! Batched, parallel loading of transformed training data
//!
//! Each pass gets its own pool of workers that transform batches
//! independently and feed a bounded channel. The consumer reassembles them
//! in batch order, so the sequence of batches is identical to inline
//! loading. Passes never share workers, so several can be live at once.

use crate::error::{PreceptError, Result};
use crate::transform::{Side, Transformer};
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use tracing::{debug, warn};

/// One batch of normalized inputs and outputs
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub x: Array2<f64>,
    pub y: Array2<f64>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.x.nrows() == 0
    }
}

/// Everything a worker needs to produce batch `b`; shared read-only
#[derive(Clone)]
struct BatchJob {
    x: Arc<Array2<f64>>,
    y: Arc<Array2<f64>>,
    order: Arc<Vec<usize>>,
    batch_size: usize,
    transformer: Transformer,
}

impl BatchJob {
    fn num_batches(&self) -> usize {
        (self.order.len() + self.batch_size - 1) / self.batch_size
    }

    fn make(&self, b: usize) -> Result<Batch> {
        let start = b * self.batch_size;
        let end = (start + self.batch_size).min(self.order.len());
        let rows = &self.order[start..end];

        let x = self.x.select(Axis(0), rows);
        let y = self.y.select(Axis(0), rows);
        Ok(Batch {
            x: self.transformer.forward_matrix(Side::Inputs, x.view())?,
            y: self.transformer.forward_matrix(Side::Outputs, y.view())?,
        })
    }
}

/// Loader over one partition's raw rows
pub struct BatchLoader {
    x: Arc<Array2<f64>>,
    y: Arc<Array2<f64>>,
    transformer: Transformer,
    batch_size: usize,
    num_workers: usize,
}

impl BatchLoader {
    /// Create a loader; `num_workers == 0` transforms on the caller thread
    pub fn new(
        x: Array2<f64>,
        y: Array2<f64>,
        transformer: Transformer,
        batch_size: usize,
        num_workers: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(PreceptError::Configuration(
                "batch size must be positive".to_string(),
            ));
        }
        if x.nrows() != y.nrows() {
            return Err(PreceptError::DataShape(format!(
                "{} input rows but {} output rows",
                x.nrows(),
                y.nrows()
            )));
        }

        Ok(Self {
            x: Arc::new(x),
            y: Arc::new(y),
            transformer,
            batch_size,
            num_workers,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.x.nrows()
    }

    pub fn num_batches(&self) -> usize {
        (self.num_rows() + self.batch_size - 1) / self.batch_size
    }

    /// Iterate batches in row order
    pub fn iter(&self) -> Batches {
        self.batches((0..self.num_rows()).collect())
    }

    /// Iterate batches over a seeded permutation of the rows
    pub fn iter_shuffled(&self, seed: u64) -> Batches {
        let mut order: Vec<usize> = (0..self.num_rows()).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        self.batches(order)
    }

    /// Transform all rows as one matrix pair
    pub fn full(&self) -> Result<Batch> {
        let job = self.job((0..self.num_rows()).collect());
        Batch::from_job(&job)
    }

    fn job(&self, order: Vec<usize>) -> BatchJob {
        BatchJob {
            x: Arc::clone(&self.x),
            y: Arc::clone(&self.y),
            order: Arc::new(order),
            batch_size: self.batch_size,
            transformer: self.transformer.clone(),
        }
    }

    fn batches(&self, order: Vec<usize>) -> Batches {
        let job = self.job(order);
        let total = job.num_batches();
        let workers = self.num_workers.min(total);

        let pool = match pass_pool(workers) {
            Some(pool) => pool,
            None => {
                return Batches {
                    state: State::Inline { job, next: 0 },
                    total,
                };
            }
        };

        let (tx, rx) = mpsc::sync_channel(2 * workers);
        for w in 0..workers {
            let tx = tx.clone();
            let job = job.clone();
            pool.spawn(move || {
                for b in (w..total).step_by(workers) {
                    if tx.send((b, job.make(b))).is_err() {
                        // Consumer dropped the iterator
                        break;
                    }
                }
            });
        }
        debug!(workers, batches = total, "Batch workers started");

        Batches {
            state: State::Pooled {
                rx,
                pending: BTreeMap::new(),
                next: 0,
                _pool: pool,
            },
            total,
        }
    }
}

/// Workers owned by one pass; `None` means transform inline
fn pass_pool(workers: usize) -> Option<rayon::ThreadPool> {
    if workers == 0 {
        return None;
    }
    match rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("precept-loader-{}", i))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(e) => {
            warn!(error = %e, "Failed to start loader workers, loading inline");
            None
        }
    }
}

impl Batch {
    fn from_job(job: &BatchJob) -> Result<Batch> {
        let x = job.x.select(Axis(0), &job.order);
        let y = job.y.select(Axis(0), &job.order);
        Ok(Batch {
            x: job.transformer.forward_matrix(Side::Inputs, x.view())?,
            y: job.transformer.forward_matrix(Side::Outputs, y.view())?,
        })
    }
}

enum State {
    Inline {
        job: BatchJob,
        next: usize,
    },
    Pooled {
        rx: Receiver<(usize, Result<Batch>)>,
        pending: BTreeMap<usize, Result<Batch>>,
        next: usize,
        // Lives as long as the pass; its threads exit once the workers stop
        _pool: rayon::ThreadPool,
    },
}

/// Iterator over the batches of one pass
pub struct Batches {
    state: State,
    total: usize,
}

impl Iterator for Batches {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let total = self.total;
        match &mut self.state {
            State::Inline { job, next } => {
                if *next >= total {
                    return None;
                }
                let batch = job.make(*next);
                *next += 1;
                Some(batch)
            }
            State::Pooled { rx, pending, next, .. } => {
                if *next >= total {
                    return None;
                }
                loop {
                    if let Some(batch) = pending.remove(next) {
                        *next += 1;
                        return Some(batch);
                    }
                    match rx.recv() {
                        Ok((b, batch)) => {
                            pending.insert(b, batch);
                        }
                        Err(_) => {
                            *next = total;
                            return Some(Err(PreceptError::DataShape(
                                "batch workers stopped before finishing".to_string(),
                            )));
                        }
                    }
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let next = match &self.state {
            State::Inline { next, .. } | State::Pooled { next, .. } => *next,
        };
        let left = self.total.saturating_sub(next);
        (left, Some(left))
    }
}
