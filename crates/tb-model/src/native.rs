//! Fitted native boosters and the backend seam both families implement.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tb_types::{BoostingFamily, FeatureMatrix, ModelError, TbError, TbResult};

use crate::labels::Task;
use crate::params::BoosterParams;

/// A boosting library the estimator families train through.
pub trait Backend: Send + Sync + 'static {
    /// Handle of a trained model.
    type Model;

    const FAMILY: BoostingFamily;

    /// Train on `y`, which holds encoded class ids for classification tasks.
    fn train(
        params: &BoosterParams,
        task: Task,
        x: &FeatureMatrix,
        y: &[f64],
    ) -> TbResult<Self::Model>;

    /// Row-major outputs, [`Task::outputs_per_row`] values per row:
    /// regression values, the positive-class probability, or class
    /// probabilities.
    fn predict(model: &Self::Model, task: Task, x: &FeatureMatrix) -> TbResult<Vec<f64>>;

    /// Per-feature split counts and total split gains.
    fn split_stats(model: &Self::Model, n_features: usize) -> TbResult<SplitStats>;
}

/// Split usage of each feature across all trees.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitStats {
    pub splits: Vec<f64>,
    pub gains: Vec<f64>,
}

/// A trained native model shared by every clone of the estimator that fit it.
///
/// Calls into the native library are serialised through the mutex.
pub struct NativeModel<M> {
    handle: Arc<Mutex<Handle<M>>>,
    n_features: usize,
}

struct Handle<M>(M);

// SAFETY: the handle is only reached through the mutex, so one thread at a
// time calls into the library, and neither library binds a booster to the
// thread that created it.
unsafe impl<M> Send for Handle<M> {}

impl<M> NativeModel<M> {
    pub fn new(model: M, n_features: usize) -> Self {
        Self {
            handle: Arc::new(Mutex::new(Handle(model))),
            n_features,
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn with<R>(&self, f: impl FnOnce(&M) -> R) -> R {
        let guard = self.handle.lock();
        f(&guard.0)
    }
}

impl<M> Clone for NativeModel<M> {
    fn clone(&self) -> Self {
        Self {
            handle: Arc::clone(&self.handle),
            n_features: self.n_features,
        }
    }
}

impl<M> fmt::Debug for NativeModel<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeModel")
            .field("n_features", &self.n_features)
            .finish_non_exhaustive()
    }
}

/// Wrap an error reported by a native library.
pub(crate) fn native_error(family: BoostingFamily, err: impl fmt::Display) -> TbError {
    ModelError::TrainingFailed {
        message: format!("{family}: {err}"),
    }
    .into()
}
