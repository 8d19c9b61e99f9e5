//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "tb_pipeline=info,tb_optimizer=info,tb_data=info,tb_model=warn";

/// Install a formatting subscriber filtered by `RUST_LOG`.
///
/// Returns false when a global subscriber was already installed; calling it
/// twice is harmless.
pub fn init_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .try_init()
        .is_ok()
}
