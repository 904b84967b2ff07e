//! Default `env_logger` backend.

use env_logger::Env;

/// Install env_logger with `RUST_LOG` as filter, defaulting to `info`.
///
/// Calling it again, or after another logger was installed, does nothing.
pub fn init() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info")).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
        log::info!("[Logging] still alive");
    }
}
