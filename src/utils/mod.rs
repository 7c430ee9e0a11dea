use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Installs the global fmt subscriber; `RUST_LOG` refines the default filter.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{filter::LevelFilter, fmt, EnvFilter};

        let filter = EnvFilter::from_default_env().add_directive(
            "account_ledger=info"
                .parse()
                .unwrap_or_else(|_| LevelFilter::INFO.into()),
        );

        let _ = fmt().with_env_filter(filter).try_init();
    });
}
