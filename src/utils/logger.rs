use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directives used when `RUST_LOG` is unset. Covers both the library and the
/// `water-quality` binary, whose events carry the `water_quality` target.
pub fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "deafrica_water_quality=debug,water_quality=debug,info"
    } else {
        "deafrica_water_quality=info,water_quality=info,warn"
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)))
}

pub fn init_cli_logger(verbose: bool) {
    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

/// JSON lines for log collectors when running inside the notebook container.
pub fn init_json_logger(verbose: bool) {
    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_writer(std::io::stderr)
                .json(),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn capture_json(verbose: bool) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::registry()
            .with(EnvFilter::new(default_directives(verbose)))
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(move || writer.clone())
                    .json(),
            );

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "water_quality", "explorer starts ungated");
            tracing::info!(target: "water_quality", "compose file written");
            tracing::debug!(target: "water_quality", "settings detail");
            tracing::info!(target: "deafrica_water_quality::core::transfer", "wrote bytes");
            tracing::info!(target: "hyper", "connection noise");
        });

        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_binary_events_reach_json_output() {
        let output = capture_json(false);
        assert_eq!(output.lines().count(), 3);
        assert!(output.contains("explorer starts ungated"));
        assert!(output.contains("compose file written"));
        assert!(output.contains("wrote bytes"));
        assert!(!output.contains("settings detail"));
        assert!(!output.contains("connection noise"));
    }

    #[test]
    fn test_verbose_enables_binary_debug() {
        let output = capture_json(true);
        assert!(output.contains("settings detail"));
        assert!(output.contains("connection noise"));
    }
}
