//! Initialisation du subscriber `tracing`.
//!
//! Natif : sortie `fmt` sur stderr, filtre `RUST_LOG` prioritaire sur celui
//! de la configuration. WebAssembly : même formatage, écrit dans la console
//! du navigateur avec le préfixe `[FB Video Blocker]`.

use tracing_subscriber::EnvFilter;

/// Préfixe des lignes écrites dans la console du navigateur.
pub const CONSOLE_PREFIX: &str = "[FB Video Blocker]";

/// Installe le subscriber global. Un second appel est ignoré.
#[cfg(not(target_arch = "wasm32"))]
pub fn init(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
}

#[cfg(target_arch = "wasm32")]
pub fn init(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(console::ConsoleWriter::default)
        .without_time()
        .with_ansi(false)
        .with_target(false)
        .try_init();
}

#[cfg(target_arch = "wasm32")]
mod console {
    use std::io;

    /// Tampon d'une ligne, vidé vers `console.log` à la destruction.
    #[derive(Default)]
    pub struct ConsoleWriter {
        buf: Vec<u8>,
    }

    impl io::Write for ConsoleWriter {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.buf.extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            if self.buf.is_empty() {
                return Ok(());
            }
            let line = String::from_utf8_lossy(&self.buf);
            let message = format!("{} {}", super::CONSOLE_PREFIX, line.trim_end());
            web_sys::console::log_1(&message.into());
            self.buf.clear();
            Ok(())
        }
    }

    impl Drop for ConsoleWriter {
        fn drop(&mut self) {
            let _ = io::Write::flush(self);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_does_not_panic() {
        init("debug");
        init("info");
        tracing::info!("logging initialised");
    }
}
