use std::io;

use clap::CommandFactory;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mzpicker::{MZPicker, MZPickerError};

fn main() -> Result<(), MZPickerError> {
    let args = MZPicker::configure(&MZPicker::command().get_matches())?;

    let (log_layer, _guard) = match args.log_file.as_ref() {
        Some(path) => {
            let handle = std::fs::File::create(path)?;
            let (writer, guard) = tracing_appender::non_blocking(handle);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(
                    EnvFilter::builder()
                        .with_default_directive(tracing::Level::DEBUG.into())
                        .from_env_lossy(),
                );
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer().compact().with_writer(io::stderr).with_filter(
                EnvFilter::builder()
                    .with_default_directive(tracing::Level::INFO.into())
                    .from_env_lossy(),
            ),
        )
        .with(log_layer)
        .init();

    args.main()?;
    Ok(())
}
