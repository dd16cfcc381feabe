mod args;
mod driver;
mod progress;
mod reader;

pub use args::*;
pub use driver::{MZPicker, MZPickerError, DEFAULT_CONFIG_FILE, ENV_PREFIX};
pub use progress::ProgressRecord;
pub use reader::{read_delimited, read_signal, Signal};
