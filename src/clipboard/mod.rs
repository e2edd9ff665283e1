mod watcher;

pub use watcher::{clipboard_loop, ClipboardOffer};
