//! # Events Module
//!
//! Progress reporting for curation runs.
//!
//! The engine emits events through a channel so that any front end can
//! render progress without the core knowing about terminals.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Stage(StageEvent::Completed(s)) = event {
//!             println!("{}: {} -> {}", s.name, s.count_in, s.count_out);
//!         }
//!     }
//! });
//!
//! pipeline.run_with_events(&sender)?;
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
