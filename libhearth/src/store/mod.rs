//! Content store for streams
//!
//! Holds normalized content for one stream and keeps it in sync with the
//! server and the live channel:
//!
//! - `state`: the normalized state and its getters
//! - `reducer`: the only place state changes
//! - `actions`: the actions front-ends dispatch and the store running them
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use libhearth::api::mock::MockApi;
//! use libhearth::notify::Notifier;
//! use libhearth::store::{Action, Store};
//! use libhearth::streams::StreamDescriptor;
//!
//! # async fn example() -> libhearth::Result<()> {
//! let mut store = Store::new(StreamDescriptor::public(), Arc::new(MockApi::new()), Notifier::default());
//! store.dispatch(Action::FetchStream).await?;
//! for content in store.state().current_contents() {
//!     println!("{}: {}", content.author.display_name(), content.rendered);
//! }
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod reducer;
pub mod state;

pub use actions::{AcknowledgeSummary, Action, Store};
pub use reducer::{reduce, Mutation};
pub use state::{PendingState, Resource, StreamState};
