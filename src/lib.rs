//! Collaborative name-finding groups.
//!
//! People join a group by invitation, propose names, and see which names
//! several of them came up with. Group state lives in an in-memory
//! [`store::GroupStore`] actor that writes every change through to a
//! [`storage::Backend`]; clients talk to it over the `/eventbus` websocket or
//! the REST endpoint in [`server`].

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod group;
pub mod identity;
pub mod mail;
pub mod message;
pub mod notifier;
pub mod server;
pub mod store;
pub mod store_actor;
pub mod ws_actor;

pub use dispatcher::{Dispatcher, InvitationSettings};
pub use error::{DispatchError, GroupError, StoreError};
pub use group::{Group, Member, Retention, Role};
pub use message::Action;
pub use notifier::{group_address, Notification, Notifier};
pub use store::GroupStore;
