//! Channel state, virtual messages and pagination
//!
//! A page is assembled in two steps: [`fetch_ordered`] reads a window of posts
//! from the store and orders it causally, then
//! [`ChannelDetails::render_page`] adds day markers and merges in the
//! channel's virtual messages.

pub mod channel;
pub mod page;
pub mod virtual_message;

pub use channel::{ChannelDetails, ChannelInfo};
pub use page::{fetch_ordered, PageOptions};
pub use virtual_message::{RenderableMessage, VirtualKind, VirtualMessage};
