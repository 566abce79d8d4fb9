//! Client-side view of the network: users, channels and their
//! lazily synchronized attributes.

mod channel;
mod dashmap_ext;
mod lists;
mod mask;
mod syncable;
mod user;

pub use channel::{Channel, Member, ModeTable};
pub use lists::{ChannelList, OWN_USER_ID, UserList};
pub use mask::{Ban, Mask};
pub use syncable::{SYNC_TIMEOUT, Synced};
pub use user::User;
