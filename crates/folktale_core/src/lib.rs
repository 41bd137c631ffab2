pub mod catalog;
pub mod domain;
pub mod feed;
pub mod memory;
pub mod ports;
pub mod session;

pub use domain::{
    AuthSession, FilterUpdate, NewStory, Story, StoryFilter, StoryId, StoryOrder, User,
    UserCredentials,
};
pub use feed::{FeedConfig, FeedSnapshot, FeedStatus, FetchOutcome, StoryFeedController};
pub use ports::{
    AccountStore, FavoritesStore, ObjectStorage, PortError, PortResult, SessionProvider,
    StoryStore,
};
pub use session::LocalSession;
