pub mod entity_repo;
pub use entity_repo::EntityRepository;
pub mod subscriber_repo;
pub use subscriber_repo::SubscriberRepository;
pub mod token_repo;
pub use token_repo::{SqlTokenStore, TokenStore};
