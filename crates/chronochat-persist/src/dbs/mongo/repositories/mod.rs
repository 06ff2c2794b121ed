pub mod message;
pub mod thread;

pub use message::MongoMessageRepository;
pub use thread::MongoThreadRepository;
