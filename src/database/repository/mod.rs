pub mod memories;
pub mod messages;
pub mod roles;
pub mod users;
pub mod visits;

pub use memories::MemoryRepository;
pub use messages::MessageRepository;
pub use roles::RoleRepository;
pub use users::UserRepository;
pub use visits::VisitRepository;
