pub mod content;
pub mod role;
pub mod user;

pub use content::{
    DailyCount, DashboardSummary, Memory, MemoryInput, Message, MessageApproval, MessageFilter,
    NewMessage, NewVisit, PageCount, Visit, VisitFilter, VisitStats, VisitTotals,
};
pub use role::{NewRole, Permission, Role, RoleOption, RoleUpdate};
pub use user::{
    NewUser, PasswordChange, Principal, ProfileUpdate, User, UserCredentials, UserFilter, UserUpdate,
};
