mod apply;
mod config_cmd;
mod create;
mod fetch;
mod inbox;
mod link;
mod projects;
mod pull;
mod push;
mod watch;

pub use apply::ApplyCommand;
pub use config_cmd::ConfigCommand;
pub use create::CreateCommand;
pub use fetch::FetchCommand;
pub use inbox::InboxCommand;
pub use link::LinkCommand;
pub use projects::ProjectsCommand;
pub use pull::PullCommand;
pub use push::PushCommand;
pub use watch::WatchCommand;
