pub mod github;

pub use github::GitHubOAuthClient;
