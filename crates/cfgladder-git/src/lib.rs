mod git_ops;
mod repository;

pub use repository::GitRepository;
