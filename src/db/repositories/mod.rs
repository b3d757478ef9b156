pub mod habit_repository;
pub mod snapshot_repository;
