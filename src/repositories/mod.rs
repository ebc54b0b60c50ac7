pub mod postgres_repo;
