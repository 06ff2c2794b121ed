#[cfg(feature = "mongodb")]
pub mod mongo;

#[cfg(feature = "postgres")]
pub mod postgres;
