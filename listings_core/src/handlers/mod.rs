pub mod health;
pub mod listings;
pub mod reviews;
pub mod routes;
pub mod users;
