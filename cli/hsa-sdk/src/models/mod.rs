pub mod categories;
pub mod dashboard;
pub mod events;
pub mod page;
pub mod products;
pub mod resolver;
pub mod users;
