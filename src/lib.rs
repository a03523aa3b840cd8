pub mod model;
pub mod pool;
pub mod registry;
pub mod scheduler;
