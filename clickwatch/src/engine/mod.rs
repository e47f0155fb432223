pub mod dispatcher;
pub mod pipeline;
pub mod scheduler;
pub mod sink;
