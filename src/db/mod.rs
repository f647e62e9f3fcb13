pub mod pool;
pub mod postgres;
pub mod query;
pub mod realtime;
pub mod schema;
pub mod store;

#[cfg(test)]
pub mod memory;

pub use pool::{create_pool, health_check, run_migrations};
pub use postgres::PgStore;
pub use query::{Direction, Filter, Query, Row};
pub use realtime::{
    ChangeEvent, ChangeFeed, ChangeFilter, ChangeKind, PgRealtime, Subscription, CHANGE_CHANNEL,
};
pub use store::{decode_rows, encode_row, RemoteStore};
